mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{
    BrokerBackendKind, FeatureFlags, LoggingSettings, RedisSettings, RelaySettings,
    ServerSettings, Settings, SocketSettings, StreamingMode,
};

/// Default configuration file, looked up relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config/default";

/// Prefix of environment variables read as configuration, e.g.
/// `CHANRELAY_REDIS__CHANNEL=news`.
pub const ENV_PREFIX: &str = "CHANRELAY";

/// Longest a poll may wait for a message before answering `-1`.
pub const MAX_POLL_WAIT_MS: u64 = 30_000;

/// Values given on the command line. They take precedence over the
/// configuration file and the environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    /// Explicit configuration file; unlike the default file it must exist.
    pub config_file: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub socket_host: Option<String>,
    pub socket_port: Option<u16>,
    pub socket_mode: Option<String>,
    pub redis_host: Option<String>,
    pub redis_port: Option<u16>,
    pub redis_db: Option<u8>,
    pub redis_password: Option<String>,
    pub redis_channel: Option<String>,
    pub enable_streaming: Option<bool>,
    pub enable_broker: Option<bool>,
    pub broker_backend: Option<String>,
    pub poll_wait_ms: Option<u64>,
    pub log_level: Option<String>,
    pub log_file: Option<String>,
}

/// Loads the configuration from the default file (or `overrides.config_file`),
/// the environment and command-line `overrides`, merged over defaults.
///
/// Layering, lowest first: defaults, config file, `CHANRELAY_*` environment,
/// overrides. The result is validated before it is returned.
pub fn load_config_with(overrides: &Overrides) -> Result<Settings, ConfigError> {
    let file = match &overrides.config_file {
        Some(path) => File::with_name(path).required(true),
        None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let builder = Config::builder()
        .add_source(file)
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .set_override_option("server.host", overrides.host.clone())?
        .set_override_option("server.port", overrides.port.map(i64::from))?
        .set_override_option("socket.host", overrides.socket_host.clone())?
        .set_override_option("socket.port", overrides.socket_port.map(i64::from))?
        .set_override_option("socket.mode", overrides.socket_mode.clone())?
        .set_override_option("redis.host", overrides.redis_host.clone())?
        .set_override_option("redis.port", overrides.redis_port.map(i64::from))?
        .set_override_option("redis.db", overrides.redis_db.map(i64::from))?
        .set_override_option("redis.password", overrides.redis_password.clone())?
        .set_override_option("redis.channel", overrides.redis_channel.clone())?
        .set_override_option("features.enable_streaming", overrides.enable_streaming)?
        .set_override_option("features.enable_broker", overrides.enable_broker)?
        .set_override_option("features.broker_backend", overrides.broker_backend.clone())?
        .set_override_option(
            "relay.poll_wait_ms",
            overrides
                .poll_wait_ms
                .map(|ms| {
                    i64::try_from(ms).map_err(|_| {
                        ConfigError::Message(format!("relay.poll_wait_ms out of range: {ms}"))
                    })
                })
                .transpose()?,
        )?
        .set_override_option("logging.level", overrides.log_level.clone())?
        .set_override_option("logging.file", overrides.log_file.clone())?;

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    let settings = partial.merge(Settings::default());
    validate(&settings)?;
    Ok(settings)
}

/// Rejects settings the relay cannot run with.
pub fn validate(settings: &Settings) -> Result<(), ConfigError> {
    if settings.redis.db > 15 {
        return Err(ConfigError::Message(format!(
            "redis.db must be between 0 and 15, got {}",
            settings.redis.db
        )));
    }
    if settings.redis.channel.trim().is_empty() {
        return Err(ConfigError::Message(
            "redis.channel must not be empty".to_string(),
        ));
    }
    if settings.relay.poll_wait_ms > MAX_POLL_WAIT_MS {
        return Err(ConfigError::Message(format!(
            "relay.poll_wait_ms must be at most {MAX_POLL_WAIT_MS}, got {}",
            settings.relay.poll_wait_ms
        )));
    }
    if !(400..=599).contains(&settings.relay.no_subscribers_status) {
        return Err(ConfigError::Message(format!(
            "relay.no_subscribers_status must be an error status (400-599), got {}",
            settings.relay.no_subscribers_status
        )));
    }
    Ok(())
}
