use serde::{Deserialize, Serialize};

/// Top-level configuration settings for the application.
///
/// Read once at startup and immutable afterwards.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub socket: SocketSettings,
    pub redis: RedisSettings,
    pub features: FeatureFlags,
    pub relay: RelaySettings,
    pub logging: LoggingSettings,
}

/// Host and port of the HTTP listener.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Host, port and frame handling of the WebSocket listener.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SocketSettings {
    pub host: String,
    pub port: u16,
    pub mode: StreamingMode,
}

/// Connection parameters for the Redis broker and the single relayed channel.
#[derive(Deserialize, Clone, PartialEq)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    /// Logical database, 0 to 15.
    pub db: u8,
    pub password: Option<String>,
    pub channel: String,
}

impl std::fmt::Debug for RedisSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db", &self.db)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("channel", &self.channel)
            .finish()
    }
}

/// Switches that select which parts of the server run.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct FeatureFlags {
    pub enable_streaming: bool,
    pub enable_broker: bool,
    pub broker_backend: BrokerBackendKind,
}

/// Tuning for the poll and publish routes.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RelaySettings {
    /// How long a poll may wait for a message before answering `-1`, at most
    /// `MAX_POLL_WAIT_MS`.
    pub poll_wait_ms: u64,
    /// Status returned when a publish reached zero subscribers.
    pub no_subscribers_status: u16,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
    /// Log file appended to alongside console output. `None` logs to console only.
    pub file: Option<String>,
}

/// What the streaming relay does with an inbound frame.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StreamingMode {
    /// Send the frame back to the connection it came from.
    #[default]
    Echo,
    /// Record the frame and send nothing.
    Log,
    /// Send the frame to every live connection.
    Broadcast,
}

/// Which broker the relay talks to.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BrokerBackendKind {
    #[default]
    Redis,
    /// In-process broker; nothing leaves the process.
    Memory,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values are filled from
/// `Settings::default()` by `merge`.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub socket: Option<PartialSocketSettings>,
    pub redis: Option<PartialRedisSettings>,
    pub features: Option<PartialFeatureFlags>,
    pub relay: Option<PartialRelaySettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialSocketSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub mode: Option<StreamingMode>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialRedisSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub db: Option<u8>,
    pub password: Option<String>,
    pub channel: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialFeatureFlags {
    pub enable_streaming: Option<bool>,
    pub enable_broker: Option<bool>,
    pub broker_backend: Option<BrokerBackendKind>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialRelaySettings {
    pub poll_wait_ms: Option<u64>,
    pub no_subscribers_status: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
    pub file: Option<String>,
}

impl PartialSettings {
    /// Fills every missing value from `default`.
    pub fn merge(self, default: Settings) -> Settings {
        let server = self.server.unwrap_or_default();
        let socket = self.socket.unwrap_or_default();
        let redis = self.redis.unwrap_or_default();
        let features = self.features.unwrap_or_default();
        let relay = self.relay.unwrap_or_default();
        let logging = self.logging.unwrap_or_default();

        Settings {
            server: ServerSettings {
                host: server.host.unwrap_or(default.server.host),
                port: server.port.unwrap_or(default.server.port),
            },
            socket: SocketSettings {
                host: socket.host.unwrap_or(default.socket.host),
                port: socket.port.unwrap_or(default.socket.port),
                mode: socket.mode.unwrap_or(default.socket.mode),
            },
            redis: RedisSettings {
                host: redis.host.unwrap_or(default.redis.host),
                port: redis.port.unwrap_or(default.redis.port),
                db: redis.db.unwrap_or(default.redis.db),
                // An empty password means "no AUTH".
                password: redis
                    .password
                    .filter(|p| !p.is_empty())
                    .or(default.redis.password),
                channel: redis.channel.unwrap_or(default.redis.channel),
            },
            features: FeatureFlags {
                enable_streaming: features
                    .enable_streaming
                    .unwrap_or(default.features.enable_streaming),
                enable_broker: features
                    .enable_broker
                    .unwrap_or(default.features.enable_broker),
                broker_backend: features
                    .broker_backend
                    .unwrap_or(default.features.broker_backend),
            },
            relay: RelaySettings {
                poll_wait_ms: relay.poll_wait_ms.unwrap_or(default.relay.poll_wait_ms),
                no_subscribers_status: relay
                    .no_subscribers_status
                    .unwrap_or(default.relay.no_subscribers_status),
            },
            logging: LoggingSettings {
                level: logging.level.unwrap_or(default.logging.level),
                file: match logging.file {
                    Some(file) if file.is_empty() => None,
                    Some(file) => Some(file),
                    None => default.logging.file,
                },
            },
        }
    }
}

/// Provides default values for `Settings`.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            socket: SocketSettings {
                host: "0.0.0.0".to_string(),
                port: 9000,
                mode: StreamingMode::Echo,
            },
            redis: RedisSettings {
                host: "127.0.0.1".to_string(),
                port: 6379,
                db: 0,
                password: None,
                channel: "gChannel".to_string(),
            },
            features: FeatureFlags {
                enable_streaming: false,
                enable_broker: true,
                broker_backend: BrokerBackendKind::Redis,
            },
            relay: RelaySettings {
                poll_wait_ms: 0,
                no_subscribers_status: 500,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                file: Some("./server.log".to_string()),
            },
        }
    }
}

impl Settings {
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.socket.host, self.socket.port)
    }
}
