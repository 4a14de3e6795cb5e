//! CLI for chanrelay
//!
//! Loads the configuration (file, `CHANRELAY_*` environment, then these
//! flags), sets up logging and runs the server until Ctrl-C.

use std::path::Path;

use chanrelay::config::{Overrides, load_config_with};
use chanrelay::server::ServerShell;
use chanrelay::utils::logging;
use clap::Parser;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "chanrelay", version, about = "HTTP relay for a Redis pub/sub channel")]
struct Args {
    /// Configuration file (default: config/default.* if present)
    #[arg(long = "config", value_name = "FILE")]
    config_file: Option<String>,

    /// HTTP listen host
    #[arg(long)]
    host: Option<String>,

    /// HTTP listen port
    #[arg(long)]
    port: Option<u16>,

    /// WebSocket listen host
    #[arg(long)]
    socket_host: Option<String>,

    /// WebSocket listen port
    #[arg(long)]
    socket_port: Option<u16>,

    /// What the WebSocket listener does with inbound frames
    #[arg(long, value_parser = ["echo", "log", "broadcast"])]
    socket_mode: Option<String>,

    #[arg(long)]
    redis_host: Option<String>,

    #[arg(long)]
    redis_port: Option<u16>,

    /// Redis logical database (0-15)
    #[arg(long)]
    redis_db: Option<u8>,

    #[arg(long)]
    redis_password: Option<String>,

    /// Channel relayed by /publish and /subscribe
    #[arg(long)]
    redis_channel: Option<String>,

    /// Start the WebSocket listener
    #[arg(long)]
    streaming: bool,

    /// Run without a broker; /publish and /subscribe are not served
    #[arg(long)]
    no_broker: bool,

    #[arg(long, value_parser = ["redis", "memory"])]
    broker_backend: Option<String>,

    /// How long /subscribe waits for a message before answering -1
    #[arg(long, value_name = "MS")]
    poll_wait_ms: Option<u64>,

    #[arg(long)]
    log_level: Option<String>,

    /// Log file appended to alongside the console; empty disables it
    #[arg(long, value_name = "FILE")]
    log_file: Option<String>,
}

impl Args {
    fn overrides(self) -> Overrides {
        Overrides {
            config_file: self.config_file,
            host: self.host,
            port: self.port,
            socket_host: self.socket_host,
            socket_port: self.socket_port,
            socket_mode: self.socket_mode,
            redis_host: self.redis_host,
            redis_port: self.redis_port,
            redis_db: self.redis_db,
            redis_password: self.redis_password,
            redis_channel: self.redis_channel,
            enable_streaming: self.streaming.then_some(true),
            enable_broker: self.no_broker.then_some(false),
            broker_backend: self.broker_backend,
            poll_wait_ms: self.poll_wait_ms,
            log_level: self.log_level,
            log_file: self.log_file,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let overrides = Args::parse().overrides();

    let settings = load_config_with(&overrides)?;
    logging::init(
        &settings.logging.level,
        settings.logging.file.as_deref().map(Path::new),
    )?;
    info!(config = ?settings, "configuration loaded");

    let shell = match ServerShell::bind(settings).await {
        Ok(shell) => shell,
        Err(e) => {
            error!(error = %e, "startup failed");
            return Err(e.into());
        }
    };

    shell
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for Ctrl-C");
            }
            info!("Shutdown signal received. Exiting gracefully.");
        })
        .await?;

    info!("server stopped");
    Ok(())
}
