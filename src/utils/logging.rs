use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Initialize tracing for the application.
///
/// Events go to the console and, when `file` is given, are appended to that
/// file as well. `RUST_LOG` takes precedence over `default_level`.
///
/// Uses `try_init` so tests can call this more than once without panicking.
pub fn init(default_level: &str, file: Option<&Path>) -> std::io::Result<()> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(build_filter(default_level));

    let file_layer = match file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let log_file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Mutex::new(log_file))
                    .with_filter(build_filter(default_level)),
            )
        }
        None => None,
    };

    let _ = tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init();
    Ok(())
}

fn build_filter(default_level: &str) -> EnvFilter {
    let level = match default_level.to_lowercase().as_str() {
        "error" => "error",
        "warn" | "warning" => "warn",
        "debug" => "debug",
        "trace" => "trace",
        _ => "info",
    };

    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Keep the HTTP and socket stacks quiet unless asked for.
        EnvFilter::new(format!("{level},hyper=warn,tungstenite=warn,tokio_tungstenite=warn"))
    })
}
