//! Logging setup shared by the extractor and the cleanup pass.
//!
//! Logs always go to stderr. When a log directory is given, a daily rolling
//! file is written there as well.

use anyhow::Result;
use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable holding the log filter, e.g. `DKFACES_LOG=debug`.
pub const LOG_ENV: &str = "DKFACES_LOG";

/// Initialize the logging system. `verbose` raises the default level to
/// `debug` when `DKFACES_LOG` is unset.
pub fn init(log_dir: Option<&Path>, verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = tracing_appender::rolling::daily(dir, "dkfaces.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // Keep the writer thread alive for the lifetime of the process.
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            Some(
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    if let Some(dir) = log_dir {
        tracing::debug!("Logging to {:?}", dir);
    }
    Ok(())
}
