//! Tracing setup for hosts embedding the client.

use std::io;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;

/// Log file prefix used when logging to a directory
const LOG_FILE_PREFIX: &str = "faceauth.log";

/// Initialize the tracing subscriber.
///
/// Use the `RUST_LOG` env var to control the level (e.g. `RUST_LOG=debug`);
/// the default is `warn`. When `config.log_dir` is set, output goes to a
/// daily rolling file there and the returned guard must be kept alive until
/// shutdown so buffered lines are flushed.
///
/// Calling this more than once is harmless; later calls leave the first
/// subscriber in place.
pub fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match config.log_dir {
        Some(ref dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .with(filter)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .try_init();
            None
        }
    }
}
