//! Tracing setup shared by the binaries.
//!
//! Diagnostics always go to stderr. `RUST_LOG` overrides the default
//! filter. The CLI can additionally tee records into a daily-rotated file
//! under [`crate::app_dirs::logs_dir`].

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "handoff=info";

/// File name prefix for rotated log files.
pub const LOG_FILE_PREFIX: &str = "handoff.log";

/// Logging options.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Raise the default filter to `debug`.
    pub verbose: bool,
    /// Directory for a rotating log file, if any.
    pub file_dir: Option<PathBuf>,
}

impl LogOptions {
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if self.verbose {
                EnvFilter::new("handoff=debug")
            } else {
                EnvFilter::new(DEFAULT_FILTER)
            }
        })
    }
}

/// Install the global subscriber.
///
/// Returns the file writer guard when a log file was requested; keep it
/// alive until exit or buffered records are lost. Calling this twice is
/// harmless: the second subscriber is ignored.
pub fn init(options: &LogOptions) -> Option<WorkerGuard> {
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let (file_layer, guard) = match &options.file_dir {
        Some(dir) => match std::fs::create_dir_all(dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer);
                (Some(layer), Some(guard))
            }
            Err(e) => {
                eprintln!("cannot create log directory {}: {e}", dir.display());
                (None, None)
            }
        },
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(options.filter())
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    guard
}
