use std::fs;
use std::path::Path;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_DIRECTIVE: &str = "trial_pipeline=info";

/// Initializes logging with console output and daily-rolled JSON files under
/// `<log_dir>/<pipeline>/`.
pub fn init_logging(log_dir: &Path, pipeline: &str) {
    let dir = log_dir.join(pipeline);
    // Console logging still works if the directory cannot be created
    let _ = fs::create_dir_all(&dir);

    let file_appender = tracing_appender::rolling::daily(&dir, format!("{}.log", pipeline));
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);
    let console_layer = fmt::layer().with_target(false).with_writer(std::io::stdout);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    // try_init so a second call (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();

    // Keep the writer alive for the whole process so buffered lines are flushed
    std::mem::forget(guard);
}
