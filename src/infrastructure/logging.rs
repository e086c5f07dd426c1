//! Logging configuration
//!
//! Initializes tracing for the application.

/// Initializes logging with the specified level
///
/// `RUST_LOG` takes precedence over `level`. Calling this more than once
/// keeps the first subscriber.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let installed = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .try_init();

    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
