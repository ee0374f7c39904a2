use std::io;

use time::UtcOffset;
use time::macros::format_description;
use tracing_subscriber::{self, EnvFilter, fmt, prelude::*};

/// Initialize a stderr logger for applications embedding visit engines
///
/// # Arguments
/// * `no_color` - Disable ANSI colors in stderr output
/// * `log_level` - Override log level (otherwise uses RUST_LOG or defaults to "info")
///
/// # Logging Behavior
/// - **info**: engine construction summaries
/// - **debug**: plans and handler tables as they are built
/// - **trace**: every dispatch with its key and resolved operation
///
/// Calling this again after a subscriber is installed is not an error.
pub fn init_logger(no_color: bool, log_level: Option<&str>) -> io::Result<()> {
    let timer = fmt::time::OffsetTime::new(
        UtcOffset::UTC,
        format_description!("[[[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z]"),
    );

    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_timer(timer)
        .with_ansi(!no_color)
        .with_filter(filter);

    // Leaves the `log` facade to whichever logger already owns it
    let subscriber = tracing_subscriber::registry().with(stderr_layer);
    match tracing::subscriber::set_global_default(subscriber) {
        Ok(()) => Ok(()),
        Err(_) if tracing::dispatcher::has_been_set() => Ok(()),
        Err(e) => Err(io::Error::other(e)),
    }
}
