//! Logging setup using `tracing` and `tracing-subscriber`.
//!
//! # Log Levels
//!
//! - `error`: Request-level upload failures
//! - `warn`: Skipped records, per-feature upload failures, missing columns
//! - `info`: Stage progress and summary counts
//! - `debug`: Per-record and per-batch detail
//!
//! `RUST_LOG` takes precedence over the verbosity given on the command line.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Map a `-v` count to a level: none = info, `-v` = debug, `-vv` = trace.
pub fn level_from_verbosity(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the global subscriber, writing to stderr.
///
/// Calling it twice is harmless; the second call is ignored.
pub fn init_logging(verbosity: u8) {
    let level = level_from_verbosity(verbosity);
    let default_directive = format!("warn,flagload={}", level.as_str().to_ascii_lowercase());
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
