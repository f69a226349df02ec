//! Logging utilities
//!
//! Provides logging setup for the command-line client.

use env_logger::Env;

/// Setup logging; `RUST_LOG` wins over the verbosity flag.
pub fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}
