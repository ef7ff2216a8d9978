//! Diagnostic output on stderr, driven by the `-v` count.

use std::io;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub fn level_for(loglevel: u8) -> LevelFilter {
    match loglevel {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// `RUST_LOG`, when set, takes precedence over the verbosity level.
pub fn init(loglevel: u8) {
    let filter = EnvFilter::builder()
        .with_default_directive(level_for(loglevel).into())
        .from_env_lossy();

    // Fails only if a subscriber is already installed, which is fine.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .compact()
        .without_time()
        .with_target(false)
        .try_init();
}
