//! Diagnostic logging for the runner itself.
//!
//! Report lines go to stdout through [`Reporter`](crate::report::Reporter);
//! runner diagnostics are `tracing` events on stderr, filtered by `SPECRUN_LOG`
//! (`EnvFilter` syntax, e.g. `SPECRUN_LOG=specrun=debug`).

use tracing_subscriber::EnvFilter;

use crate::config::LOG_ENV;

/// Install a stderr `fmt` subscriber. Does nothing if one is already set.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
