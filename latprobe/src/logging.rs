use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber, printing to stderr.
///
/// `RUST_LOG` decides what is printed. Without it everything from `info`
/// up is, or from `debug` up when `verbose` is set.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn try_init(verbose: bool) -> Result<()> {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow!("cannot install the log subscriber: {error}"))
}
