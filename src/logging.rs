//! Diagnostic logging setup.
//!
//! Library code logs through `tracing`; the binary installs a subscriber
//! writing to stderr so log lines never mix with reader output.

use anyhow::Context as _;

/// Installs the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise warnings only, or debug output for
/// this crate when `verbose` is on.
pub fn init(verbose: bool) -> anyhow::Result<()> {
    let default_directive = if verbose { "shiori=debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_directive))
        .context("build log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}
