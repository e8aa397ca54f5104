//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set: `debug` with `--verbose`,
/// otherwise the configured level, otherwise `info`.
pub fn default_directive(verbose: bool, configured: Option<&str>) -> String {
    if verbose {
        return "debug".to_string();
    }
    configured
        .filter(|level| !level.trim().is_empty())
        .unwrap_or("info")
        .to_string()
}

/// Installs the global subscriber, logging to stderr.
pub fn init(verbose: bool, configured: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, configured)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
