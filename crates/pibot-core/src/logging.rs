use tracing_subscriber::{fmt, EnvFilter};

/// Initialize logging/tracing for the process.
///
/// `verbose` raises the default filter to debug; `RUST_LOG` overrides
/// either default.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .init();
}
