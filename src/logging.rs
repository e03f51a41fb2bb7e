use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Send logs to stderr so stdout stays clean for `--json` and downloads.
///
/// `RUST_LOG` wins over the configured filter.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}
