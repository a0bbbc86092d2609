/// Set up logging to stderr, leaving stdout for results.
///
/// - If RUST_LOG is not set, fall back to a helpful default.
pub fn setup_logging() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_filter(filter);

    tracing_subscriber::registry().with(fmt_layer).init();
}
