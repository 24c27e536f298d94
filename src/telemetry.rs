use tracing_subscriber::Layer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};

/// Install a stderr console subscriber filtered by `RUST_LOG`
///
/// Stdout is reserved for command output, so logs never mix with wire text
/// or parsed JSON.
pub fn init_tracing_subscriber() {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_default_env());

    tracing_subscriber::registry().with(console_layer).init();
}
