use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global JSON subscriber.
/// `RUST_LOG` overrides `default_filter` when set.
pub fn init_telemetry(default_filter: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .json();

    // A second init (e.g. from tests) keeps the first subscriber
    if tracing_subscriber::registry()
        .with(env_filter)
        .with(formatting_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("Telemetry already initialized");
    }
}
