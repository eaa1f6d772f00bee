use crate::config::Environment;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Filter from `RUST_LOG`, or `info` when unset or invalid.
pub(crate) fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Console layer: JSON lines in production, pretty ANSI output in development.
pub(crate) fn fmt_layer(environment: Environment) -> Box<dyn Layer<Registry> + Send + Sync> {
    match environment {
        Environment::Production => tracing_subscriber::fmt::layer()
            .json()
            .with_level(true)
            .with_current_span(false)
            .boxed(),
        Environment::Development => tracing_subscriber::fmt::layer()
            .pretty()
            .with_ansi(true)
            .boxed(),
    }
}

/// Install the global subscriber for a service without an OTLP collector.
///
/// The OpenTelemetry layer is still attached so spans reach a tracer provider
/// if one gets registered later; without one it is a no-op.
pub fn setup_logging(environment: Environment) {
    tracing_subscriber::registry()
        .with(fmt_layer(environment))
        .with(env_filter())
        .with(tracing_opentelemetry::layer())
        .init();
}
