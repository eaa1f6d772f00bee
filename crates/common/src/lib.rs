pub mod config;
pub mod logging;
pub mod shutdown;
pub mod telemetry;

pub use config::{Environment, env_opt, env_or, env_parse};
pub use logging::setup_logging;
pub use shutdown::shutdown_signal;
pub use telemetry::TelemetryGuard;

/// Install logging for `service`: OTLP export when an endpoint is configured,
/// plain console logging otherwise. Keep the returned guard alive for the
/// lifetime of the process.
pub fn init_observability(
    service: &str,
    environment: Environment,
    otel_endpoint: Option<&str>,
) -> anyhow::Result<Option<TelemetryGuard>> {
    match otel_endpoint {
        Some(endpoint) => TelemetryGuard::init(service, endpoint, environment).map(Some),
        None => {
            setup_logging(environment);
            Ok(None)
        }
    }
}
