use gateway::{config::Settings, run_server, state::AppState};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    let _telemetry = common::init_observability(
        "gateway",
        settings.environment,
        settings.otel_endpoint.as_deref(),
    )?;

    tracing::info!(
        environment = settings.environment.as_str(),
        model = %settings.inference.model_path,
        provider = %settings.inference.execution_provider,
        "Starting detection gateway"
    );

    let detector = inference::load_detector(&settings.inference)?;
    let state = AppState::new(Arc::new(detector), settings.gateway.request_timeout());

    run_server(settings.gateway, state).await
}
