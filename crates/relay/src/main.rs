use relay::{RelayConfig, RelayState, TracingSink, run_server};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RelayConfig::from_env();
    let _telemetry = common::init_observability(
        "relay",
        config.environment,
        config.otel_endpoint.as_deref(),
    )?;

    tracing::info!(
        environment = config.environment.as_str(),
        "Starting WebSocket relay"
    );

    run_server(config, RelayState::new(Arc::new(TracingSink))).await
}
