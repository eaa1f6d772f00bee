pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod state;

use crate::{config::GatewayConfig, state::AppState};
use axum::{Router, extract::DefaultBodyLimit, routing::post};
use tower_http::cors::CorsLayer;

pub fn router(state: AppState, config: &GatewayConfig) -> Router {
    Router::new()
        .route("/detect", post(routes::detect))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(config: GatewayConfig, state: AppState) -> anyhow::Result<()> {
    let app = router(state, &config);

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!("Detection API listening on {}", config.http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(common::shutdown_signal())
        .await?;

    tracing::info!("Detection API stopped");
    Ok(())
}
