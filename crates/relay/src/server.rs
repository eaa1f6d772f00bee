use crate::{
    config::RelayConfig,
    events::{ConnectionInfo, EventSink},
    session::run_session,
};
use axum::{
    Router,
    extract::{ConnectInfo, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use std::{future::Future, net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct RelayState {
    pub sink: Arc<dyn EventSink>,
}

impl RelayState {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }
}

pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(config: RelayConfig, state: RelayState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&config.ws_addr).await?;
    tracing::info!("WebSocket relay listening on ws://{}", config.ws_addr);

    serve(listener, state, common::shutdown_signal()).await?;

    tracing::info!("WebSocket relay stopped");
    Ok(())
}

/// Serve the relay on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: RelayState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<RelayState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let conn = ConnectionInfo::next(peer);
        run_session(socket, conn, state.sink.as_ref()).await;
    })
}
