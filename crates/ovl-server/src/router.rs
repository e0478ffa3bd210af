use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{State, WebSocketUpgrade};
use axum::response::{Json, Response};
use axum::routing::get;
use axum::Router;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use ovl_protocol::HealthResponse;

use crate::broker::Broker;
use crate::session;

/// Shared state handed to every request handler and session.
#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<Broker>,
    pub uploads_dir: PathBuf,
}

/// Build the axum router with all OVL endpoints.
///
/// `/ws` carries both sync and upload traffic; `/uploads` serves finalized
/// artifacts straight from disk. CORS is wide open: controllers and
/// overlay views are served from arbitrary origins on the venue network.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(health_handler))
        .route("/v1/info", get(info_handler))
        .route("/ws", get(ws_handler))
        .nest_service("/uploads", ServeDir::new(state.uploads_dir.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "name": "ovl-server",
        "version": env!("CARGO_PKG_VERSION"),
        "protocol_version": ovl_protocol::PROTOCOL_VERSION,
        "keys": state.broker.key_count(),
    }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| session::handle_socket(socket, state))
}
