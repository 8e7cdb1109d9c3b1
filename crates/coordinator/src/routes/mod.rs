//! HTTP routes
//!
//! The coordinator's HTTP surface is deliberately small: health probes for
//! infrastructure monitoring and the WebSocket upgrade endpoint. Everything
//! else happens over the socket.

pub mod health;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::state::AppState;
use crate::websocket::ws_handler;

/// Create all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/ws", get(ws_handler))
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn fallback() -> ApiError {
    ApiError::NotFound
}
