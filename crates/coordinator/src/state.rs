//! Shared application state

use std::sync::Arc;

use crate::config::Config;
use crate::store::OrderStore;
use crate::websocket::WebSocketState;

/// Application state shared across all request handlers and the event router
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    /// Order and agent storage; the sole arbiter of contended mutations
    pub store: Arc<dyn OrderStore>,

    /// Connection registry and room manager
    pub ws: WebSocketState,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn OrderStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            ws: WebSocketState::new(),
        }
    }
}
