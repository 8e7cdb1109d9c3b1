//! Fleetly Coordinator Library
//!
//! This crate contains the presence & dispatch coordinator for Fleetly:
//! the WebSocket connection registry, room router, order dispatch
//! broadcaster, claim arbiter, location relay, and chat handshake.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod routes;
pub mod state;
pub mod store;
pub mod websocket;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
