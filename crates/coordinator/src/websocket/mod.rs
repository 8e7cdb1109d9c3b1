//! WebSocket support for real-time coordination
//!
//! Provides WebSocket infrastructure for the delivery platform including:
//! - Presence tracking for sellers, agents, and customers
//! - Room-based pub/sub (pool rooms, per-agent rooms, per-order rooms)
//! - Order dispatch: announcing, claiming, and retracting claimable orders
//! - Live location relay and per-order chat
//!
//! # Architecture
//!
//! - **Connection**: Represents an active WebSocket connection and the
//!   identity it declared after connecting
//! - **Room**: Named pub/sub groups for broadcasting events
//! - **State**: Global WebSocket state shared across all connections
//! - **Handler**: Axum WebSocket route handler and event router
//! - **Events**: Type-safe event definitions for client/server communication

pub mod connection;
pub mod events;
pub mod handler;
pub mod room;
pub mod state;

pub use handler::ws_handler;
pub use state::WebSocketState;
