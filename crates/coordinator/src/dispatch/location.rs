//! Location relay: live coordinates scoped to one order room
//!
//! Fire-and-forget by design. Nothing is persisted and stale or out-of-order
//! samples are tolerated; receivers apply last-write-wins to their displayed
//! position.

use std::sync::Arc;

use crate::state::AppState;
use crate::websocket::connection::Connection;
use crate::websocket::events::{LocationSample, ServerEvent};

/// Ask the other room members to share their position
pub async fn request_location(state: &AppState, conn: &Arc<Connection>, room: &str) {
    state
        .ws
        .rooms
        .broadcast_except(
            room,
            ServerEvent::RequestLocationPing {
                requester_id: conn.session_id,
            },
            conn.session_id,
        )
        .await;
}

/// Forward a coordinate sample to the other room members; the sender never
/// receives its own sample back.
pub async fn share_location(
    state: &AppState,
    conn: &Arc<Connection>,
    room: &str,
    location: LocationSample,
) {
    state
        .ws
        .rooms
        .broadcast_except(
            room,
            ServerEvent::ReceiveLocation { location },
            conn.session_id,
        )
        .await;
}
