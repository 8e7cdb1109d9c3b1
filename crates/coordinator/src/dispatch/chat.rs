//! Chat handshake: the per-order state machine gating message exchange
//!
//! States: none → requested → accepted, with an explicit reject resetting
//! requested → none. Transitions are persisted through the store's
//! conditional chat update, so stale or duplicate client retries (routine on
//! this transport) are absorbed as no-ops rather than surfaced as failures.

use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use fleetly_shared::{ChatStatus, OrderId, Role};

use crate::state::AppState;
use crate::websocket::connection::Connection;
use crate::websocket::events::ServerEvent;

/// none → requested: persist, then notify the counterpart with the
/// requester's identity
pub async fn request_connection(state: &AppState, conn: &Arc<Connection>, room: &str) {
    let Some(applied) =
        persist_transition(state, conn, room, ChatStatus::None, ChatStatus::Requested).await
    else {
        return; // store failure already reported to the requester
    };
    if !applied {
        tracing::debug!(room = %room, "Duplicate chat request dropped");
        return;
    }

    let sender_name = conn.display_name_or_default().await;
    state
        .ws
        .rooms
        .broadcast_except(
            room,
            ServerEvent::RequestConnection {
                sender_id: conn.session_id,
                sender_name,
            },
            conn.session_id,
        )
        .await;
}

/// requested → accepted: persist, then unlock the chat UI on both ends
/// (targeted delivery, not a room broadcast)
pub async fn accept_connection(
    state: &AppState,
    conn: &Arc<Connection>,
    room: &str,
    sender_id: Uuid,
) {
    let Some(applied) =
        persist_transition(state, conn, room, ChatStatus::Requested, ChatStatus::Accepted).await
    else {
        return;
    };
    if !applied {
        tracing::debug!(room = %room, "Accept with no outstanding request dropped");
        return;
    }

    if let Some(requester) = state.ws.get_connection(&sender_id).await {
        let _ = requester.send(ServerEvent::AcceptConnection);
    }
    let _ = conn.send(ServerEvent::AcceptConnection);
}

/// requested → none: persist the reset, then notify the requester only
pub async fn reject_connection(
    state: &AppState,
    conn: &Arc<Connection>,
    room: &str,
    sender_id: Uuid,
) {
    let Some(applied) =
        persist_transition(state, conn, room, ChatStatus::Requested, ChatStatus::None).await
    else {
        return;
    };
    if !applied {
        tracing::debug!(room = %room, "Reject with no outstanding request dropped");
        return;
    }

    if let Some(requester) = state.ws.get_connection(&sender_id).await {
        let _ = requester.send(ServerEvent::RejectConnection);
    }
}

/// Fan a chat message out to every other member of the order room
pub async fn send_message(
    state: &AppState,
    conn: &Arc<Connection>,
    room: &str,
    message: String,
    sender_name: String,
    sender_role: Role,
    timestamp: Option<String>,
) {
    let timestamp = timestamp.unwrap_or_else(|| {
        OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default()
    });

    state
        .ws
        .rooms
        .broadcast_except(
            room,
            ServerEvent::ReceiveMessage {
                sender_id: conn.session_id,
                sender_name,
                sender_role,
                message,
                timestamp,
            },
            conn.session_id,
        )
        .await;
}

/// Persist a handshake transition for the order the room is scoped to.
///
/// Returns `None` on store failure (after notifying the requester),
/// otherwise whether the transition applied. Rooms that are not order rooms
/// carry no persisted chat state; the transition trivially does not apply.
async fn persist_transition(
    state: &AppState,
    conn: &Arc<Connection>,
    room: &str,
    from: ChatStatus,
    to: ChatStatus,
) -> Option<bool> {
    let Ok(order_id) = room.parse::<Uuid>().map(OrderId) else {
        tracing::debug!(room = %room, "Chat transition in non-order room dropped");
        return Some(false);
    };

    match state.store.transition_chat(order_id, from, to).await {
        Ok(applied) => Some(applied),
        Err(e) => {
            tracing::error!(order_id = %order_id, error = ?e, "Chat transition failed: store error");
            let _ = conn.send(ServerEvent::Error {
                message: "Could not update chat state, please retry".to_string(),
            });
            None
        }
    }
}
