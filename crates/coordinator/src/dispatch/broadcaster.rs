//! Dispatch broadcaster: announce and retract claimable orders

use uuid::Uuid;

use fleetly_shared::OrderId;

use crate::state::AppState;
use crate::websocket::events::ServerEvent;
use crate::websocket::room::DELIVERY_ROOM;

/// Announce a claimable order to every agent in the pool.
///
/// The order is always re-fetched from the store so the pool sees the
/// current, fully-populated representation, not whatever the triggering
/// client happened to hold.
pub async fn announce(state: &AppState, order_id: OrderId) {
    match state.store.find_order(order_id).await {
        Ok(Some(order)) => {
            tracing::info!(order_id = %order_id, "Announcing order to delivery pool");
            state
                .ws
                .rooms
                .broadcast(DELIVERY_ROOM, ServerEvent::NewDeliveryOrder { order })
                .await;
        }
        Ok(None) => {
            // Retracted or deleted between the trigger and the fetch
            tracing::warn!(order_id = %order_id, "Announce skipped: order not found");
        }
        Err(e) => {
            tracing::error!(order_id = %order_id, error = ?e, "Announce failed: store error");
        }
    }
}

/// Retract an order from the pool so agents drop it from their view,
/// optionally excluding one session (the winning claimant, which already
/// received the order via its own reply).
pub async fn retract(state: &AppState, order_id: OrderId, exclude: Option<Uuid>) {
    let event = ServerEvent::OrderRemoved { order_id };
    match exclude {
        Some(session_id) => {
            state
                .ws
                .rooms
                .broadcast_except(DELIVERY_ROOM, event, session_id)
                .await
        }
        None => state.ws.rooms.broadcast(DELIVERY_ROOM, event).await,
    }
}
