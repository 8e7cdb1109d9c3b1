//! Claim arbiter: race-safe order assignment
//!
//! N agents may try to accept the same order at once. The race is settled by
//! a single conditional update in the order store ("assign iff unassigned"),
//! never by in-process locking — first conditional update to commit wins,
//! with no priority among agents. The coordinator's job is only to translate
//! the store's verdict into room notifications.

use std::sync::Arc;
use time::OffsetDateTime;

use fleetly_shared::{AgentContact, AgentId, HistoryEntry, Order, OrderId, OrderStatus};

use crate::state::AppState;
use crate::websocket::connection::Connection;
use crate::websocket::events::ServerEvent;
use crate::websocket::room::SELLER_ROOM;

use super::broadcaster;

/// Accept path: at most one concurrent claimant wins
pub async fn accept_order(state: &AppState, conn: &Arc<Connection>, order_id: OrderId) {
    let Some(agent_id) = conn.agent_id().await else {
        let _ = conn.send(ServerEvent::Error {
            message: "Register as a delivery agent before accepting orders".to_string(),
        });
        return;
    };

    match state.store.claim(order_id, agent_id).await {
        Ok(Some(order)) => {
            tracing::info!(
                order_id = %order_id,
                agent_id = %agent_id,
                "Claim won"
            );

            // Winner gets the authoritative order; everyone else in the pool
            // drops it from their view.
            let _ = conn.send(ServerEvent::OrderUpdated {
                order: order.clone(),
            });
            broadcaster::retract(state, order_id, Some(conn.session_id)).await;

            if let Some(agent) = assigned_contact(state, &order, agent_id).await {
                state
                    .ws
                    .rooms
                    .broadcast(
                        SELLER_ROOM,
                        ServerEvent::OrderAcceptedByDelivery {
                            order_id,
                            status: order.status,
                            delivery_agent: agent,
                        },
                    )
                    .await;
            }

            if let Err(e) = state
                .store
                .append_history(HistoryEntry::accepted(&order, agent_id))
                .await
            {
                tracing::warn!(order_id = %order_id, error = ?e, "History append failed");
            }
        }
        Ok(None) => {
            // Normal outcome, not an error: the order was assigned to someone
            // else (or no longer exists, which clients treat the same way).
            tracing::debug!(order_id = %order_id, agent_id = %agent_id, "Claim lost");
            let _ = conn.send(ServerEvent::OrderRejectedNotification {
                success: false,
                message: "Order already taken!".to_string(),
            });
        }
        Err(e) => {
            tracing::error!(order_id = %order_id, error = ?e, "Claim failed: store error");
            let _ = conn.send(ServerEvent::Error {
                message: "Could not accept order, please retry".to_string(),
            });
        }
    }
}

/// Status update path, guarded on ownership. `Cancelled` releases the order
/// back into the pool; `Delivered` settles the ledger and the leaderboard.
pub async fn update_order_status(
    state: &AppState,
    conn: &Arc<Connection>,
    order_id: OrderId,
    status: OrderStatus,
) {
    let Some(agent_id) = conn.agent_id().await else {
        let _ = conn.send(ServerEvent::Error {
            message: "Register as a delivery agent before updating orders".to_string(),
        });
        return;
    };

    if status == OrderStatus::Cancelled {
        release_order(state, conn, order_id, agent_id).await;
        return;
    }

    match state.store.set_status(order_id, agent_id, status).await {
        Ok(Some(order)) => {
            let _ = conn.send(ServerEvent::OrderUpdated {
                order: order.clone(),
            });
            state
                .ws
                .rooms
                .broadcast(
                    SELLER_ROOM,
                    ServerEvent::OrderUpdated {
                        order: order.clone(),
                    },
                )
                .await;

            if status == OrderStatus::Delivered {
                settle_delivery(state, conn, &order, agent_id).await;
            }
        }
        Ok(None) => {
            // Not the owner (or the order vanished): silently dropped, stale
            // retries are routine.
            tracing::debug!(
                order_id = %order_id,
                agent_id = %agent_id,
                "Status update on non-owned order dropped"
            );
        }
        Err(e) => {
            tracing::error!(order_id = %order_id, error = ?e, "Status update failed: store error");
            let _ = conn.send(ServerEvent::Error {
                message: "Could not update order status, please retry".to_string(),
            });
        }
    }
}

/// Release path: clear the assignment and hand the order back to the pool
async fn release_order(
    state: &AppState,
    conn: &Arc<Connection>,
    order_id: OrderId,
    agent_id: AgentId,
) {
    match state.store.release(order_id, agent_id).await {
        Ok(Some(order)) => {
            tracing::info!(order_id = %order_id, agent_id = %agent_id, "Order released to pool");

            let _ = conn.send(ServerEvent::OrderUpdated {
                order: order.clone(),
            });
            state
                .ws
                .rooms
                .broadcast(
                    SELLER_ROOM,
                    ServerEvent::OrderUpdated {
                        order: order.clone(),
                    },
                )
                .await;

            if let Err(e) = state
                .store
                .append_history(HistoryEntry::cancelled(&order, agent_id))
                .await
            {
                tracing::warn!(order_id = %order_id, error = ?e, "History append failed");
            }

            // Back into circulation for the remaining agents
            broadcaster::announce(state, order_id).await;
        }
        Ok(None) => {
            tracing::debug!(
                order_id = %order_id,
                agent_id = %agent_id,
                "Release of non-owned order dropped"
            );
        }
        Err(e) => {
            tracing::error!(order_id = %order_id, error = ?e, "Release failed: store error");
            let _ = conn.send(ServerEvent::Error {
                message: "Could not cancel order, please retry".to_string(),
            });
        }
    }
}

/// Delivered bookkeeping: ledger entry, agent counters, notifications
async fn settle_delivery(
    state: &AppState,
    conn: &Arc<Connection>,
    order: &Order,
    agent_id: AgentId,
) {
    let now = OffsetDateTime::now_utc();
    if let Err(e) = state
        .store
        .append_history(HistoryEntry::delivered(order, agent_id, now))
        .await
    {
        tracing::warn!(order_id = %order.id, error = ?e, "History append failed");
    }
    if let Err(e) = state.store.record_delivery(agent_id).await {
        tracing::warn!(agent_id = %agent_id, error = ?e, "Delivery counter update failed");
    }

    if let Some(agent) = assigned_contact(state, order, agent_id).await {
        let _ = conn.send(ServerEvent::OrderDelivered {
            order_id: order.id,
            delivery_agent: agent.clone(),
        });
        state
            .ws
            .rooms
            .broadcast(
                SELLER_ROOM,
                ServerEvent::OrderDelivered {
                    order_id: order.id,
                    delivery_agent: agent,
                },
            )
            .await;
    }

    state.ws.broadcast_all(ServerEvent::LeaderboardUpdated).await;
}

/// Contact card for the assigned agent, falling back to a store lookup when
/// the populated order did not carry one.
async fn assigned_contact(
    state: &AppState,
    order: &Order,
    agent_id: AgentId,
) -> Option<AgentContact> {
    if let Some(agent) = order.agent.clone() {
        return Some(agent);
    }
    match state.store.agent_contact(agent_id).await {
        Ok(Some(agent)) => Some(agent),
        Ok(None) => {
            tracing::warn!(agent_id = %agent_id, "No contact card for assigned agent");
            None
        }
        Err(e) => {
            tracing::warn!(agent_id = %agent_id, error = ?e, "Agent contact lookup failed");
            None
        }
    }
}
