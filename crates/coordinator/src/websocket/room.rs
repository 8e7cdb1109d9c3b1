//! Room management for pub/sub
//!
//! Rooms are named broadcast groups. A connection can join any number of
//! rooms; an event published to a room reaches every member, optionally
//! excluding the publisher so a sender never receives its own broadcast.
//!
//! Naming convention: `sellerRoom` and `deliveryRoom` are well-known pool
//! rooms; `agent:<agentId>` targets one agent; a bare order UUID scopes a
//! room to one order. Order and agent ids come from disjoint identifier
//! spaces, so the flat namespace cannot collide.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use fleetly_shared::{AgentId, OrderId};

use super::connection::Connection;
use super::events::ServerEvent;

/// All seller dashboard connections
pub const SELLER_ROOM: &str = "sellerRoom";

/// All registered delivery agents (the claim pool)
pub const DELIVERY_ROOM: &str = "deliveryRoom";

/// Targeted per-agent room name
pub fn agent_room(agent_id: AgentId) -> String {
    format!("agent:{agent_id}")
}

/// Per-order room name
pub fn order_room(order_id: OrderId) -> String {
    order_id.to_string()
}

/// Manages named rooms for broadcasting events
pub struct RoomManager {
    /// Map of room name -> member connections
    rooms: Arc<RwLock<HashMap<String, Vec<Arc<Connection>>>>>,
}

impl RoomManager {
    /// Create a new room manager
    pub fn new() -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Add a connection to a room; joining twice is a no-op
    pub async fn join(&self, room: &str, conn: Arc<Connection>) {
        let mut rooms = self.rooms.write().await;
        let members = rooms.entry(room.to_string()).or_insert_with(Vec::new);
        if !members.iter().any(|c| c.session_id == conn.session_id) {
            members.push(Arc::clone(&conn));
        }
        let count = members.len();
        drop(rooms);

        conn.note_joined(room).await;
        tracing::debug!(
            room = %room,
            session_id = %conn.session_id,
            room_size = count,
            "Connection joined room"
        );
    }

    /// Remove a connection from a room
    pub async fn leave(&self, room: &str, session_id: &Uuid) {
        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(room) {
            let mut left = None;
            members.retain(|c| {
                if c.session_id == *session_id {
                    left = Some(Arc::clone(c));
                    false
                } else {
                    true
                }
            });

            // Clean up empty rooms
            if members.is_empty() {
                rooms.remove(room);
                tracing::debug!(room = %room, "Removed empty room");
            }
            drop(rooms);

            if let Some(conn) = left {
                conn.note_left(room).await;
            }
        }
    }

    /// Remove a connection from all rooms
    pub async fn remove_connection(&self, session_id: &Uuid) {
        let mut rooms = self.rooms.write().await;
        let mut removed = Vec::new();

        for (room, members) in rooms.iter_mut() {
            let before_len = members.len();
            let mut conn = None;
            members.retain(|c| {
                if c.session_id == *session_id {
                    conn = Some(Arc::clone(c));
                    false
                } else {
                    true
                }
            });
            if members.len() < before_len {
                if let Some(conn) = conn {
                    removed.push((room.clone(), conn));
                }
            }
        }

        // Clean up empty rooms
        rooms.retain(|_, members| !members.is_empty());
        drop(rooms);

        for (room, conn) in &removed {
            conn.note_left(room).await;
        }

        if !removed.is_empty() {
            tracing::debug!(
                session_id = %session_id,
                room_count = removed.len(),
                "Removed connection from rooms"
            );
        }
    }

    /// Broadcast an event to every member of a room
    ///
    /// Publishing to an absent room is a silent no-op; send errors to closed
    /// connections are logged and ignored (the reaper cleans those up).
    pub async fn broadcast(&self, room: &str, event: ServerEvent) {
        self.broadcast_inner(room, event, None).await;
    }

    /// Broadcast to a room, excluding one session (self-echo suppression)
    pub async fn broadcast_except(&self, room: &str, event: ServerEvent, exclude: Uuid) {
        self.broadcast_inner(room, event, Some(exclude)).await;
    }

    async fn broadcast_inner(&self, room: &str, event: ServerEvent, exclude: Option<Uuid>) {
        let rooms = self.rooms.read().await;
        let Some(members) = rooms.get(room) else {
            tracing::debug!(room = %room, "No members in room - dropping broadcast");
            return;
        };

        let mut recipients = 0;
        let mut failed = 0;
        for conn in members {
            if Some(conn.session_id) == exclude {
                continue;
            }
            match conn.send(event.clone()) {
                Ok(()) => recipients += 1,
                Err(_) => {
                    failed += 1;
                    tracing::warn!(
                        session_id = %conn.session_id,
                        "Failed to send event to connection (likely closed)"
                    );
                }
            }
        }

        tracing::debug!(
            room = %room,
            recipients,
            failed,
            "Broadcast event to room"
        );
    }

    /// Get room size (number of connections) for a room
    pub async fn room_size(&self, room: &str) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(room).map(|v| v.len()).unwrap_or(0)
    }

    /// Get total number of active rooms
    pub async fn room_count(&self) -> usize {
        let rooms = self.rooms.read().await;
        rooms.len()
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}
