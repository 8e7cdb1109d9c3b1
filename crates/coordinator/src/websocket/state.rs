//! Connection registry and global WebSocket state
//!
//! The registry is the single source of truth for "who is online". It owns
//! the connection map and the room manager; `remove_connection` is the
//! disconnect reaper, which must leave no orphaned state behind.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use fleetly_shared::AgentId;

use super::connection::Connection;
use super::events::ServerEvent;
use super::room::{agent_room, RoomManager, DELIVERY_ROOM};

/// Global WebSocket state shared across all connections
#[derive(Clone)]
pub struct WebSocketState {
    /// All active connections indexed by session_id
    connections: Arc<RwLock<HashMap<Uuid, Arc<Connection>>>>,

    /// Room manager for pub/sub
    pub rooms: Arc<RoomManager>,
}

impl WebSocketState {
    /// Create new WebSocket state
    pub fn new() -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            rooms: Arc::new(RoomManager::new()),
        }
    }

    /// Add a connection
    pub async fn add_connection(&self, conn: Connection) -> Arc<Connection> {
        let conn = Arc::new(conn);
        let mut connections = self.connections.write().await;
        connections.insert(conn.session_id, Arc::clone(&conn));

        tracing::info!(
            session_id = %conn.session_id,
            total_connections = connections.len(),
            "WebSocket connection added"
        );

        conn
    }

    /// Remove a connection and all of its room memberships (the disconnect
    /// reaper). Unknown or already-removed sessions are a no-op.
    ///
    /// A bound agent's assigned order is deliberately left untouched:
    /// presence loss is not order abandonment, since reconnects are routine
    /// on mobile networks. Only an explicit cancel releases an assignment.
    pub async fn remove_connection(&self, session_id: &Uuid) {
        let mut connections = self.connections.write().await;
        if connections.remove(session_id).is_some() {
            drop(connections);
            self.rooms.remove_connection(session_id).await;

            tracing::info!(
                session_id = %session_id,
                "WebSocket connection removed"
            );
        }
    }

    /// Get a connection by session ID
    pub async fn get_connection(&self, session_id: &Uuid) -> Option<Arc<Connection>> {
        let connections = self.connections.read().await;
        connections.get(session_id).cloned()
    }

    /// Bind a connection to an agent identity and join its pool rooms
    pub async fn bind_agent(&self, conn: &Arc<Connection>, agent_id: AgentId) {
        conn.bind_agent(agent_id).await;
        self.rooms.join(DELIVERY_ROOM, Arc::clone(conn)).await;
        self.rooms.join(&agent_room(agent_id), Arc::clone(conn)).await;

        tracing::info!(
            session_id = %conn.session_id,
            agent_id = %agent_id,
            "Agent bound to connection"
        );
    }

    /// Find the live connection bound to an agent, if any
    pub async fn agent_connection(&self, agent_id: AgentId) -> Option<Arc<Connection>> {
        let connections = self.connections.read().await;
        for conn in connections.values() {
            if conn.agent_id().await == Some(agent_id) {
                return Some(Arc::clone(conn));
            }
        }
        None
    }

    /// Broadcast an event to every connected client
    pub async fn broadcast_all(&self, event: ServerEvent) {
        let connections = self.connections.read().await;
        for conn in connections.values() {
            let _ = conn.send(event.clone());
        }
    }

    /// Get total number of active connections
    pub async fn connection_count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }
}

impl Default for WebSocketState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn make_connection() -> (Connection, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Connection::new(tx), rx)
    }

    #[tokio::test]
    async fn test_add_and_remove_connection() {
        let state = WebSocketState::new();
        let (conn, _rx) = make_connection();

        let conn = state.add_connection(conn).await;
        assert_eq!(state.connection_count().await, 1);

        state.remove_connection(&conn.session_id).await;
        assert_eq!(state.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_remove_unknown_connection_is_noop() {
        let state = WebSocketState::new();
        // A duplicate or late disconnect must never fail
        state.remove_connection(&Uuid::new_v4()).await;
        assert_eq!(state.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_reaper_clears_room_memberships() {
        let state = WebSocketState::new();
        let (conn, _rx) = make_connection();
        let conn = state.add_connection(conn).await;

        state.rooms.join("r1", Arc::clone(&conn)).await;
        state.rooms.join("r2", Arc::clone(&conn)).await;

        state.remove_connection(&conn.session_id).await;
        assert_eq!(state.rooms.room_count().await, 0);
        assert!(conn.joined_rooms().await.is_empty());
    }

    #[tokio::test]
    async fn test_bind_agent_joins_pool_rooms() {
        let state = WebSocketState::new();
        let (conn, _rx) = make_connection();
        let conn = state.add_connection(conn).await;

        let agent_id = AgentId::new();
        state.bind_agent(&conn, agent_id).await;

        assert_eq!(state.rooms.room_size(DELIVERY_ROOM).await, 1);
        assert_eq!(state.rooms.room_size(&agent_room(agent_id)).await, 1);

        let found = state.agent_connection(agent_id).await;
        assert_eq!(found.map(|c| c.session_id), Some(conn.session_id));
    }

    #[tokio::test]
    async fn test_broadcast_all_reaches_everyone() {
        let state = WebSocketState::new();
        let (c1, mut rx1) = make_connection();
        let (c2, mut rx2) = make_connection();
        state.add_connection(c1).await;
        state.add_connection(c2).await;

        state.broadcast_all(ServerEvent::LeaderboardUpdated).await;

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }
}
