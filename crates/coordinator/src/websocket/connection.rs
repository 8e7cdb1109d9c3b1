//! WebSocket connection management
//!
//! Represents an active WebSocket connection together with the identity it
//! declared after connecting (role, display name, bound agent id) and the
//! rooms it has joined.

use std::collections::HashSet;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use fleetly_shared::{AgentId, Role};

use super::events::ServerEvent;

/// Identity a connection declares through registration events
#[derive(Debug, Default, Clone)]
struct Identity {
    role: Role,
    display_name: Option<String>,
    agent_id: Option<AgentId>,
}

/// Represents an active WebSocket connection
#[derive(Debug)]
pub struct Connection {
    /// Unique session ID for this connection
    pub session_id: Uuid,

    /// Channel to send events to this connection
    sender: mpsc::UnboundedSender<ServerEvent>,

    /// Declared identity; overwritten idempotently by registration events
    identity: RwLock<Identity>,

    /// Names of the rooms this connection has joined
    rooms: RwLock<HashSet<String>>,
}

impl Connection {
    /// Create a new connection
    pub fn new(sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            sender,
            identity: RwLock::new(Identity::default()),
            rooms: RwLock::new(HashSet::new()),
        }
    }

    /// Send an event to this connection
    ///
    /// Returns Ok(()) if sent successfully, Err if the connection is closed
    #[allow(clippy::result_large_err)] // Error type is from tokio mpsc, containing the failed event
    pub fn send(&self, event: ServerEvent) -> Result<(), mpsc::error::SendError<ServerEvent>> {
        self.sender.send(event)
    }

    /// Register a display name; overwrites any prior name
    pub async fn set_name(&self, name: String) {
        self.identity.write().await.display_name = Some(name);
    }

    pub async fn display_name(&self) -> Option<String> {
        self.identity.read().await.display_name.clone()
    }

    /// Display name with the fallback shown to chat counterparts
    pub async fn display_name_or_default(&self) -> String {
        self.display_name()
            .await
            .unwrap_or_else(|| "Delivery Partner".to_string())
    }

    pub async fn set_role(&self, role: Role) {
        self.identity.write().await.role = role;
    }

    pub async fn role(&self) -> Role {
        self.identity.read().await.role
    }

    /// Bind this connection to a durable agent identity
    pub async fn bind_agent(&self, agent_id: AgentId) {
        let mut identity = self.identity.write().await;
        identity.agent_id = Some(agent_id);
        identity.role = Role::Agent;
    }

    pub async fn agent_id(&self) -> Option<AgentId> {
        self.identity.read().await.agent_id
    }

    /// Record a joined room (membership itself lives in the room manager)
    pub async fn note_joined(&self, room: &str) {
        self.rooms.write().await.insert(room.to_string());
    }

    /// Drop a room from the joined set
    pub async fn note_left(&self, room: &str) {
        self.rooms.write().await.remove(room);
    }

    pub async fn joined_rooms(&self) -> HashSet<String> {
        self.rooms.read().await.clone()
    }
}
