//! WebSocket event types and serialization
//!
//! Defines all client-to-server and server-to-client event types with
//! type-safe serde serialization. Event names on the wire are kept exactly
//! as deployed agent/dashboard/customer clients already speak them, which is
//! why the tags mix snake_case, camelCase, and kebab-case.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fleetly_shared::{AgentContact, AgentId, Order, OrderId, OrderStatus, Role};

// =============================================================================
// Client-to-Server Events
// =============================================================================

/// Events sent from client to server
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Register a display name for this connection
    SetName { name: String },

    /// Join the seller dashboard room
    JoinSeller,

    /// Bind this connection to a delivery agent identity
    #[serde(rename = "registerDeliveryBoy")]
    RegisterAgent { agent_id: AgentId },

    /// Join the room scoped to one order
    JoinOrderRoom { order_id: OrderId },

    /// Ask the other room members to share their position
    RequestLocation { room: String },

    /// Broadcast own coordinates to the other room members
    ShareLocation { room: String, location: LocationSample },

    /// Chat handshake: ask the counterpart to open a chat
    RequestConnection { room: String },

    /// Chat handshake: accept an outstanding request
    AcceptConnection { room: String, sender_id: Uuid },

    /// Chat handshake: reject an outstanding request
    RejectConnection { room: String, sender_id: Uuid },

    /// Relay a chat message to the other room members
    SendMessage {
        room: String,
        message: String,
        sender_name: String,
        sender_role: Role,
        #[serde(default)]
        timestamp: Option<String>,
    },

    /// Announce a claimable order to the agent pool
    #[serde(rename = "send-to-delivery")]
    SendToDelivery { order: OrderRef },

    /// Claim an order (race-safe; at most one agent wins)
    #[serde(rename = "accept-order")]
    AcceptOrder { order_id: OrderId },

    /// Move an owned order to a new workflow status
    #[serde(rename = "update-order-status")]
    UpdateOrderStatus {
        order_id: OrderId,
        status: OrderStatus,
    },

    /// Heartbeat ping to keep the connection alive
    Ping,
}

/// Reference to an order inside a client payload; only the id matters, the
/// coordinator always re-fetches the authoritative representation.
#[derive(Debug, Deserialize)]
pub struct OrderRef {
    pub id: OrderId,
}

/// A live coordinate pair; transient, never persisted
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
}

// =============================================================================
// Server-to-Client Events
// =============================================================================

/// Events sent from server to client
#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Connection acknowledged
    Connected { session_id: Uuid },

    /// Heartbeat response
    Pong,

    /// Request-scoped failure notice
    Error { message: String },

    /// The registering agent's current order list
    #[serde(rename = "myOrders")]
    MyOrders { orders: Vec<Order> },

    /// A claimable order entered the pool
    #[serde(rename = "newDeliveryOrder")]
    NewDeliveryOrder { order: Order },

    /// An order left the pool (claimed elsewhere or retracted)
    #[serde(rename = "orderRemoved")]
    OrderRemoved { order_id: OrderId },

    /// Authoritative order state after a successful mutation
    #[serde(rename = "orderUpdated")]
    OrderUpdated { order: Order },

    /// Claim lost: the order was already taken
    #[serde(rename = "orderRejectedNotification")]
    OrderRejectedNotification { success: bool, message: String },

    /// Seller notice: an agent won the claim
    #[serde(rename = "orderAcceptedByDelivery")]
    OrderAcceptedByDelivery {
        order_id: OrderId,
        status: OrderStatus,
        delivery_agent: AgentContact,
    },

    /// Delivery completed
    #[serde(rename = "orderDelivered")]
    OrderDelivered {
        order_id: OrderId,
        delivery_agent: AgentContact,
    },

    /// The delivery leaderboard changed; clients should re-query
    #[serde(rename = "leaderboardUpdated")]
    LeaderboardUpdated,

    /// Someone in the room asked for positions
    RequestLocationPing { requester_id: Uuid },

    /// A room member shared their position
    ReceiveLocation { location: LocationSample },

    /// Chat handshake request relayed to the counterpart
    RequestConnection {
        sender_id: Uuid,
        sender_name: String,
    },

    /// Chat handshake accepted (sent to both parties)
    AcceptConnection,

    /// Chat handshake rejected (sent to the requester only)
    RejectConnection,

    /// Chat message relayed to the other room members
    ReceiveMessage {
        sender_id: Uuid,
        sender_name: String,
        sender_role: Role,
        message: String,
        timestamp: String,
    },
}
