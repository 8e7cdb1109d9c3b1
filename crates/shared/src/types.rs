//! Common domain types used across Fleetly

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// ID Wrappers
// =============================================================================

/// Order ID wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct OrderId(pub Uuid);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for OrderId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Delivery agent ID wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for AgentId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Role a connection declares after the transport-level handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Agent,
    Seller,
    Customer,
    Unknown,
}

impl Default for Role {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Order workflow state
///
/// The wire strings are the ones deployed clients already display, so they
/// are kept verbatim rather than normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "Order Placed")]
    Placed,
    #[serde(rename = "Processing")]
    Processing,
    #[serde(rename = "Packing")]
    Packing,
    #[serde(rename = "Assigned")]
    Assigned,
    #[serde(rename = "Out for delivery")]
    OutForDelivery,
    #[serde(rename = "Delivered")]
    Delivered,
    #[serde(rename = "Cancelled")]
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Placed => "Order Placed",
            Self::Processing => "Processing",
            Self::Packing => "Packing",
            Self::Assigned => "Assigned",
            Self::OutForDelivery => "Out for delivery",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        Self::Placed
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Order Placed" => Ok(Self::Placed),
            "Processing" => Ok(Self::Processing),
            "Packing" => Ok(Self::Packing),
            "Assigned" => Ok(Self::Assigned),
            "Out for delivery" => Ok(Self::OutForDelivery),
            "Delivered" => Ok(Self::Delivered),
            "Cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownVariant {
                field: "order status",
                value: other.to_string(),
            }),
        }
    }
}

/// Per-order chat handshake state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    None,
    Requested,
    Accepted,
}

impl ChatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Requested => "requested",
            Self::Accepted => "accepted",
        }
    }
}

impl Default for ChatStatus {
    fn default() -> Self {
        Self::None
    }
}

impl FromStr for ChatStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "requested" => Ok(Self::Requested),
            "accepted" => Ok(Self::Accepted),
            other => Err(UnknownVariant {
                field: "chat status",
                value: other.to_string(),
            }),
        }
    }
}

/// Action recorded in the order history ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Accepted,
    Cancelled,
    Delivered,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Cancelled => "cancelled",
            Self::Delivered => "delivered",
        }
    }
}

/// Raised when a persisted enum column holds a value this build doesn't know
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {field}: {value}")]
pub struct UnknownVariant {
    pub field: &'static str,
    pub value: String,
}

// =============================================================================
// Records
// =============================================================================

/// One line item on an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: u32,
    pub price: f64,
}

/// Contact card for an assigned delivery agent (what the seller dashboard
/// and customer app show once a claim succeeds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentContact {
    pub id: AgentId,
    pub name: String,
    pub phone: String,
    pub vehicle: String,
}

/// Fully-populated order representation, as sent over the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: Uuid,
    pub items: Vec<OrderItem>,
    pub amount: f64,
    pub address: String,
    pub status: OrderStatus,
    pub chat_status: ChatStatus,
    pub payment_type: String,
    pub is_paid: bool,
    pub assigned_agent: Option<AgentId>,
    /// Populated contact card when `assigned_agent` is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentContact>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub accepted_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub delivered_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Append-only history/ledger entry for an order action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub order_id: OrderId,
    pub agent_id: AgentId,
    pub action: HistoryAction,
    /// Snapshot of the order status at the time of the action
    pub status: OrderStatus,
    pub amount: f64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub delivered_at: Option<OffsetDateTime>,
}

impl HistoryEntry {
    /// Entry for a successful claim
    pub fn accepted(order: &Order, agent_id: AgentId) -> Self {
        Self {
            order_id: order.id,
            agent_id,
            action: HistoryAction::Accepted,
            status: order.status,
            amount: order.amount,
            delivered_at: None,
        }
    }

    /// Entry for a cancellation that returned the order to the pool
    pub fn cancelled(order: &Order, agent_id: AgentId) -> Self {
        Self {
            order_id: order.id,
            agent_id,
            action: HistoryAction::Cancelled,
            status: order.status,
            amount: order.amount,
            delivered_at: None,
        }
    }

    /// Entry for a completed delivery
    pub fn delivered(order: &Order, agent_id: AgentId, at: OffsetDateTime) -> Self {
        Self {
            order_id: order.id,
            agent_id,
            action: HistoryAction::Delivered,
            status: order.status,
            amount: order.amount,
            delivered_at: Some(at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_wire_strings_round_trip() {
        for status in [
            OrderStatus::Placed,
            OrderStatus::Processing,
            OrderStatus::Packing,
            OrderStatus::Assigned,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            let parsed: OrderStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn order_status_serde_uses_display_strings() {
        let json = serde_json::to_string(&OrderStatus::OutForDelivery).unwrap();
        assert_eq!(json, r#""Out for delivery""#);

        let back: OrderStatus = serde_json::from_str(r#""Order Placed""#).unwrap();
        assert_eq!(back, OrderStatus::Placed);
    }

    #[test]
    fn unknown_order_status_is_an_error() {
        let err = "Teleported".parse::<OrderStatus>().unwrap_err();
        assert_eq!(err.value, "Teleported");
    }

    #[test]
    fn chat_status_round_trip() {
        for status in [ChatStatus::None, ChatStatus::Requested, ChatStatus::Accepted] {
            let parsed: ChatStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn history_entry_delivered_snapshot() {
        let now = OffsetDateTime::now_utc();
        let order = Order {
            id: OrderId::new(),
            customer_id: Uuid::new_v4(),
            items: vec![],
            amount: 249.0,
            address: "12 Hill Road".into(),
            status: OrderStatus::Delivered,
            chat_status: ChatStatus::None,
            payment_type: "COD".into(),
            is_paid: false,
            assigned_agent: None,
            agent: None,
            accepted_at: None,
            delivered_at: Some(now),
            created_at: now,
        };
        let agent = AgentId::new();
        let entry = HistoryEntry::delivered(&order, agent, now);
        assert_eq!(entry.action, HistoryAction::Delivered);
        assert_eq!(entry.amount, 249.0);
        assert_eq!(entry.delivered_at, Some(now));
    }
}
