//! Order and agent storage
//!
//! The coordinator never arbitrates a claim in memory: every contended
//! mutation is delegated to the store's atomic conditional update, which is
//! the sole arbiter of the race. `claim`, `release`, and `set_status` are the
//! conditional operations; a `None` return means the precondition did not
//! hold (already assigned, not the owner, or no such order).

use async_trait::async_trait;
use fleetly_shared::{
    AgentContact, AgentId, ChatStatus, HistoryEntry, Order, OrderId, OrderStatus, StoreError,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgOrderStore;

/// Storage operations the dispatch core depends on
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Connectivity probe for health checks
    async fn ping(&self) -> Result<(), StoreError>;

    /// Fetch a fully-populated order
    async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Non-cancelled orders assigned to an agent, newest first
    async fn orders_for_agent(&self, agent_id: AgentId) -> Result<Vec<Order>, StoreError>;

    /// Atomically assign the order to the agent and move it to
    /// `Out for delivery`, if and only if it is currently unassigned.
    ///
    /// Returns the populated order on success, `None` if the order was
    /// already assigned or does not exist.
    async fn claim(&self, order_id: OrderId, agent_id: AgentId)
        -> Result<Option<Order>, StoreError>;

    /// Atomically clear the assignment and return the order to the pool,
    /// if and only if the requesting agent currently owns it.
    async fn release(
        &self,
        order_id: OrderId,
        agent_id: AgentId,
    ) -> Result<Option<Order>, StoreError>;

    /// Set the order status, guarded on ownership by the requesting agent.
    async fn set_status(
        &self,
        order_id: OrderId,
        agent_id: AgentId,
        status: OrderStatus,
    ) -> Result<Option<Order>, StoreError>;

    /// Conditionally advance the chat handshake state for an order: persist
    /// `to` only if the current state is `from`. Returns whether the
    /// transition applied. Unknown orders and stale transitions report
    /// `false`, matching the fire-and-forget nature of the handshake events.
    async fn transition_chat(
        &self,
        order_id: OrderId,
        from: ChatStatus,
        to: ChatStatus,
    ) -> Result<bool, StoreError>;

    /// Append an entry to the order history ledger
    async fn append_history(&self, entry: HistoryEntry) -> Result<(), StoreError>;

    /// Increment the agent's delivery counter and restore availability
    async fn record_delivery(&self, agent_id: AgentId) -> Result<(), StoreError>;

    /// Contact card for a delivery agent
    async fn agent_contact(&self, agent_id: AgentId) -> Result<Option<AgentContact>, StoreError>;
}
