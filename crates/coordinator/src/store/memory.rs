//! In-memory order store
//!
//! Used by the test suite and for local development without a database. A
//! single mutex guards all state, so every operation is atomic, the same
//! serialization guarantee the database provides for the conditional
//! updates.

use async_trait::async_trait;
use std::collections::HashMap;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use fleetly_shared::{
    AgentContact, AgentId, ChatStatus, HistoryEntry, Order, OrderId, OrderStatus, StoreError,
};

use super::OrderStore;

#[derive(Debug, Clone)]
struct AgentRecord {
    contact: AgentContact,
    total_delivered: u64,
    is_available: bool,
}

#[derive(Default)]
struct Inner {
    orders: HashMap<OrderId, Order>,
    agents: HashMap<AgentId, AgentRecord>,
    history: Vec<HistoryEntry>,
}

/// In-memory implementation of [`OrderStore`]
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an order (test/dev helper)
    pub async fn insert_order(&self, order: Order) {
        let mut inner = self.inner.lock().await;
        inner.orders.insert(order.id, order);
    }

    /// Seed an agent (test/dev helper)
    pub async fn insert_agent(&self, contact: AgentContact) {
        let mut inner = self.inner.lock().await;
        inner.agents.insert(
            contact.id,
            AgentRecord {
                contact,
                total_delivered: 0,
                is_available: true,
            },
        );
    }

    /// Snapshot of the history ledger (test helper)
    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.inner.lock().await.history.clone()
    }

    /// Delivery counter for an agent (test helper)
    pub async fn total_delivered(&self, agent_id: AgentId) -> u64 {
        self.inner
            .lock()
            .await
            .agents
            .get(&agent_id)
            .map(|a| a.total_delivered)
            .unwrap_or(0)
    }

    fn populate(inner: &Inner, mut order: Order) -> Order {
        order.agent = order
            .assigned_agent
            .and_then(|id| inner.agents.get(&id))
            .map(|rec| rec.contact.clone());
        order
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .orders
            .get(&order_id)
            .cloned()
            .map(|o| Self::populate(&inner, o)))
    }

    async fn orders_for_agent(&self, agent_id: AgentId) -> Result<Vec<Order>, StoreError> {
        let inner = self.inner.lock().await;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.assigned_agent == Some(agent_id) && o.status != OrderStatus::Cancelled)
            .cloned()
            .map(|o| Self::populate(&inner, o))
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn claim(
        &self,
        order_id: OrderId,
        agent_id: AgentId,
    ) -> Result<Option<Order>, StoreError> {
        let mut inner = self.inner.lock().await;
        let claimed = match inner.orders.get_mut(&order_id) {
            Some(order) if order.assigned_agent.is_none() => {
                order.assigned_agent = Some(agent_id);
                order.status = OrderStatus::OutForDelivery;
                order.accepted_at = Some(OffsetDateTime::now_utc());
                Some(order.clone())
            }
            _ => None,
        };
        Ok(claimed.map(|o| Self::populate(&inner, o)))
    }

    async fn release(
        &self,
        order_id: OrderId,
        agent_id: AgentId,
    ) -> Result<Option<Order>, StoreError> {
        let mut inner = self.inner.lock().await;
        let released = match inner.orders.get_mut(&order_id) {
            Some(order) if order.assigned_agent == Some(agent_id) => {
                order.assigned_agent = None;
                order.status = OrderStatus::Placed;
                order.chat_status = ChatStatus::None;
                order.accepted_at = None;
                Some(order.clone())
            }
            _ => None,
        };
        Ok(released.map(|o| Self::populate(&inner, o)))
    }

    async fn set_status(
        &self,
        order_id: OrderId,
        agent_id: AgentId,
        status: OrderStatus,
    ) -> Result<Option<Order>, StoreError> {
        let mut inner = self.inner.lock().await;
        let updated = match inner.orders.get_mut(&order_id) {
            Some(order) if order.assigned_agent == Some(agent_id) => {
                order.status = status;
                if status == OrderStatus::Delivered {
                    order.delivered_at = Some(OffsetDateTime::now_utc());
                }
                Some(order.clone())
            }
            _ => None,
        };
        Ok(updated.map(|o| Self::populate(&inner, o)))
    }

    async fn transition_chat(
        &self,
        order_id: OrderId,
        from: ChatStatus,
        to: ChatStatus,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.orders.get_mut(&order_id) {
            Some(order) if order.chat_status == from => {
                order.chat_status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn append_history(&self, entry: HistoryEntry) -> Result<(), StoreError> {
        self.inner.lock().await.history.push(entry);
        Ok(())
    }

    async fn record_delivery(&self, agent_id: AgentId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(agent) = inner.agents.get_mut(&agent_id) {
            agent.total_delivered += 1;
            agent.is_available = true;
        }
        Ok(())
    }

    async fn agent_contact(&self, agent_id: AgentId) -> Result<Option<AgentContact>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.agents.get(&agent_id).map(|a| a.contact.clone()))
    }
}
