//! Postgres-backed order store
//!
//! Every conditional operation is a single `UPDATE ... WHERE ... RETURNING`
//! statement, so the database's row-level serialization decides claim races.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use fleetly_shared::{
    AgentContact, AgentId, ChatStatus, HistoryEntry, Order, OrderId, OrderItem, OrderStatus,
    StoreError,
};

use super::OrderStore;

/// Order store backed by the platform's Postgres database
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Flat row shape shared by every order query; the agent columns come from a
/// LEFT JOIN against `delivery_agents`.
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    customer_id: Uuid,
    items: Json<Vec<OrderItem>>,
    amount: f64,
    address: String,
    status: String,
    chat_status: String,
    payment_type: String,
    is_paid: bool,
    assigned_agent: Option<Uuid>,
    accepted_at: Option<OffsetDateTime>,
    delivered_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
    agent_name: Option<String>,
    agent_phone: Option<String>,
    agent_vehicle: Option<String>,
}

impl OrderRow {
    fn into_order(self) -> Result<Order, StoreError> {
        let agent = match (self.assigned_agent, self.agent_name) {
            (Some(id), Some(name)) => Some(AgentContact {
                id: AgentId(id),
                name,
                phone: self.agent_phone.unwrap_or_default(),
                vehicle: self.agent_vehicle.unwrap_or_default(),
            }),
            _ => None,
        };

        Ok(Order {
            id: OrderId(self.id),
            customer_id: self.customer_id,
            items: self.items.0,
            amount: self.amount,
            address: self.address,
            status: self.status.parse::<OrderStatus>()?,
            chat_status: self.chat_status.parse::<ChatStatus>()?,
            payment_type: self.payment_type,
            is_paid: self.is_paid,
            assigned_agent: self.assigned_agent.map(AgentId),
            agent,
            accepted_at: self.accepted_at,
            delivered_at: self.delivered_at,
            created_at: self.created_at,
        })
    }
}

const ORDER_COLUMNS: &str = r#"
    o.id, o.customer_id, o.items, o.amount, o.address, o.status,
    o.chat_status, o.payment_type, o.is_paid, o.assigned_agent,
    o.accepted_at, o.delivered_at, o.created_at,
    a.name AS agent_name, a.phone AS agent_phone, a.vehicle_type AS agent_vehicle
"#;

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders o
            LEFT JOIN delivery_agents a ON a.id = o.assigned_agent
            WHERE o.id = $1
            "#
        ))
        .bind(order_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(OrderRow::into_order).transpose()
    }

    async fn orders_for_agent(&self, agent_id: AgentId) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders o
            LEFT JOIN delivery_agents a ON a.id = o.assigned_agent
            WHERE o.assigned_agent = $1 AND o.status <> 'Cancelled'
            ORDER BY o.created_at DESC
            "#
        ))
        .bind(agent_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OrderRow::into_order).collect()
    }

    async fn claim(
        &self,
        order_id: OrderId,
        agent_id: AgentId,
    ) -> Result<Option<Order>, StoreError> {
        // The WHERE clause is the whole arbitration: zero rows means lost.
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            WITH claimed AS (
                UPDATE orders
                SET assigned_agent = $2,
                    status = 'Out for delivery',
                    accepted_at = NOW(),
                    updated_at = NOW()
                WHERE id = $1 AND assigned_agent IS NULL
                RETURNING *
            )
            SELECT {ORDER_COLUMNS}
            FROM claimed o
            LEFT JOIN delivery_agents a ON a.id = o.assigned_agent
            "#
        ))
        .bind(order_id.0)
        .bind(agent_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(OrderRow::into_order).transpose()
    }

    async fn release(
        &self,
        order_id: OrderId,
        agent_id: AgentId,
    ) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            WITH released AS (
                UPDATE orders
                SET assigned_agent = NULL,
                    status = 'Order Placed',
                    chat_status = 'none',
                    accepted_at = NULL,
                    updated_at = NOW()
                WHERE id = $1 AND assigned_agent = $2
                RETURNING *
            )
            SELECT {ORDER_COLUMNS}
            FROM released o
            LEFT JOIN delivery_agents a ON a.id = o.assigned_agent
            "#
        ))
        .bind(order_id.0)
        .bind(agent_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(OrderRow::into_order).transpose()
    }

    async fn set_status(
        &self,
        order_id: OrderId,
        agent_id: AgentId,
        status: OrderStatus,
    ) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            WITH updated AS (
                UPDATE orders
                SET status = $3,
                    delivered_at = CASE WHEN $3 = 'Delivered' THEN NOW() ELSE delivered_at END,
                    updated_at = NOW()
                WHERE id = $1 AND assigned_agent = $2
                RETURNING *
            )
            SELECT {ORDER_COLUMNS}
            FROM updated o
            LEFT JOIN delivery_agents a ON a.id = o.assigned_agent
            "#
        ))
        .bind(order_id.0)
        .bind(agent_id.0)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(OrderRow::into_order).transpose()
    }

    async fn transition_chat(
        &self,
        order_id: OrderId,
        from: ChatStatus,
        to: ChatStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE orders SET chat_status = $3, updated_at = NOW() WHERE id = $1 AND chat_status = $2",
        )
        .bind(order_id.0)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn append_history(&self, entry: HistoryEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO order_history
                (order_id, agent_id, action, status, amount, delivered_at, delivered_day)
            VALUES ($1, $2, $3, $4, $5, $6, DATE($6))
            "#,
        )
        .bind(entry.order_id.0)
        .bind(entry.agent_id.0)
        .bind(entry.action.as_str())
        .bind(entry.status.as_str())
        .bind(entry.amount)
        .bind(entry.delivered_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_delivery(&self, agent_id: AgentId) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE delivery_agents
            SET total_delivered = total_delivered + 1,
                active_order = NULL,
                is_available = TRUE,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(agent_id.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn agent_contact(&self, agent_id: AgentId) -> Result<Option<AgentContact>, StoreError> {
        #[derive(sqlx::FromRow)]
        struct ContactRow {
            id: Uuid,
            name: String,
            phone: String,
            vehicle_type: String,
        }

        let row = sqlx::query_as::<_, ContactRow>(
            "SELECT id, name, phone, vehicle_type FROM delivery_agents WHERE id = $1",
        )
        .bind(agent_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| AgentContact {
            id: AgentId(r.id),
            name: r.name,
            phone: r.phone,
            vehicle: r.vehicle_type,
        }))
    }
}
