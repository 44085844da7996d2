//! # Order Repository
//!
//! ```text
//! orders ──< order_lines >── products
//!   │
//!   └── carrier / tracking / shipped_at   written by mark_shipped
//! ```
//!
//! The shipping columns are informational. Whether an order was already
//! shipped is decided by its audit record, not by these columns.

use chrono::NaiveDateTime;
use sqlx::SqlitePool;
use tracing::{debug, info};

use packstation_core::{Carrier, Money, Order, OrderId, OrderLine, ProductId};

use super::to_u32;
use crate::error::{StoreError, StoreResult};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    reference: String,
    customer: String,
    ordered_at: NaiveDateTime,
}

#[derive(sqlx::FromRow)]
struct LineRow {
    product_id: i64,
    reference: String,
    name: String,
    quantity: i64,
    unit_price_cents: i64,
}

impl TryFrom<LineRow> for OrderLine {
    type Error = StoreError;

    fn try_from(row: LineRow) -> StoreResult<Self> {
        Ok(OrderLine {
            product_id: ProductId(to_u32(row.product_id, "order_lines.product_id")?),
            reference: row.reference,
            name: row.name,
            quantity: row.quantity,
            unit_price: Money::from_cents(row.unit_price_cents),
        })
    }
}

/// Shipping columns of an order.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ShippingStatus {
    pub carrier: Option<String>,
    pub tracking: Option<String>,
    pub shipped_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// The order with its lines in position order.
    pub async fn get(&self, id: OrderId) -> StoreResult<Option<Order>> {
        debug!(order_id = %id, "Fetching order");

        let Some(row) = sqlx::query_as::<_, OrderRow>(
            "SELECT id, reference, customer, ordered_at FROM orders WHERE id = ?1",
        )
        .bind(i64::from(id.0))
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let lines = sqlx::query_as::<_, LineRow>(
            r#"
            SELECT product_id, reference, name, quantity, unit_price_cents
            FROM order_lines
            WHERE order_id = ?1
            ORDER BY position
            "#,
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(OrderLine::try_from)
        .collect::<StoreResult<Vec<_>>>()?;

        debug!(order_id = %id, lines = lines.len(), "Order loaded");

        Ok(Some(Order {
            id: OrderId(to_u32(row.id, "orders.id")?),
            reference: row.reference,
            customer: row.customer,
            ordered_at: row.ordered_at,
            lines,
        }))
    }

    /// Inserts an order and its lines in one transaction.
    pub async fn insert(&self, order: &Order) -> StoreResult<()> {
        debug!(order_id = %order.id, lines = order.lines.len(), "Inserting order");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO orders (id, reference, customer, ordered_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(i64::from(order.id.0))
        .bind(&order.reference)
        .bind(&order.customer)
        .bind(order.ordered_at)
        .execute(&mut *tx)
        .await?;

        for (position, line) in order.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_lines
                    (order_id, position, product_id, reference, name, quantity, unit_price_cents)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(i64::from(order.id.0))
            .bind(position as i64)
            .bind(i64::from(line.product_id.0))
            .bind(&line.reference)
            .bind(&line.name)
            .bind(line.quantity)
            .bind(line.unit_price.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Stores carrier and tracking number of a finished shipment.
    ///
    /// Returns `false` when the order does not exist.
    pub async fn mark_shipped(
        &self,
        id: OrderId,
        carrier: Carrier,
        tracking: &str,
        shipped_at: NaiveDateTime,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET carrier = ?1, tracking = ?2, shipped_at = ?3 WHERE id = ?4",
        )
        .bind(carrier.code())
        .bind(tracking)
        .bind(shipped_at)
        .bind(i64::from(id.0))
        .execute(&self.pool)
        .await?;

        let updated = result.rows_affected() > 0;
        if updated {
            info!(order_id = %id, carrier = carrier.code(), "Order marked as shipped");
        }
        Ok(updated)
    }

    pub async fn shipping_status(&self, id: OrderId) -> StoreResult<Option<ShippingStatus>> {
        let status = sqlx::query_as::<_, ShippingStatus>(
            "SELECT carrier, tracking, shipped_at FROM orders WHERE id = ?1",
        )
        .bind(i64::from(id.0))
        .fetch_optional(&self.pool)
        .await?;
        Ok(status)
    }

    pub async fn count(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
