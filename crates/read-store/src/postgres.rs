use async_trait::async_trait;
use common::{CustomerId, OrderId, ProductId};
use domain::{Address, InventoryItem, InventoryStatus, Money, Order, OrderItem, OrderStatus};
use sqlx::{PgPool, Row, postgres::PgRow, types::Json};
use uuid::Uuid;

use crate::{InventoryStore, OrderStore, Result, StoreError};

/// Runs the database migrations for read models and stream tables.
pub async fn run_migrations(pool: &PgPool) -> std::result::Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}

fn is_unique_violation(error: &sqlx::Error, constraint: &str) -> bool {
    if let sqlx::Error::Database(db_err) = error
        && db_err.constraint() == Some(constraint)
    {
        return true;
    }
    false
}

/// PostgreSQL-backed inventory store.
#[derive(Clone)]
pub struct PgInventoryStore {
    pool: PgPool,
}

impl PgInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_item(row: PgRow) -> Result<InventoryItem> {
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<InventoryStatus>()
            .map_err(|e| StoreError::InvalidRow {
                model: "inventory item",
                reason: e.to_string(),
            })?;

        Ok(InventoryItem {
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            available_quantity: row.try_get("available_quantity")?,
            allocated_quantity: row.try_get("allocated_quantity")?,
            status,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

const INVENTORY_COLUMNS: &str =
    "product_id, available_quantity, allocated_quantity, status, created_at, updated_at";

#[async_trait]
impl InventoryStore for PgInventoryStore {
    async fn find_by_product_id(&self, product_id: &ProductId) -> Result<Option<InventoryItem>> {
        let row = sqlx::query(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM inventory_items WHERE product_id = $1"
        ))
        .bind(product_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_item).transpose()
    }

    async fn find_all(&self) -> Result<Vec<InventoryItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM inventory_items ORDER BY product_id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_item).collect()
    }

    async fn find_by_status(&self, status: InventoryStatus) -> Result<Vec<InventoryItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM inventory_items WHERE status = $1 ORDER BY product_id ASC"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_item).collect()
    }

    async fn save(&self, item: &InventoryItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_items
                (id, product_id, available_quantity, allocated_quantity, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(item.product_id.as_str())
        .bind(item.available_quantity)
        .bind(item.allocated_quantity)
        .bind(item.status.as_str())
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "unique_inventory_product") {
                return StoreError::Duplicate {
                    model: "inventory item",
                    key: item.product_id.to_string(),
                };
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn upsert(&self, item: &InventoryItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_items
                (id, product_id, available_quantity, allocated_quantity, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (product_id) DO UPDATE SET
                available_quantity = EXCLUDED.available_quantity,
                allocated_quantity = EXCLUDED.allocated_quantity,
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(item.product_id.as_str())
        .bind(item.available_quantity)
        .bind(item.allocated_quantity)
        .bind(item.status.as_str())
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(product_id = %item.product_id, status = %item.status, "Inventory item upserted");
        Ok(())
    }
}

/// PostgreSQL-backed order store.
///
/// Line items, addresses and money are stored as JSONB next to the
/// scalar columns used for filtering.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<OrderStatus>()
            .map_err(|e| StoreError::InvalidRow {
                model: "order",
                reason: e.to_string(),
            })?;

        Ok(Order {
            order_id: OrderId::new(row.try_get::<String, _>("order_id")?),
            customer_id: CustomerId::new(row.try_get::<String, _>("customer_id")?),
            items: row.try_get::<Json<Vec<OrderItem>>, _>("items")?.0,
            status,
            shipping_address: row.try_get::<Json<Address>, _>("shipping_address")?.0,
            billing_address: row.try_get::<Json<Address>, _>("billing_address")?.0,
            total_cost: row.try_get::<Json<Money>, _>("total_cost")?.0,
            issued_at: row.try_get("issued_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn insert(&self, order: &Order, on_conflict: &str) -> std::result::Result<(), sqlx::Error> {
        sqlx::query(&format!(
            r#"
            INSERT INTO orders
                (id, order_id, customer_id, status, items, shipping_address, billing_address,
                 total_cost, issued_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            {on_conflict}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(order.order_id.as_str())
        .bind(order.customer_id.as_str())
        .bind(order.status.as_str())
        .bind(Json(&order.items))
        .bind(Json(&order.shipping_address))
        .bind(Json(&order.billing_address))
        .bind(Json(&order.total_cost))
        .bind(order.issued_at)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

const ORDER_COLUMNS: &str = "order_id, customer_id, status, items, shipping_address, \
     billing_address, total_cost, issued_at, created_at, updated_at";

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn find_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1"
        ))
        .bind(order_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn find_all(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY order_id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn find_by_customer_id(&self, customer_id: &CustomerId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = $1 ORDER BY order_id ASC"
        ))
        .bind(customer_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE status = $1 ORDER BY order_id ASC"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn save(&self, order: &Order) -> Result<()> {
        self.insert(order, "").await.map_err(|e| {
            if is_unique_violation(&e, "unique_order_business_id") {
                return StoreError::Duplicate {
                    model: "order",
                    key: order.order_id.to_string(),
                };
            }
            StoreError::Database(e)
        })
    }

    async fn upsert(&self, order: &Order) -> Result<()> {
        self.insert(
            order,
            r#"
            ON CONFLICT (order_id) DO UPDATE SET
                customer_id = EXCLUDED.customer_id,
                status = EXCLUDED.status,
                items = EXCLUDED.items,
                shipping_address = EXCLUDED.shipping_address,
                billing_address = EXCLUDED.billing_address,
                total_cost = EXCLUDED.total_cost,
                issued_at = EXCLUDED.issued_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .await?;

        tracing::debug!(order_id = %order.order_id, status = %order.status, "Order upserted");
        Ok(())
    }
}
