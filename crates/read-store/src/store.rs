use async_trait::async_trait;
use common::{CustomerId, OrderId, ProductId};
use domain::{InventoryItem, InventoryStatus, Order, OrderStatus};

use crate::Result;

/// Storage for inventory items, keyed by product id.
///
/// The store performs no business logic. Upserts are atomic per key and
/// keep the `created_at` of an existing record.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn find_by_product_id(&self, product_id: &ProductId) -> Result<Option<InventoryItem>>;

    /// All items, ordered by product id.
    async fn find_all(&self) -> Result<Vec<InventoryItem>>;

    async fn find_by_status(&self, status: InventoryStatus) -> Result<Vec<InventoryItem>>;

    /// Inserts a new item; fails with `Duplicate` if the key exists.
    async fn save(&self, item: &InventoryItem) -> Result<()>;

    /// Creates the item or replaces the existing one with the same key.
    async fn upsert(&self, item: &InventoryItem) -> Result<()>;
}

/// Storage for orders, keyed by business order id.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>>;

    /// All orders, ordered by order id.
    async fn find_all(&self) -> Result<Vec<Order>>;

    async fn find_by_customer_id(&self, customer_id: &CustomerId) -> Result<Vec<Order>>;

    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>>;

    /// Inserts a new order; fails with `Duplicate` if the key exists.
    async fn save(&self, order: &Order) -> Result<()>;

    /// Creates the order or replaces the existing one with the same key.
    async fn upsert(&self, order: &Order) -> Result<()>;
}
