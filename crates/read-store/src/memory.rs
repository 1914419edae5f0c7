use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{CustomerId, OrderId, ProductId};
use domain::{InventoryItem, InventoryStatus, Order, OrderStatus};
use tokio::sync::RwLock;

use crate::{InventoryStore, OrderStore, Result, StoreError};

/// In-memory inventory store for testing and single-process runs.
#[derive(Clone, Default)]
pub struct InMemoryInventoryStore {
    items: Arc<RwLock<BTreeMap<ProductId, InventoryItem>>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored items.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn find_by_product_id(&self, product_id: &ProductId) -> Result<Option<InventoryItem>> {
        Ok(self.items.read().await.get(product_id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<InventoryItem>> {
        Ok(self.items.read().await.values().cloned().collect())
    }

    async fn find_by_status(&self, status: InventoryStatus) -> Result<Vec<InventoryItem>> {
        Ok(self
            .items
            .read()
            .await
            .values()
            .filter(|item| item.status == status)
            .cloned()
            .collect())
    }

    async fn save(&self, item: &InventoryItem) -> Result<()> {
        let mut items = self.items.write().await;
        if items.contains_key(&item.product_id) {
            return Err(StoreError::Duplicate {
                model: "inventory item",
                key: item.product_id.to_string(),
            });
        }
        items.insert(item.product_id.clone(), item.clone());
        Ok(())
    }

    async fn upsert(&self, item: &InventoryItem) -> Result<()> {
        let mut items = self.items.write().await;
        let mut next = item.clone();
        if let Some(existing) = items.get(&item.product_id) {
            next.created_at = existing.created_at;
        }
        items.insert(item.product_id.clone(), next);
        Ok(())
    }
}

/// In-memory order store for testing and single-process runs.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<BTreeMap<OrderId, Order>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders.
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn find_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(order_id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Order>> {
        Ok(self.orders.read().await.values().cloned().collect())
    }

    async fn find_by_customer_id(&self, customer_id: &CustomerId) -> Result<Vec<Order>> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .filter(|order| &order.customer_id == customer_id)
            .cloned()
            .collect())
    }

    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .filter(|order| order.status == status)
            .cloned()
            .collect())
    }

    async fn save(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.order_id) {
            return Err(StoreError::Duplicate {
                model: "order",
                key: order.order_id.to_string(),
            });
        }
        orders.insert(order.order_id.clone(), order.clone());
        Ok(())
    }

    async fn upsert(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        let mut next = order.clone();
        if let Some(existing) = orders.get(&order.order_id) {
            next.created_at = existing.created_at;
        }
        orders.insert(order.order_id.clone(), next);
        Ok(())
    }
}
