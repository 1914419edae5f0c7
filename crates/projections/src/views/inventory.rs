//! Inventory projection: stock levels per product.

use std::sync::Arc;

use async_trait::async_trait;
use domain::InventoryItem;
use event_stream::{
    InventoryAllocatedData, InventoryEvent, InventoryReturnedData, InventoryUpdatedData,
    TypedEvent,
};
use read_store::InventoryStore;

use crate::projection::Projection;
use crate::{ProjectionError, Result};

/// Applies inventory events to the inventory read store.
///
/// Allocation and return are deltas. They are not deduplicated, so a
/// redelivered event is applied twice.
#[derive(Clone)]
pub struct InventoryProjection {
    store: Arc<dyn InventoryStore>,
}

impl InventoryProjection {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    /// Sets the available quantity, creating the item on first sight.
    #[tracing::instrument(
        skip(self, event),
        fields(product_id = %event.payload.product_id, quantity = event.payload.quantity)
    )]
    pub async fn handle_inventory_updated(
        &self,
        event: &TypedEvent<InventoryUpdatedData>,
    ) -> Result<()> {
        let data = &event.payload;

        match self.store.find_by_product_id(&data.product_id).await? {
            None => {
                let item = InventoryItem::new(data.product_id.clone(), data.quantity)?;
                self.store.save(&item).await?;
                tracing::info!(status = %item.status, "Inventory item created");
            }
            Some(mut item) => {
                item.set_available(data.quantity)?;
                self.store.upsert(&item).await?;
                tracing::debug!(status = %item.status, "Inventory item updated");
            }
        }

        Ok(())
    }

    /// Moves stock from available to allocated. The item must exist.
    #[tracing::instrument(
        skip(self, event),
        fields(
            product_id = %event.payload.product_id,
            order_id = %event.payload.order_id,
            quantity = event.payload.quantity
        )
    )]
    pub async fn handle_inventory_allocated(
        &self,
        event: &TypedEvent<InventoryAllocatedData>,
    ) -> Result<()> {
        let data = &event.payload;
        let mut item = self.require(&data.product_id).await?;

        item.apply_allocation(data.quantity)?;
        if item.is_overallocated() {
            tracing::warn!(
                available = item.available_quantity,
                allocated = item.allocated_quantity,
                "Allocation exceeds available stock"
            );
        }

        self.store.upsert(&item).await?;
        Ok(())
    }

    /// Moves stock from allocated back to available. The item must exist.
    #[tracing::instrument(
        skip(self, event),
        fields(
            product_id = %event.payload.product_id,
            order_id = %event.payload.order_id,
            quantity = event.payload.quantity
        )
    )]
    pub async fn handle_inventory_returned(
        &self,
        event: &TypedEvent<InventoryReturnedData>,
    ) -> Result<()> {
        let data = &event.payload;
        let mut item = self.require(&data.product_id).await?;

        item.apply_return(data.quantity)?;
        self.store.upsert(&item).await?;
        Ok(())
    }

    async fn require(&self, product_id: &common::ProductId) -> Result<InventoryItem> {
        self.store
            .find_by_product_id(product_id)
            .await?
            .ok_or_else(|| ProjectionError::NotFound {
                model: "inventory item",
                key: product_id.to_string(),
            })
    }
}

#[async_trait]
impl Projection for InventoryProjection {
    type Event = InventoryEvent;

    fn name(&self) -> &'static str {
        "InventoryProjection"
    }

    async fn apply(&self, event: InventoryEvent) -> Result<()> {
        match event {
            InventoryEvent::InventoryUpdated(e) => self.handle_inventory_updated(&e).await,
            InventoryEvent::InventoryAllocated(e) => self.handle_inventory_allocated(&e).await,
            InventoryEvent::InventoryReturned(e) => self.handle_inventory_returned(&e).await,
        }
    }
}
