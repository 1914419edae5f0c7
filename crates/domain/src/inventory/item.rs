use chrono::{DateTime, Utc};
use common::ProductId;
use serde::{Deserialize, Serialize};

use super::InventoryStatus;
use crate::{DomainError, Result};

/// Stock held for one product.
///
/// The `apply_*` methods carry projected deltas: they reject non-positive
/// quantities but accept the result going negative, because the stream is
/// the source of truth. The checked `allocate`/`deallocate` refuse to
/// overdraw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub product_id: ProductId,
    pub available_quantity: i64,
    pub allocated_quantity: i64,
    pub status: InventoryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Creates an item with nothing allocated.
    pub fn new(product_id: impl Into<ProductId>, available_quantity: i64) -> Result<Self> {
        if available_quantity < 0 {
            return Err(DomainError::InvalidQuantity {
                quantity: available_quantity,
                reason: "available quantity cannot be negative",
            });
        }

        let now = Utc::now();
        Ok(Self {
            product_id: product_id.into(),
            available_quantity,
            allocated_quantity: 0,
            status: InventoryStatus::for_quantity(available_quantity),
            created_at: now,
            updated_at: now,
        })
    }

    /// Replaces the available quantity and recomputes the status.
    pub fn set_available(&mut self, quantity: i64) -> Result<()> {
        if quantity < 0 {
            return Err(DomainError::InvalidQuantity {
                quantity,
                reason: "available quantity cannot be negative",
            });
        }

        self.available_quantity = quantity;
        self.refresh_status();
        self.touch();
        Ok(())
    }

    /// Moves `quantity` from available to allocated without a stock check.
    pub fn apply_allocation(&mut self, quantity: i64) -> Result<()> {
        require_positive(quantity, "allocation quantity must be positive")?;

        let available = in_range(self.available_quantity.checked_sub(quantity), quantity)?;
        let allocated = in_range(self.allocated_quantity.checked_add(quantity), quantity)?;
        self.available_quantity = available;
        self.allocated_quantity = allocated;
        self.refresh_status();
        self.touch();
        Ok(())
    }

    /// Moves `quantity` from allocated back to available without a check.
    pub fn apply_return(&mut self, quantity: i64) -> Result<()> {
        require_positive(quantity, "returned quantity must be positive")?;

        let allocated = in_range(self.allocated_quantity.checked_sub(quantity), quantity)?;
        let available = in_range(self.available_quantity.checked_add(quantity), quantity)?;
        self.allocated_quantity = allocated;
        self.available_quantity = available;
        self.refresh_status();
        self.touch();
        Ok(())
    }

    /// Allocates stock, refusing to take more than is available.
    pub fn allocate(&mut self, quantity: i64) -> Result<()> {
        require_positive(quantity, "allocation quantity must be positive")?;
        if quantity > self.available_quantity {
            return Err(DomainError::InsufficientInventory {
                product_id: self.product_id.clone(),
                requested: quantity,
                available: self.available_quantity,
            });
        }
        self.apply_allocation(quantity)
    }

    /// Releases allocated stock, refusing to release more than is allocated.
    pub fn deallocate(&mut self, quantity: i64) -> Result<()> {
        require_positive(quantity, "deallocation quantity must be positive")?;
        if quantity > self.allocated_quantity {
            return Err(DomainError::ExcessDeallocation {
                product_id: self.product_id.clone(),
                requested: quantity,
                allocated: self.allocated_quantity,
            });
        }
        self.apply_return(quantity)
    }

    /// Adds new stock to the available quantity.
    pub fn add_stock(&mut self, quantity: i64) -> Result<()> {
        require_positive(quantity, "added quantity must be positive")?;

        self.available_quantity = in_range(self.available_quantity.checked_add(quantity), quantity)?;
        self.refresh_status();
        self.touch();
        Ok(())
    }

    /// Marks the product as discontinued.
    pub fn discontinue(&mut self) {
        self.status = InventoryStatus::Discontinued;
        self.touch();
    }

    /// Available plus allocated, saturating at the `i64` bounds.
    pub fn total_quantity(&self) -> i64 {
        self.available_quantity.saturating_add(self.allocated_quantity)
    }

    pub fn has_sufficient_quantity(&self, quantity: i64) -> bool {
        quantity <= self.available_quantity
    }

    /// True when projected allocations exceed the known stock.
    pub fn is_overallocated(&self) -> bool {
        self.available_quantity < 0
    }

    /// Derives the status from the available quantity unless discontinued.
    fn refresh_status(&mut self) {
        if self.status != InventoryStatus::Discontinued {
            self.status = InventoryStatus::for_quantity(self.available_quantity);
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn in_range(result: Option<i64>, quantity: i64) -> Result<i64> {
    result.ok_or(DomainError::InvalidQuantity {
        quantity,
        reason: "quantity out of range",
    })
}

fn require_positive(quantity: i64, reason: &'static str) -> Result<()> {
    if quantity <= 0 {
        return Err(DomainError::InvalidQuantity { quantity, reason });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(available: i64) -> InventoryItem {
        InventoryItem::new("p1", available).unwrap()
    }

    #[test]
    fn new_item_derives_status_from_quantity() {
        let stocked = item(10);
        assert_eq!(stocked.status, InventoryStatus::Available);
        assert_eq!(stocked.allocated_quantity, 0);

        assert_eq!(item(0).status, InventoryStatus::OutOfStock);
    }

    #[test]
    fn new_item_rejects_negative_quantity() {
        assert!(matches!(
            InventoryItem::new("p1", -1),
            Err(DomainError::InvalidQuantity { quantity: -1, .. })
        ));
    }

    #[test]
    fn set_available_recomputes_status_but_keeps_discontinued() {
        let mut i = item(5);
        i.set_available(0).unwrap();
        assert_eq!(i.status, InventoryStatus::OutOfStock);
        i.set_available(7).unwrap();
        assert_eq!(i.status, InventoryStatus::Available);

        i.discontinue();
        i.set_available(0).unwrap();
        assert_eq!(i.status, InventoryStatus::Discontinued);
        assert!(i.set_available(-3).is_err());
    }

    #[test]
    fn allocate_then_deallocate_restores_state() {
        for (available, quantity) in [(10, 10), (10, 3), (1, 1), (50, 49)] {
            let mut i = item(available);
            let before = (i.available_quantity, i.allocated_quantity, i.status);

            i.allocate(quantity).unwrap();
            i.deallocate(quantity).unwrap();

            assert_eq!(
                (i.available_quantity, i.allocated_quantity, i.status),
                before
            );
        }
    }

    #[test]
    fn allocate_to_zero_marks_out_of_stock() {
        let mut i = item(10);
        i.allocate(10).unwrap();
        assert_eq!(i.available_quantity, 0);
        assert_eq!(i.allocated_quantity, 10);
        assert_eq!(i.status, InventoryStatus::OutOfStock);
    }

    #[test]
    fn checked_operations_refuse_overdraw() {
        let mut i = item(2);
        assert!(matches!(
            i.allocate(3),
            Err(DomainError::InsufficientInventory {
                requested: 3,
                available: 2,
                ..
            })
        ));
        assert!(matches!(
            i.deallocate(1),
            Err(DomainError::ExcessDeallocation { .. })
        ));
        assert!(!i.has_sufficient_quantity(3));
        assert!(i.has_sufficient_quantity(2));
    }

    #[test]
    fn projected_allocation_may_go_negative() {
        let mut i = item(2);
        i.apply_allocation(5).unwrap();
        assert_eq!(i.available_quantity, -3);
        assert_eq!(i.allocated_quantity, 5);
        assert!(i.is_overallocated());
        assert_eq!(i.status, InventoryStatus::Available);
    }

    #[test]
    fn non_positive_deltas_are_rejected() {
        let mut i = item(5);
        assert!(i.apply_allocation(0).is_err());
        assert!(i.apply_return(-1).is_err());
        assert!(i.add_stock(0).is_err());
        assert_eq!(i.available_quantity, 5);
    }

    #[test]
    fn add_stock_brings_item_back_in_stock() {
        let mut i = item(0);
        i.add_stock(4).unwrap();
        assert_eq!(i.status, InventoryStatus::Available);
        assert_eq!(i.total_quantity(), 4);
    }

    #[test]
    fn return_to_zero_after_overallocation_is_out_of_stock() {
        let mut i = item(2);
        i.apply_allocation(5).unwrap();
        i.apply_return(3).unwrap();
        assert_eq!(i.available_quantity, 0);
        assert_eq!(i.allocated_quantity, 2);
        assert_eq!(i.status, InventoryStatus::OutOfStock);

        i.apply_return(1).unwrap();
        assert_eq!(i.status, InventoryStatus::Available);
    }

    #[test]
    fn add_stock_up_to_zero_is_out_of_stock() {
        let mut i = item(1);
        i.apply_allocation(3).unwrap();
        i.add_stock(2).unwrap();
        assert_eq!(i.available_quantity, 0);
        assert_eq!(i.status, InventoryStatus::OutOfStock);
    }

    #[test]
    fn discontinued_survives_every_delta() {
        let mut i = item(1);
        i.discontinue();
        i.apply_allocation(1).unwrap();
        i.apply_return(1).unwrap();
        i.add_stock(5).unwrap();
        assert_eq!(i.status, InventoryStatus::Discontinued);
    }

    #[test]
    fn quantity_overflow_is_rejected_without_change() {
        let mut i = item(i64::MAX);
        let before = i.clone();

        assert!(matches!(
            i.add_stock(1),
            Err(DomainError::InvalidQuantity { quantity: 1, .. })
        ));
        assert!(i.apply_return(1).is_err());
        assert_eq!(
            (i.available_quantity, i.allocated_quantity, i.status),
            (before.available_quantity, before.allocated_quantity, before.status)
        );

        let mut low = item(0);
        low.available_quantity = i64::MIN + 1;
        assert!(low.apply_allocation(2).is_err());
        assert_eq!(low.allocated_quantity, 0);
    }

    #[test]
    fn item_serializes_camel_case() {
        let json = serde_json::to_value(item(3)).unwrap();
        assert_eq!(json["productId"], "p1");
        assert_eq!(json["availableQuantity"], 3);
        assert_eq!(json["status"], "AVAILABLE");
    }
}
