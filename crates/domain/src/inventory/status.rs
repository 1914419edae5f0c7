//! Inventory status.

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Stock status of an inventory item.
///
/// `OutOfStock` holds exactly when the available quantity is zero and the
/// item is not discontinued. `Discontinued` is only ever set explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InventoryStatus {
    #[default]
    Available,
    OutOfStock,
    Discontinued,
}

impl InventoryStatus {
    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryStatus::Available => "AVAILABLE",
            InventoryStatus::OutOfStock => "OUT_OF_STOCK",
            InventoryStatus::Discontinued => "DISCONTINUED",
        }
    }

    /// Status implied by an available quantity, for items not discontinued.
    pub fn for_quantity(available: i64) -> Self {
        if available == 0 {
            InventoryStatus::OutOfStock
        } else {
            InventoryStatus::Available
        }
    }
}

impl std::fmt::Display for InventoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for InventoryStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(InventoryStatus::Available),
            "OUT_OF_STOCK" => Ok(InventoryStatus::OutOfStock),
            "DISCONTINUED" => Ok(InventoryStatus::Discontinued),
            other => Err(DomainError::InvalidStatus {
                kind: "inventory",
                value: other.to_string(),
            }),
        }
    }
}
