//! Inventory read model.

mod item;
mod status;

pub use item::InventoryItem;
pub use status::InventoryStatus;
