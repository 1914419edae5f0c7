//! Projections over the inventory and order read stores.

mod inventory;
mod orders;

pub use inventory::InventoryProjection;
pub use orders::OrderProjection;
