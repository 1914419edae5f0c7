//! Domain layer for the query side.
//!
//! This crate provides the read-model entities projected from the event
//! streams:
//! - [`InventoryItem`] with its stock invariants
//! - [`Order`] with line items, addresses and money
//! - status enums that round-trip through their wire strings

pub mod error;
pub mod inventory;
pub mod order;

pub use error::DomainError;
pub use inventory::{InventoryItem, InventoryStatus};
pub use order::{Address, Money, Order, OrderItem, OrderStatus};

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
