//! Domain error types.

use common::ProductId;
use thiserror::Error;

/// Errors raised when a mutation would break an entity invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A quantity was zero, negative, or otherwise out of range.
    #[error("Invalid quantity {quantity}: {reason}")]
    InvalidQuantity { quantity: i64, reason: &'static str },

    /// Allocation requested more than is available.
    #[error("Insufficient inventory for {product_id}: requested {requested}, available {available}")]
    InsufficientInventory {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    /// Deallocation requested more than is allocated.
    #[error(
        "Cannot deallocate more than allocated for {product_id}: requested {requested}, allocated {allocated}"
    )]
    ExcessDeallocation {
        product_id: ProductId,
        requested: i64,
        allocated: i64,
    },

    /// A status string did not name a known status.
    #[error("Invalid {kind} status: {value}")]
    InvalidStatus { kind: &'static str, value: String },

    /// Two amounts in different currencies were combined.
    #[error("Currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch { expected: String, found: String },

    /// An amount left the representable decimal range.
    #[error("Amount overflow in {operation} ({currency})")]
    AmountOverflow {
        operation: &'static str,
        currency: String,
    },
}
