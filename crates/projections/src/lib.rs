//! Projection handlers for the CQRS query side.
//!
//! This crate turns stream events into read-model mutations:
//! - [`Projection`] trait binding an event family to its handlers
//! - [`dispatch`] decoding an envelope through the catalog and applying it
//! - [`InventoryProjection`] and [`OrderProjection`] over the read stores

pub mod error;
pub mod projection;
pub mod views;

pub use error::{ProjectionError, Result};
pub use projection::{Projection, dispatch};
pub use views::{InventoryProjection, OrderProjection};
