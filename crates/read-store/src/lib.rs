//! Read-model persistence for the query side.
//!
//! - [`InventoryStore`] and [`OrderStore`] are the capabilities projections
//!   depend on: point lookup by natural key, list and filter, insert-only
//!   save, and upsert by key
//! - [`InMemoryInventoryStore`] / [`InMemoryOrderStore`] back tests and
//!   single-process runs
//! - [`PgInventoryStore`] / [`PgOrderStore`] persist to PostgreSQL
//!
//! A missing record is `Ok(None)`, never an error.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryInventoryStore, InMemoryOrderStore};
pub use postgres::{PgInventoryStore, PgOrderStore, run_migrations};
pub use store::{InventoryStore, OrderStore};
