//! Consumer-group runtime for the query side.
//!
//! A [`ConsumerRuntime`] joins one consumer group for one topic, drives each
//! claimed partition in its own task and hands every message to a
//! [`MessageHandler`]. [`ProjectionHandler`] adapts a projection into a
//! handler. Cancellation is cooperative through a [`Shutdown`] token.

pub mod error;
pub mod handler;
pub mod runtime;
pub mod shutdown;
pub mod state;

pub use error::{ConsumerError, Result};
pub use handler::{MessageHandler, ProjectionHandler};
pub use runtime::{ConsumerRuntime, DEFAULT_RETRY_BACKOFF, RuntimeHandle, RuntimeStatus};
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use state::RuntimeState;

/// Topic carrying inventory events.
pub const INVENTORY_TOPIC: &str = "inventory-events";

/// Topic carrying order events.
pub const ORDER_TOPIC: &str = "order-events";

/// Consumer group of the inventory projection.
pub const INVENTORY_GROUP: &str = "inventory-consumer-group";

/// Consumer group of the order projection.
pub const ORDER_GROUP: &str = "order-consumer-group";
