//! Shared types for the order-fulfillment query side.

pub mod time;
pub mod types;

pub use time::{TimestampParseError, parse_timestamp};
pub use types::{CustomerId, OrderId, ProductId};
