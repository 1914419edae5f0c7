//! Event stream plumbing for the query side.
//!
//! - [`decode`] turns raw message bytes into an [`EventEnvelope`] whose payload
//!   stays undecoded until its type tag is known
//! - [`catalog`] maps type tags to typed events ([`InventoryEvent`], [`OrderEvent`])
//! - [`transport`] is the consumer-group contract the runtime depends on, with
//!   an in-memory broker and a PostgreSQL-backed broker implementing it

pub mod catalog;
pub mod envelope;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod transport;

pub use catalog::{
    AddressData, CatalogEntry, EventFamily, InventoryAllocatedData, InventoryEvent,
    InventoryReturnedData, InventoryUpdatedData, MoneyData, OrderCanceledData, OrderCreatedData,
    OrderEvent, OrderItemData, OrderStatusUpdatedData, TypedEvent,
};
pub use envelope::{EventEnvelope, EventEnvelopeBuilder, EventId, Version, decode};
pub use error::{DecodeError, Result, TransportError};
pub use memory::{InMemoryBroker, InMemoryGroup};
pub use postgres::{PgBroker, PgBrokerOptions, PgGroup};
pub use transport::{
    ConsumerGroup, GroupSession, OffsetCommitter, PartitionClaim, SessionLease, StreamMessage,
};
