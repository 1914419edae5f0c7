use thiserror::Error;

/// Errors raised while turning raw message bytes into typed events.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The message is not a well-formed event envelope.
    #[error("Malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The envelope timestamp matched neither accepted layout.
    #[error("Invalid envelope timestamp: {0}")]
    InvalidTimestamp(#[from] common::TimestampParseError),

    /// The payload does not match the schema registered for its type tag.
    #[error("Invalid payload for {event_type}: {source}")]
    Payload {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },

    /// No catalog entry exists for the type tag.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),
}

/// Errors raised by a stream transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A database error occurred in the PostgreSQL broker.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The group moved to a newer generation; the commit was not applied.
    #[error("Stale generation {generation} for group {group_id} (current {current})")]
    StaleGeneration {
        group_id: String,
        generation: u64,
        current: u64,
    },

    /// A message could not be encoded for publishing.
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The broker refused to join the group.
    #[error("Join failed for group {group_id}: {reason}")]
    JoinFailed { group_id: String, reason: String },
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
