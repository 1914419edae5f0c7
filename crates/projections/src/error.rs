//! Projection error types.

use domain::DomainError;
use event_stream::DecodeError;
use read_store::StoreError;
use thiserror::Error;

/// Errors that can occur while applying an event to a read model.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// The envelope or its payload could not be decoded.
    #[error("Decode error: {0}")]
    Decode(DecodeError),

    /// No handler is registered for the type tag.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// The event refers to a record that must already exist.
    #[error("{model} not found: {key}")]
    NotFound { model: &'static str, key: String },

    /// The mutation violates a domain rule.
    #[error("Validation error: {0}")]
    Validation(#[from] DomainError),

    /// The read store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<DecodeError> for ProjectionError {
    fn from(error: DecodeError) -> Self {
        match error {
            DecodeError::UnknownEventType(tag) => ProjectionError::UnknownEventType(tag),
            other => ProjectionError::Decode(other),
        }
    }
}

impl ProjectionError {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProjectionError::Decode(_) => "decode",
            ProjectionError::UnknownEventType(_) => "unknown_event_type",
            ProjectionError::NotFound { .. } => "not_found",
            ProjectionError::Validation(_) => "validation",
            ProjectionError::Store(_) => "store",
        }
    }
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tag_is_lifted_out_of_decode_errors() {
        let err: ProjectionError = DecodeError::UnknownEventType("Mystery".to_string()).into();
        assert!(matches!(err, ProjectionError::UnknownEventType(ref t) if t == "Mystery"));
        assert_eq!(err.kind(), "unknown_event_type");
        assert!(err.to_string().contains("Mystery"));
    }
}
