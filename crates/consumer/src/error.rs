//! Consumer runtime error types.

use event_stream::{DecodeError, TransportError};
use projections::ProjectionError;
use thiserror::Error;

use crate::state::RuntimeState;

/// Errors raised by the consumer runtime and its message handlers.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// The message bytes are not a valid envelope.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The projection rejected or failed to apply the event.
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// The broker failed to join, commit, release or close.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The runtime was asked to move to a state it cannot reach.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: RuntimeState, to: RuntimeState },

    /// `run` was called while another run is in progress.
    #[error("Consumer runtime is already running")]
    AlreadyRunning,
}

impl ConsumerError {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ConsumerError::Decode(_) => "decode",
            ConsumerError::Projection(e) => e.kind(),
            ConsumerError::Transport(_) => "transport",
            ConsumerError::InvalidTransition { .. } => "invalid_transition",
            ConsumerError::AlreadyRunning => "already_running",
        }
    }
}

/// Result type for consumer operations.
pub type Result<T> = std::result::Result<T, ConsumerError>;
