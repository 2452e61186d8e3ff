//! Centralized error types for Taskdeck.

use thiserror::Error;

use crate::gateway::{GatewayError, Rejection};

/// Main error type for board and selection operations.
#[derive(Error, Debug)]
pub enum BoardError {
    #[error("Failed to load board for project '{project_id}': {source}")]
    Load {
        project_id: String,
        #[source]
        source: GatewayError,
    },

    #[error("Mutation {command} failed: {reason}")]
    MutationFailed { command: String, reason: Rejection },

    #[error("Stale reference: {entity} is no longer on the board")]
    StaleReference { entity: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Board context for project '{0}' has been disposed")]
    Disposed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] taskdeck_redis::RedisError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for Taskdeck operations.
pub type BoardResult<T> = Result<T, BoardError>;

impl BoardError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a stale reference error.
    pub fn stale(entity: impl Into<String>) -> Self {
        Self::StaleReference {
            entity: entity.into(),
        }
    }

    /// Whether the failure left the board untouched (nothing applied, nothing sent).
    pub fn is_noop(&self) -> bool {
        matches!(
            self,
            Self::StaleReference { .. } | Self::ValidationError(_) | Self::Disposed(_)
        )
    }
}
