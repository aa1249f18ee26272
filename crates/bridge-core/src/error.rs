//! Error types for bridge-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid venue spec: {0}")]
    InvalidSpec(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
