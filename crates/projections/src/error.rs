//! Projection error types.

use thiserror::Error;

/// Errors that can occur while applying an event to a projection.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// Reading an aggregate the projection depends on failed.
    #[error("Entity store error: {0}")]
    Store(#[from] entity_store::StoreError),

    /// A projection-specific error.
    #[error("Projection error: {0}")]
    Projection(String),
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
