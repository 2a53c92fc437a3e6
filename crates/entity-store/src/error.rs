use thiserror::Error;

use crate::{AggregateId, VersionToken};

/// Errors that can occur when reading or writing entities.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The version token supplied with a write did not match the stored one.
    ///
    /// `actual` is `None` when no row exists for the id any more (deleted by
    /// another writer).
    #[error(
        "Concurrency conflict for {entity_type} {entity_id}: expected version {expected}, found {}",
        .actual.map(|v| v.to_string()).unwrap_or_else(|| "no row".to_string())
    )]
    Conflict {
        entity_type: &'static str,
        entity_id: AggregateId,
        expected: VersionToken,
        actual: Option<VersionToken>,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Entity state could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
