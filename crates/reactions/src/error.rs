//! Errors raised while assembling the fleet.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FleetError {
    /// The PostgreSQL stores could not be prepared.
    #[error("Entity store error: {0}")]
    Store(#[from] entity_store::StoreError),
}

pub type Result<T> = std::result::Result<T, FleetError>;
