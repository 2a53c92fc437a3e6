//! Domain error types.

use common::AggregateId;
use entity_store::{Storable, StoreError};
use thiserror::Error;

use crate::response::ResponseStatus;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Malformed input, rejected before any state changed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// An aggregate could not be constructed from the given values.
    #[error("Invalid {aggregate_type}: {reason}")]
    InvalidAggregateState {
        aggregate_type: &'static str,
        reason: String,
    },

    /// The operation is not legal in the aggregate's current state.
    #[error("Cannot {operation} {aggregate_type} {aggregate_id} while it is {current_state}")]
    InvalidStateTransition {
        aggregate_type: &'static str,
        aggregate_id: AggregateId,
        operation: &'static str,
        current_state: String,
    },

    #[error("{aggregate_type} not found: {id}")]
    NotFound {
        aggregate_type: &'static str,
        id: AggregateId,
    },

    /// Version conflicts persisted through every retry attempt.
    #[error("{aggregate_type} {id} was modified concurrently, reload it and try again")]
    Conflict {
        aggregate_type: &'static str,
        id: AggregateId,
    },

    #[error("Operation cancelled")]
    Cancelled,

    /// A reaction to a committed write failed. The write itself stands.
    #[error("{handler} failed while handling {event_type}: {source}")]
    Reaction {
        handler: &'static str,
        event_type: &'static str,
        source: Box<DomainError>,
    },

    /// The persistence collaborator failed unexpectedly.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DomainError {
    pub fn not_found<A: Storable>(id: AggregateId) -> Self {
        DomainError::NotFound {
            aggregate_type: A::ENTITY_TYPE,
            id,
        }
    }

    pub fn invalid_state<A: Storable>(reason: impl Into<String>) -> Self {
        DomainError::InvalidAggregateState {
            aggregate_type: A::ENTITY_TYPE,
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, DomainError::Conflict { .. })
    }

    /// Coarse classification used by the result envelope.
    pub fn status(&self) -> ResponseStatus {
        match self {
            DomainError::Validation(_)
            | DomainError::InvalidAggregateState { .. }
            | DomainError::InvalidStateTransition { .. } => ResponseStatus::BadRequest,
            DomainError::NotFound { .. } => ResponseStatus::NotFound,
            DomainError::Conflict { .. } => ResponseStatus::Conflict,
            DomainError::Cancelled | DomainError::Reaction { .. } | DomainError::Store(_) => {
                ResponseStatus::InternalServerError
            }
        }
    }
}
