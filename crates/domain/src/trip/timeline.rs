use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enums::TripEventType;

/// One entry in a trip's append-only timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: TripEventType,
    pub details: Option<String>,
}

impl TripEvent {
    pub(crate) fn new(
        event_type: TripEventType,
        details: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: at,
            event_type,
            details,
        }
    }
}
