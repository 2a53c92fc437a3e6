//! The projection trait and how far each projection has read.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{DomainEvent, FleetEvent};

use crate::Result;

/// How far a projection has read the event flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    pub events_processed: u64,
    /// `occurred_at` of the newest event seen; events may arrive out of order.
    pub last_event_at: Option<DateTime<Utc>>,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Counts `event` as read.
    pub fn record(&mut self, event: &FleetEvent) {
        self.events_processed += 1;
        let at = event.occurred_at();
        self.last_event_at = Some(self.last_event_at.map_or(at, |seen| seen.max(at)));
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.last_event_at {
            Some(at) => write!(f, "position({} @ {})", self.events_processed, at.to_rfc3339()),
            None => write!(f, "position({})", self.events_processed),
        }
    }
}

/// A subscriber that folds committed fleet events into read-side state.
///
/// Every event is offered to every projection; a projection records the
/// event in its position even when it ignores it.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &FleetEvent) -> Result<()>;

    async fn position(&self) -> ProjectionPosition;

    /// Drops all state, position included.
    async fn reset(&self) -> Result<()>;
}
