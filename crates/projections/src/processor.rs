//! Delivery of committed domain events to projections.

use async_trait::async_trait;
use domain::{CancelSignal, DomainError, DomainEvent, EventHandler, FleetEvent};

use crate::projection::Projection;

/// Feeds every committed event to its registered projections.
///
/// The processor subscribes to the event bus as a single handler. Read-side
/// failures are logged and counted but never fail the write that produced
/// the event.
#[derive(Default)]
pub struct ProjectionProcessor {
    projections: Vec<Box<dyn Projection>>,
}

impl ProjectionProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a projection with this processor.
    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, projection: impl Projection + 'static) -> Self {
        self.register(Box::new(projection));
        self
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Delivers one event to all registered projections, returning how many
    /// of them failed.
    #[tracing::instrument(skip(self, event), fields(event_type = event.event_type()))]
    pub async fn process_event(&self, event: &FleetEvent) -> usize {
        let mut failures = 0;
        for projection in &self.projections {
            match projection.handle(event).await {
                Ok(()) => {
                    metrics::counter!(
                        "projections_events_processed",
                        "projection" => projection.name()
                    )
                    .increment(1);
                }
                Err(e) => {
                    failures += 1;
                    tracing::error!(
                        projection = projection.name(),
                        aggregate_id = %event.aggregate_id(),
                        error = %e,
                        "projection failed to apply event"
                    );
                    metrics::counter!(
                        "projection_failures_total",
                        "projection" => projection.name()
                    )
                    .increment(1);
                }
            }
        }
        failures
    }

    /// Resets all projections and replays `events` into them.
    #[tracing::instrument(skip_all, fields(events = events.len()))]
    pub async fn rebuild_all(&self, events: &[FleetEvent]) -> crate::Result<()> {
        for projection in &self.projections {
            projection.reset().await?;
        }
        for event in events {
            self.process_event(event).await;
        }
        tracing::info!(events_processed = events.len(), "rebuild complete");
        Ok(())
    }
}

#[async_trait]
impl EventHandler for ProjectionProcessor {
    fn name(&self) -> &'static str {
        "ProjectionProcessor"
    }

    fn handles(&self, _event: &FleetEvent) -> bool {
        !self.projections.is_empty()
    }

    async fn handle(&self, event: &FleetEvent, _cancel: &CancelSignal) -> Result<(), DomainError> {
        self.process_event(event).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use common::AggregateId;
    use domain::events::RouteCheckpointData;
    use tokio::sync::RwLock;

    use super::*;
    use crate::ProjectionError;
    use crate::projection::ProjectionPosition;

    /// Counts events and fails on every one when asked to.
    struct CountingProjection {
        count: Arc<RwLock<u64>>,
        position: Arc<RwLock<ProjectionPosition>>,
        failing: bool,
    }

    impl CountingProjection {
        fn new(failing: bool) -> Self {
            Self {
                count: Arc::new(RwLock::new(0)),
                position: Arc::new(RwLock::new(ProjectionPosition::zero())),
                failing,
            }
        }
    }

    #[async_trait]
    impl Projection for CountingProjection {
        fn name(&self) -> &'static str {
            "CountingProjection"
        }

        async fn handle(&self, event: &FleetEvent) -> crate::Result<()> {
            self.position.write().await.record(event);
            if self.failing {
                return Err(ProjectionError::Projection("boom".into()));
            }
            *self.count.write().await += 1;
            Ok(())
        }

        async fn position(&self) -> ProjectionPosition {
            *self.position.read().await
        }

        async fn reset(&self) -> crate::Result<()> {
            *self.count.write().await = 0;
            *self.position.write().await = ProjectionPosition::zero();
            Ok(())
        }
    }

    fn event() -> FleetEvent {
        FleetEvent::RouteCheckpointAdded(RouteCheckpointData {
            route_id: AggregateId::new(),
            checkpoint: "Moon".into(),
            occurred_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn delivers_to_every_projection() {
        let first = CountingProjection::new(false);
        let second = CountingProjection::new(false);
        let (a, b) = (Arc::clone(&first.count), Arc::clone(&second.count));
        let processor = ProjectionProcessor::new().with(first).with(second);

        processor
            .handle(&event(), &CancelSignal::never())
            .await
            .unwrap();

        assert_eq!(processor.projection_count(), 2);
        assert_eq!(*a.read().await, 1);
        assert_eq!(*b.read().await, 1);
    }

    #[tokio::test]
    async fn failing_projection_does_not_stop_others() {
        let healthy = CountingProjection::new(false);
        let count = Arc::clone(&healthy.count);
        let processor = ProjectionProcessor::new()
            .with(CountingProjection::new(true))
            .with(healthy);

        assert_eq!(processor.process_event(&event()).await, 1);
        assert!(processor.handle(&event(), &CancelSignal::never()).await.is_ok());
        assert_eq!(*count.read().await, 2);
    }

    #[tokio::test]
    async fn rebuild_resets_and_replays() {
        let projection = CountingProjection::new(false);
        let count = Arc::clone(&projection.count);
        let position = Arc::clone(&projection.position);
        let processor = ProjectionProcessor::new().with(projection);

        let events = vec![event(), event()];
        processor.rebuild_all(&events).await.unwrap();
        processor.rebuild_all(&events).await.unwrap();

        assert_eq!(*count.read().await, 2);
        assert_eq!(position.read().await.events_processed, 2);
    }

    #[test]
    fn empty_processor_handles_nothing() {
        assert!(!ProjectionProcessor::new().handles(&event()));
    }
}
