//! Delivery of committed domain events to subscribers.

use std::sync::Arc;

use async_trait::async_trait;

use crate::aggregate::DomainEvent;
use crate::error::DomainError;
use crate::events::FleetEvent;
use crate::retry::CancelSignal;

/// A subscriber to domain events.
///
/// Delivery is at least once: a handler may see the same event again after a
/// caller retries, so handlers must tolerate duplicates.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Returns the name of this handler, used in logs and errors.
    fn name(&self) -> &'static str;

    /// Returns true if this handler wants the event.
    fn handles(&self, event: &FleetEvent) -> bool;

    async fn handle(&self, event: &FleetEvent, cancel: &CancelSignal) -> Result<(), DomainError>;
}

/// Delivers events that the repository drained after a commit.
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    async fn dispatch(&self, events: &[FleetEvent], cancel: &CancelSignal)
    -> Result<(), DomainError>;
}

/// In-process dispatcher over a fixed list of handlers.
///
/// Events are delivered in emission order; for each event, handlers run in
/// registration order. The first handler failure stops delivery.
#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<[Arc<dyn EventHandler>]>,
}

impl EventBus {
    pub fn builder() -> EventBusBuilder {
        EventBusBuilder::default()
    }

    /// A bus with no subscribers.
    pub fn empty() -> Self {
        EventBusBuilder::default().build()
    }

    /// Returns the number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handler_names())
            .finish()
    }
}

#[async_trait]
impl EventDispatcher for EventBus {
    async fn dispatch(
        &self,
        events: &[FleetEvent],
        cancel: &CancelSignal,
    ) -> Result<(), DomainError> {
        for event in events {
            for handler in self.handlers.iter().filter(|h| h.handles(event)) {
                if let Err(e) = handler.handle(event, cancel).await {
                    tracing::error!(
                        handler = handler.name(),
                        event_type = event.event_type(),
                        aggregate_id = %event.aggregate_id(),
                        error = %e,
                        "event handler failed"
                    );
                    metrics::counter!("event_handler_failures_total", "handler" => handler.name())
                        .increment(1);
                    return Err(DomainError::Reaction {
                        handler: handler.name(),
                        event_type: event.event_type(),
                        source: Box::new(e),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Collects handlers for an [`EventBus`].
#[derive(Default)]
pub struct EventBusBuilder {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventBusBuilder {
    pub fn handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Registers a handler that is also held elsewhere, e.g. a view that is
    /// queried directly.
    pub fn shared(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn build(self) -> EventBus {
        EventBus {
            handlers: self.handlers.into(),
        }
    }
}
