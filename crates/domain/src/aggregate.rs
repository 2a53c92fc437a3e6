//! Core aggregate and domain event traits.

use chrono::{DateTime, Utc};
use common::AggregateId;
use entity_store::{Storable, VersionToken};
use serde::{Deserialize, Serialize};

use crate::events::FleetEvent;

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and named in past tense.
pub trait DomainEvent: Send + Sync + Clone {
    /// Returns the event type name, used for logging, metrics and routing.
    fn event_type(&self) -> &'static str;

    /// Id of the aggregate that raised the event.
    fn aggregate_id(&self) -> AggregateId;

    fn occurred_at(&self) -> DateTime<Utc>;
}

/// Identity, timestamps and concurrency token shared by every aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMeta {
    pub id: AggregateId,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: VersionToken,
}

impl EntityMeta {
    /// Metadata for a freshly constructed, never persisted aggregate.
    pub fn new() -> Self {
        Self {
            id: AggregateId::new(),
            created_at: Utc::now(),
            updated_at: None,
            version: VersionToken::initial(),
        }
    }
}

impl Default for EntityMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// A persisted aggregate that buffers domain events between writes.
///
/// The buffer lives only on the in-memory instance. It is drained by the
/// repository once the write that produced the events has committed.
pub trait Aggregate: Storable {
    /// Events raised since the last successful write, oldest first.
    fn pending_events(&self) -> &[FleetEvent];

    /// Drains the buffer, returning what it held.
    fn take_events(&mut self) -> Vec<FleetEvent>;

    /// Discards buffered events without returning them.
    fn clear_events(&mut self) {
        self.take_events();
    }
}

/// Implements [`Storable`] and [`Aggregate`] for a struct with a
/// `meta: EntityMeta` field and an `events: Vec<FleetEvent>` buffer, and adds
/// a private `record` helper that stamps the update time and buffers an event.
macro_rules! impl_aggregate {
    ($ty:ty, $name:literal) => {
        impl entity_store::Storable for $ty {
            const ENTITY_TYPE: &'static str = $name;

            fn id(&self) -> common::AggregateId {
                self.meta.id
            }

            fn version(&self) -> entity_store::VersionToken {
                self.meta.version
            }

            fn set_version(&mut self, version: entity_store::VersionToken) {
                self.meta.version = version;
            }

            fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
                self.meta.created_at
            }

            fn touch(&mut self, at: chrono::DateTime<chrono::Utc>) {
                self.meta.updated_at = Some(at);
            }
        }

        impl $crate::aggregate::Aggregate for $ty {
            fn pending_events(&self) -> &[$crate::events::FleetEvent] {
                &self.events
            }

            fn take_events(&mut self) -> Vec<$crate::events::FleetEvent> {
                std::mem::take(&mut self.events)
            }
        }

        impl $ty {
            fn record(&mut self, event: $crate::events::FleetEvent) {
                self.meta.updated_at =
                    Some($crate::aggregate::DomainEvent::occurred_at(&event));
                self.events.push(event);
            }
        }
    };
}

pub(crate) use impl_aggregate;
