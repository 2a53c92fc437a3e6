//! Repositories the reaction handlers write through.

use common::AggregateId;
use domain::{Aggregate, CancelSignal, DomainError, Driver, Repository, Vehicle};
use entity_store::Storable;

/// Driver and vehicle repositories shared by every reaction handler.
///
/// These repositories should dispatch to subscribers only, never back to
/// the reaction handlers themselves.
#[derive(Clone)]
pub struct FleetResources {
    drivers: Repository<Driver>,
    vehicles: Repository<Vehicle>,
}

impl FleetResources {
    pub fn new(drivers: Repository<Driver>, vehicles: Repository<Vehicle>) -> Self {
        Self { drivers, vehicles }
    }

    pub fn drivers(&self) -> &Repository<Driver> {
        &self.drivers
    }

    pub fn vehicles(&self) -> &Repository<Vehicle> {
        &self.vehicles
    }

    pub(crate) async fn update_driver(
        &self,
        handler: &'static str,
        id: AggregateId,
        cancel: &CancelSignal,
        change: impl Fn(&mut Driver) + Send,
    ) -> Result<(), DomainError> {
        apply(&self.drivers, handler, id, cancel, move |d| {
            change(d);
            Ok(())
        })
        .await
    }

    pub(crate) async fn update_vehicle(
        &self,
        handler: &'static str,
        id: AggregateId,
        cancel: &CancelSignal,
        change: impl Fn(&mut Vehicle) -> Result<(), DomainError> + Send,
    ) -> Result<(), DomainError> {
        apply(&self.vehicles, handler, id, cancel, change).await
    }
}

/// Loads an aggregate, applies `change` and writes it back if anything
/// changed. A missing aggregate is skipped with a warning. After a conflict
/// `change` runs again on the reloaded aggregate.
async fn apply<A: Aggregate>(
    repo: &Repository<A>,
    handler: &'static str,
    id: AggregateId,
    cancel: &CancelSignal,
    change: impl Fn(&mut A) -> Result<(), DomainError> + Send,
) -> Result<(), DomainError> {
    let aggregate_type = <A as Storable>::ENTITY_TYPE;
    let Some(mut entity) = repo.get_by_id(id).await? else {
        tracing::warn!(handler, aggregate_type, %id, "aggregate not found, reaction skipped");
        metrics::counter!("reactions_skipped_total", "handler" => handler).increment(1);
        return Ok(());
    };

    change(&mut entity)?;
    if entity.pending_events().is_empty() {
        tracing::debug!(handler, aggregate_type, %id, "already up to date");
        return Ok(());
    }
    repo.update_with(&mut entity, change, cancel).await
}
