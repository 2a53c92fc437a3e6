//! Persistence pipeline shared by every aggregate type.
//!
//! Every write runs under the retry orchestrator. Once the store has
//! committed, the aggregate's buffered events are drained and handed to the
//! dispatcher. Events from a failed write stay buffered on the aggregate.
//!
//! Read-modify-write callers go through [`Repository::modify`] or
//! [`Repository::update_with`], which replay the change on fresh state after
//! a conflict.

use std::sync::Arc;

use common::AggregateId;
use entity_store::{EntityStore, EntityStoreExt, StoreError};

use crate::aggregate::Aggregate;
use crate::dispatch::EventDispatcher;
use crate::error::DomainError;
use crate::events::FleetEvent;
use crate::retry::{
    BatchKind, BatchOp, CancelSignal, DeleteOp, ModifyOp, RetryOrchestrator, UpdateOp,
};

/// Store, retry loop and event dispatch for one aggregate type.
pub struct Repository<A: Aggregate> {
    store: Arc<dyn EntityStore<A>>,
    retry: RetryOrchestrator,
    dispatcher: Arc<dyn EventDispatcher>,
}

impl<A: Aggregate> Clone for Repository<A> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            retry: self.retry,
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

impl<A: Aggregate> Repository<A> {
    pub fn new(
        store: Arc<dyn EntityStore<A>>,
        retry: RetryOrchestrator,
        dispatcher: Arc<dyn EventDispatcher>,
    ) -> Self {
        Self {
            store,
            retry,
            dispatcher,
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &Arc<dyn EntityStore<A>> {
        &self.store
    }

    /// Persists a new aggregate. An id collision is reported as a conflict
    /// without retrying.
    #[tracing::instrument(skip_all, fields(aggregate_type = A::ENTITY_TYPE, id = %entity.id()))]
    pub async fn add(&self, entity: &mut A, cancel: &CancelSignal) -> Result<(), DomainError> {
        cancel.check()?;
        self.store
            .add(entity)
            .await
            .map_err(|e| self.store_failed("add", entity.id(), e))?;
        self.committed("add", 1);
        self.publish(entity.take_events(), cancel).await
    }

    /// Persists several new aggregates; either all are stored or none.
    #[tracing::instrument(
        skip_all,
        fields(aggregate_type = A::ENTITY_TYPE, count = entities.len())
    )]
    pub async fn add_range(
        &self,
        entities: &mut [A],
        cancel: &CancelSignal,
    ) -> Result<(), DomainError> {
        if entities.is_empty() {
            return Ok(());
        }
        cancel.check()?;
        let first = entities[0].id();
        self.store
            .add_range(entities)
            .await
            .map_err(|e| self.store_failed("add_range", first, e))?;
        self.committed("add_range", entities.len());
        self.publish(drain(entities), cancel).await
    }

    pub async fn get_by_id(&self, id: AggregateId) -> Result<Option<A>, DomainError> {
        self.store
            .get_by_id(id)
            .await
            .map_err(|e| self.store_failed("get_by_id", id, e))
    }

    /// Like [`get_by_id`](Self::get_by_id), with absence as `NotFound`.
    pub async fn find_by_id(&self, id: AggregateId) -> Result<A, DomainError> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found::<A>(id))
    }

    pub async fn get_all(&self) -> Result<Vec<A>, DomainError> {
        self.store
            .get_all()
            .await
            .map_err(|e| self.store_failed("get_all", AggregateId::nil(), e))
    }

    /// Loads the aggregates that exist among `ids`.
    pub async fn get_many(&self, ids: &[AggregateId]) -> Result<Vec<A>, DomainError> {
        self.store
            .get_many(ids)
            .await
            .map_err(|e| self.store_failed("get_many", AggregateId::nil(), e))
    }

    #[tracing::instrument(skip_all, fields(aggregate_type = A::ENTITY_TYPE, id = %entity.id()))]
    pub async fn update(&self, entity: &mut A, cancel: &CancelSignal) -> Result<(), DomainError> {
        let id = entity.id();
        let mut op = UpdateOp::new(self.store.as_ref(), entity);
        self.retry
            .execute(&mut op, cancel)
            .await
            .map_err(|e| self.write_failed("update", id, e))?;
        self.committed("update", 1);
        self.publish(entity.take_events(), cancel).await
    }

    /// Loads the aggregate, applies `change` and writes it back.
    pub async fn modify<F>(
        &self,
        id: AggregateId,
        change: F,
        cancel: &CancelSignal,
    ) -> Result<A, DomainError>
    where
        F: Fn(&mut A) -> Result<(), DomainError> + Send,
    {
        let mut entity = self.find_by_id(id).await?;
        change(&mut entity)?;
        self.update_with(&mut entity, change, cancel).await?;
        Ok(entity)
    }

    /// Writes an aggregate `change` has already been applied to. A conflict
    /// reloads the stored state and applies `change` again before retrying.
    #[tracing::instrument(skip_all, fields(aggregate_type = A::ENTITY_TYPE, id = %entity.id()))]
    pub async fn update_with<F>(
        &self,
        entity: &mut A,
        change: F,
        cancel: &CancelSignal,
    ) -> Result<(), DomainError>
    where
        F: Fn(&mut A) -> Result<(), DomainError> + Send,
    {
        let id = entity.id();
        let mut op = ModifyOp::new(self.store.as_ref(), entity, change);
        self.retry
            .execute(&mut op, cancel)
            .await
            .map_err(|e| self.write_failed("update", id, e))?;
        self.committed("update", 1);
        self.publish(entity.take_events(), cancel).await
    }

    #[tracing::instrument(
        skip_all,
        fields(aggregate_type = A::ENTITY_TYPE, count = entities.len())
    )]
    pub async fn update_range(
        &self,
        entities: &mut [A],
        cancel: &CancelSignal,
    ) -> Result<(), DomainError> {
        self.batch(entities, BatchKind::Update, cancel).await
    }

    #[tracing::instrument(skip_all, fields(aggregate_type = A::ENTITY_TYPE, id = %entity.id()))]
    pub async fn delete(&self, entity: &mut A, cancel: &CancelSignal) -> Result<(), DomainError> {
        let id = entity.id();
        let mut op = DeleteOp::new(self.store.as_ref(), entity);
        self.retry
            .execute(&mut op, cancel)
            .await
            .map_err(|e| self.write_failed("delete", id, e))?;
        self.committed("delete", 1);
        self.publish(entity.take_events(), cancel).await
    }

    #[tracing::instrument(
        skip_all,
        fields(aggregate_type = A::ENTITY_TYPE, count = entities.len())
    )]
    pub async fn delete_range(
        &self,
        entities: &mut [A],
        cancel: &CancelSignal,
    ) -> Result<(), DomainError> {
        self.batch(entities, BatchKind::Delete, cancel).await
    }

    async fn batch(
        &self,
        entities: &mut [A],
        kind: BatchKind,
        cancel: &CancelSignal,
    ) -> Result<(), DomainError> {
        if entities.is_empty() {
            return Ok(());
        }
        let operation = match kind {
            BatchKind::Update => "update_range",
            BatchKind::Delete => "delete_range",
        };
        let first = entities[0].id();
        let mut op = BatchOp::new(self.store.as_ref(), entities, kind);
        self.retry
            .execute(&mut op, cancel)
            .await
            .map_err(|e| self.write_failed(operation, first, e))?;
        self.committed(operation, entities.len());
        self.publish(drain(entities), cancel).await
    }

    async fn publish(
        &self,
        events: Vec<FleetEvent>,
        cancel: &CancelSignal,
    ) -> Result<(), DomainError> {
        if events.is_empty() {
            return Ok(());
        }
        metrics::counter!("domain_events_dispatched_total", "aggregate_type" => A::ENTITY_TYPE)
            .increment(events.len() as u64);
        self.dispatcher.dispatch(&events, cancel).await
    }

    fn committed(&self, operation: &'static str, count: usize) {
        metrics::counter!(
            "repository_writes_total",
            "aggregate_type" => A::ENTITY_TYPE,
            "operation" => operation
        )
        .increment(count as u64);
    }

    fn store_failed(
        &self,
        operation: &'static str,
        id: AggregateId,
        error: StoreError,
    ) -> DomainError {
        if let StoreError::Conflict { entity_id, .. } = &error {
            metrics::counter!("repository_conflicts_total", "aggregate_type" => A::ENTITY_TYPE)
                .increment(1);
            return DomainError::Conflict {
                aggregate_type: A::ENTITY_TYPE,
                id: *entity_id,
            };
        }
        self.write_failed(operation, id, DomainError::Store(error))
    }

    fn write_failed(
        &self,
        operation: &'static str,
        id: AggregateId,
        error: DomainError,
    ) -> DomainError {
        match &error {
            DomainError::Conflict { .. } => {
                metrics::counter!("repository_conflicts_total", "aggregate_type" => A::ENTITY_TYPE)
                    .increment(1);
            }
            DomainError::Store(e) => {
                tracing::error!(
                    aggregate_type = A::ENTITY_TYPE,
                    %id,
                    operation,
                    error = %e,
                    "store operation failed"
                );
            }
            _ => {}
        }
        error
    }
}

fn drain<A: Aggregate>(entities: &mut [A]) -> Vec<FleetEvent> {
    entities.iter_mut().flat_map(Aggregate::take_events).collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use entity_store::{InMemoryEntityStore, Storable, VersionToken};
    use tokio::sync::Mutex;

    use super::*;
    use crate::aggregate::DomainEvent;
    use crate::driver::Driver;
    use crate::enums::{DriverStatus, LicenseLevel};
    use crate::retry::RetryPolicy;

    /// Collects dispatched events.
    #[derive(Default)]
    struct Captured(Mutex<Vec<FleetEvent>>);

    #[async_trait::async_trait]
    impl EventDispatcher for Captured {
        async fn dispatch(
            &self,
            events: &[FleetEvent],
            _cancel: &CancelSignal,
        ) -> Result<(), DomainError> {
            self.0.lock().await.extend_from_slice(events);
            Ok(())
        }
    }

    struct Setup {
        store: InMemoryEntityStore<Driver>,
        events: Arc<Captured>,
        repo: Repository<Driver>,
    }

    fn setup() -> Setup {
        let store = InMemoryEntityStore::<Driver>::new();
        let events = Arc::new(Captured::default());
        let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2));
        let repo = Repository::new(
            Arc::new(store.clone()),
            RetryOrchestrator::new(policy),
            Arc::clone(&events) as Arc<dyn EventDispatcher>,
        );
        Setup { store, events, repo }
    }

    fn never() -> CancelSignal {
        CancelSignal::never()
    }

    #[tokio::test]
    async fn add_then_read_round_trips() {
        let s = setup();
        let mut driver = Driver::new("Han Solo", LicenseLevel::Veteran).unwrap();
        assert_eq!(driver.version(), VersionToken::initial());

        s.repo.add(&mut driver, &never()).await.unwrap();
        assert_eq!(driver.version(), VersionToken::first());

        let loaded = s.repo.find_by_id(driver.id()).await.unwrap();
        assert_eq!(loaded, driver);
    }

    #[tokio::test]
    async fn events_are_dispatched_after_commit_only() {
        let s = setup();
        let mut driver = Driver::new("Leia", LicenseLevel::Rookie).unwrap();
        s.repo.add(&mut driver, &never()).await.unwrap();

        driver.mark_on_trip();
        s.repo.update(&mut driver, &never()).await.unwrap();

        let seen = s.events.0.lock().await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].event_type(), "DriverStatusChanged");
        assert!(driver.pending_events().is_empty());
        assert_eq!(driver.version(), VersionToken::new(2));
    }

    #[tokio::test]
    async fn failed_write_keeps_events_buffered() {
        let s = setup();
        let mut driver = Driver::new("Lando", LicenseLevel::Veteran).unwrap();
        s.repo.add(&mut driver, &never()).await.unwrap();
        let mut stale = driver.clone();

        driver.rename("Lando Calrissian").unwrap();
        s.repo.update(&mut driver, &never()).await.unwrap();

        s.store.inject_conflicts(3);
        stale.mark_on_trip();
        let err = s.repo.update(&mut stale, &never()).await.unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(stale.pending_events().len(), 1);
        assert_eq!(s.events.0.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn update_with_replays_change_on_fresh_state() {
        let s = setup();
        let mut driver = Driver::new("Chewie", LicenseLevel::Veteran).unwrap();
        s.repo.add(&mut driver, &never()).await.unwrap();
        let mut stale = driver.clone();

        driver.rename("Chewbacca").unwrap();
        s.repo.update(&mut driver, &never()).await.unwrap();

        let change = |d: &mut Driver| {
            d.mark_on_trip();
            Ok::<_, DomainError>(())
        };
        change(&mut stale).unwrap();
        s.repo.update_with(&mut stale, change, &never()).await.unwrap();

        let stored = s.repo.find_by_id(stale.id()).await.unwrap();
        assert_eq!(stored.status(), DriverStatus::OnTrip);
        assert_eq!(stored.name(), "Chewbacca");
        assert_eq!(stored.version(), VersionToken::new(3));
        assert!(stale.pending_events().is_empty());
        assert_eq!(s.events.0.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn plain_update_only_adopts_the_latest_token() {
        let s = setup();
        let mut driver = Driver::new("Chewie", LicenseLevel::Veteran).unwrap();
        s.repo.add(&mut driver, &never()).await.unwrap();
        let mut stale = driver.clone();

        driver.rename("Chewbacca").unwrap();
        s.repo.update(&mut driver, &never()).await.unwrap();

        stale.mark_on_trip();
        s.repo.update(&mut stale, &never()).await.unwrap();

        let stored = s.repo.find_by_id(stale.id()).await.unwrap();
        assert_eq!(stored.status(), DriverStatus::OnTrip);
        assert_eq!(stored.name(), "Chewie");
        assert_eq!(stored.version(), VersionToken::new(3));
    }

    #[tokio::test]
    async fn update_of_deleted_aggregate_is_not_found() {
        let s = setup();
        let mut driver = Driver::new("Greedo", LicenseLevel::Rookie).unwrap();
        s.repo.add(&mut driver, &never()).await.unwrap();
        let mut copy = driver.clone();
        s.repo.delete(&mut driver, &never()).await.unwrap();

        copy.mark_on_trip();
        let err = s.repo.update(&mut copy, &never()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn duplicate_add_is_a_conflict() {
        let s = setup();
        let mut driver = Driver::new("Boba", LicenseLevel::Veteran).unwrap();
        s.repo.add(&mut driver, &never()).await.unwrap();

        let mut again = driver.clone();
        again.set_version(VersionToken::initial());
        let err = s.repo.add(&mut again, &never()).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn ranges_write_and_dispatch_every_event() {
        let s = setup();
        let mut drivers = vec![
            Driver::new("Rey", LicenseLevel::Rookie).unwrap(),
            Driver::new("Finn", LicenseLevel::Rookie).unwrap(),
        ];
        s.repo.add_range(&mut drivers, &never()).await.unwrap();

        for driver in drivers.iter_mut() {
            driver.mark_on_trip();
        }
        s.repo.update_range(&mut drivers, &never()).await.unwrap();
        assert_eq!(s.events.0.lock().await.len(), 2);

        let ids: Vec<_> = drivers.iter().map(|d| d.id()).collect();
        assert_eq!(s.repo.get_many(&ids).await.unwrap().len(), 2);

        s.repo.delete_range(&mut drivers, &never()).await.unwrap();
        assert!(s.repo.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_write_leaves_store_untouched() {
        let s = setup();
        let (tx, cancel) = CancelSignal::channel();
        tx.send(true).unwrap();

        let mut driver = Driver::new("Poe", LicenseLevel::Veteran).unwrap();
        let err = s.repo.add(&mut driver, &cancel).await.unwrap_err();
        assert!(matches!(err, DomainError::Cancelled));
        assert_eq!(s.store.entity_count().await, 0);
    }
}
