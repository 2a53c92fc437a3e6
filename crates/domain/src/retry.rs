//! Optimistic-concurrency retry loop.
//!
//! A write that loses a version race is brought up to date with the stored
//! state, waits a short linear backoff and tries again. [`ModifyOp`] reloads
//! the aggregate and applies its change again, so a concurrent commit is
//! never overwritten. The plain [`UpdateOp`] and [`DeleteOp`] only adopt the
//! latest token for callers that hold no change to replay.

use std::time::Duration;

use async_trait::async_trait;
use common::AggregateId;
use entity_store::{EntityStore, Storable, StoreError};
use tokio::sync::watch;

use crate::error::DomainError;

/// Bounds for the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included. Never less than 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Backoff after the given (1-based) failed attempt: `min(base * attempt, max)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(50), Duration::from_millis(200))
    }
}

/// Cooperative cancellation fed by a `watch` channel.
///
/// Sending `true` cancels every clone. A dropped sender that never sent
/// `true` never cancels.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx: Some(rx) }
    }

    /// A signal that is never raised.
    pub fn never() -> Self {
        Self { rx: None }
    }

    /// Creates a sender and the signal it controls.
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self::new(rx))
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once the signal is raised.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.rx else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }

    /// Fails with [`DomainError::Cancelled`] if the signal is raised.
    pub fn check(&self) -> Result<(), DomainError> {
        if self.is_cancelled() {
            Err(DomainError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A write the orchestrator can repeat.
#[async_trait]
pub trait Retryable: Send {
    type Output: Send;

    /// Entity type name, for logs.
    fn entity_type(&self) -> &'static str;

    /// Id of the entity being written. Batches report their first entity.
    fn entity_id(&self) -> AggregateId;

    /// Performs the write once.
    async fn attempt(&mut self) -> Result<Self::Output, StoreError>;

    /// Brings the write up to date with the stored state. Fails with
    /// `NotFound` when the row is gone.
    async fn refresh(&mut self) -> Result<(), DomainError>;
}

/// Runs [`Retryable`] writes under a [`RetryPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryOrchestrator {
    policy: RetryPolicy,
}

impl RetryOrchestrator {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Executes the write, retrying version conflicts until the policy runs
    /// out. Other store errors are returned as they are.
    pub async fn execute<R: Retryable>(
        &self,
        op: &mut R,
        cancel: &CancelSignal,
    ) -> Result<R::Output, DomainError> {
        let max_attempts = self.policy.max_attempts;
        let mut attempt = 1;

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled(op));
            }

            let (entity_type, entity_id) = match op.attempt().await {
                Ok(output) => return Ok(output),
                Err(StoreError::Conflict {
                    entity_type,
                    entity_id,
                    ..
                }) => (entity_type, entity_id),
                Err(e) => return Err(e.into()),
            };

            metrics::counter!("retry_conflicts_total", "entity_type" => entity_type).increment(1);
            if attempt >= max_attempts {
                tracing::warn!(
                    attempt,
                    max_attempts,
                    entity_type,
                    %entity_id,
                    "concurrency conflict persisted, giving up"
                );
                return Err(DomainError::Conflict {
                    aggregate_type: entity_type,
                    id: entity_id,
                });
            }

            tracing::warn!(
                attempt,
                max_attempts,
                entity_type,
                %entity_id,
                "concurrency conflict, refreshing and retrying"
            );
            op.refresh().await?;
            if cancel.is_cancelled() {
                return Err(cancelled(op));
            }

            tokio::select! {
                _ = tokio::time::sleep(self.policy.delay_for(attempt)) => {}
                _ = cancel.cancelled() => return Err(cancelled(op)),
            }
            attempt += 1;
        }
    }
}

fn cancelled<R: Retryable>(op: &R) -> DomainError {
    tracing::debug!(
        entity_type = op.entity_type(),
        entity_id = %op.entity_id(),
        "write cancelled"
    );
    DomainError::Cancelled
}

async fn adopt_latest<A: Storable>(
    store: &dyn EntityStore<A>,
    entity: &mut A,
) -> Result<(), DomainError> {
    match store.current_version(entity.id()).await? {
        Some(version) => {
            entity.set_version(version);
            Ok(())
        }
        None => Err(DomainError::not_found::<A>(entity.id())),
    }
}

/// Version-checked update of one entity.
pub struct UpdateOp<'a, A: Storable> {
    store: &'a dyn EntityStore<A>,
    entity: &'a mut A,
}

impl<'a, A: Storable> UpdateOp<'a, A> {
    pub fn new(store: &'a dyn EntityStore<A>, entity: &'a mut A) -> Self {
        Self { store, entity }
    }
}

#[async_trait]
impl<A: Storable> Retryable for UpdateOp<'_, A> {
    type Output = ();

    fn entity_type(&self) -> &'static str {
        A::ENTITY_TYPE
    }

    fn entity_id(&self) -> AggregateId {
        self.entity.id()
    }

    async fn attempt(&mut self) -> Result<(), StoreError> {
        self.store.update(&mut *self.entity).await.map(|_| ())
    }

    async fn refresh(&mut self) -> Result<(), DomainError> {
        adopt_latest(self.store, &mut *self.entity).await
    }
}

/// Load-change-write of one entity.
///
/// The caller applies `change` once before the first attempt. On conflict
/// the stored state replaces the entity, dropping the events the previous
/// attempt buffered, and `change` runs again. A transition the concurrent
/// writer made illegal fails the write with the aggregate's own error.
pub struct ModifyOp<'a, A: Storable, F> {
    store: &'a dyn EntityStore<A>,
    entity: &'a mut A,
    change: F,
}

impl<'a, A, F> ModifyOp<'a, A, F>
where
    A: Storable,
    F: Fn(&mut A) -> Result<(), DomainError> + Send,
{
    pub fn new(store: &'a dyn EntityStore<A>, entity: &'a mut A, change: F) -> Self {
        Self {
            store,
            entity,
            change,
        }
    }
}

#[async_trait]
impl<A, F> Retryable for ModifyOp<'_, A, F>
where
    A: Storable,
    F: Fn(&mut A) -> Result<(), DomainError> + Send,
{
    type Output = ();

    fn entity_type(&self) -> &'static str {
        A::ENTITY_TYPE
    }

    fn entity_id(&self) -> AggregateId {
        self.entity.id()
    }

    async fn attempt(&mut self) -> Result<(), StoreError> {
        self.store.update(&mut *self.entity).await.map(|_| ())
    }

    async fn refresh(&mut self) -> Result<(), DomainError> {
        let id = self.entity.id();
        let Some(latest) = self.store.get_by_id(id).await? else {
            return Err(DomainError::not_found::<A>(id));
        };
        *self.entity = latest;
        tracing::debug!(entity_type = A::ENTITY_TYPE, %id, "reloaded, applying change again");
        (self.change)(&mut *self.entity)
    }
}

/// Version-checked delete of one entity.
pub struct DeleteOp<'a, A: Storable> {
    store: &'a dyn EntityStore<A>,
    entity: &'a mut A,
}

impl<'a, A: Storable> DeleteOp<'a, A> {
    pub fn new(store: &'a dyn EntityStore<A>, entity: &'a mut A) -> Self {
        Self { store, entity }
    }
}

#[async_trait]
impl<A: Storable> Retryable for DeleteOp<'_, A> {
    type Output = ();

    fn entity_type(&self) -> &'static str {
        A::ENTITY_TYPE
    }

    fn entity_id(&self) -> AggregateId {
        self.entity.id()
    }

    async fn attempt(&mut self) -> Result<(), StoreError> {
        self.store.delete(&*self.entity).await
    }

    async fn refresh(&mut self) -> Result<(), DomainError> {
        adopt_latest(self.store, &mut *self.entity).await
    }
}

/// Whether a batch op updates or deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Update,
    Delete,
}

/// Version-checked update or delete of a batch. A conflict on any entity
/// refreshes the whole batch.
pub struct BatchOp<'a, A: Storable> {
    store: &'a dyn EntityStore<A>,
    entities: &'a mut [A],
    kind: BatchKind,
}

impl<'a, A: Storable> BatchOp<'a, A> {
    pub fn new(store: &'a dyn EntityStore<A>, entities: &'a mut [A], kind: BatchKind) -> Self {
        Self {
            store,
            entities,
            kind,
        }
    }
}

#[async_trait]
impl<A: Storable> Retryable for BatchOp<'_, A> {
    type Output = ();

    fn entity_type(&self) -> &'static str {
        A::ENTITY_TYPE
    }

    fn entity_id(&self) -> AggregateId {
        self.entities
            .first()
            .map(Storable::id)
            .unwrap_or_else(AggregateId::nil)
    }

    async fn attempt(&mut self) -> Result<(), StoreError> {
        match self.kind {
            BatchKind::Update => self.store.update_range(&mut *self.entities).await,
            BatchKind::Delete => self.store.delete_range(&*self.entities).await,
        }
    }

    async fn refresh(&mut self) -> Result<(), DomainError> {
        for entity in self.entities.iter_mut() {
            adopt_latest(self.store, entity).await?;
        }
        Ok(())
    }
}
