//! Application services.
//!
//! Each public operation returns a [`ServiceResponse`]; expected failures are
//! reported in the envelope rather than as `Err`.

mod driver;
mod route;
mod trip;
mod vehicle;

use std::sync::Arc;
use std::time::Duration;

use common::AggregateId;

use crate::aggregate::Aggregate;
use crate::cache::{self, DEFAULT_TTL, ReadCache};
use crate::error::DomainError;
use crate::repository::Repository;
use crate::response::{ResponseStatus, ServiceResponse};
use crate::retry::CancelSignal;

pub use driver::DriverService;
pub use route::RouteService;
pub use trip::TripService;
pub use vehicle::VehicleService;

/// Operations every service shares: lookups, cached listings, updates of a
/// loaded aggregate and deletes.
pub(crate) struct EntityOps<A: Aggregate> {
    repo: Repository<A>,
    cache: Arc<dyn ReadCache>,
    cache_ttl: Duration,
    cancel: CancelSignal,
}

impl<A: Aggregate> Clone for EntityOps<A> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            cache: Arc::clone(&self.cache),
            cache_ttl: self.cache_ttl,
            cancel: self.cancel.clone(),
        }
    }
}

impl<A: Aggregate> EntityOps<A> {
    pub(crate) fn new(repo: Repository<A>, cache: Arc<dyn ReadCache>) -> Self {
        Self {
            repo,
            cache,
            cache_ttl: DEFAULT_TTL,
            cancel: CancelSignal::never(),
        }
    }

    pub(crate) fn repo(&self) -> &Repository<A> {
        &self.repo
    }

    pub(crate) fn cancel(&self) -> &CancelSignal {
        &self.cancel
    }

    pub(crate) fn set_cache_ttl(&mut self, ttl: Duration) {
        self.cache_ttl = ttl;
    }

    pub(crate) fn set_cancel_signal(&mut self, cancel: CancelSignal) {
        self.cancel = cancel;
    }

    pub(crate) async fn get_by_id(&self, id: AggregateId) -> ServiceResponse<A> {
        respond::<A, _>("get_by_id", self.repo.find_by_id(id).await, ResponseStatus::Success)
    }

    /// Detail lookup through the read cache.
    pub(crate) async fn get_by_id_cached(&self, key: &str, id: AggregateId) -> ServiceResponse<A> {
        let result = cache::cached(self.cache.as_ref(), key, self.cache_ttl, false, || {
            self.repo.find_by_id(id)
        })
        .await;
        respond::<A, _>("get_by_id_cached", result, ResponseStatus::Success)
    }

    pub(crate) async fn get_all(&self) -> ServiceResponse<Vec<A>> {
        respond::<A, _>("get_all", self.repo.get_all().await, ResponseStatus::Success)
    }

    pub(crate) async fn get_all_cached(&self, key: &str, refresh: bool) -> ServiceResponse<Vec<A>> {
        let result = cache::cached(self.cache.as_ref(), key, self.cache_ttl, refresh, || {
            self.repo.get_all()
        })
        .await;
        respond::<A, _>("get_all_cached", result, ResponseStatus::Success)
    }

    /// Persists a newly constructed aggregate.
    pub(crate) async fn add(&self, constructed: Result<A, DomainError>) -> ServiceResponse<A> {
        let result = async {
            let mut entity = constructed?;
            self.repo.add(&mut entity, &self.cancel).await?;
            Ok::<_, DomainError>(entity)
        }
        .await;
        respond::<A, _>("add", result, ResponseStatus::Created)
    }

    /// Loads an aggregate, applies `change` and writes it back. After a
    /// conflict `change` runs again on the reloaded aggregate.
    pub(crate) async fn modify(
        &self,
        operation: &'static str,
        id: AggregateId,
        change: impl Fn(&mut A) -> Result<(), DomainError> + Send,
    ) -> ServiceResponse<A> {
        let result = self.repo.modify(id, change, &self.cancel).await;
        respond::<A, _>(operation, result, ResponseStatus::Success)
    }

    pub(crate) async fn delete(&self, id: AggregateId) -> ServiceResponse<()> {
        let result = async {
            let mut entity = self.repo.find_by_id(id).await?;
            self.repo.delete(&mut entity, &self.cancel).await
        }
        .await;
        respond::<A, _>("delete", result, ResponseStatus::NoContent)
    }

    /// Deletes the aggregates that exist among `ids`. An empty list is a
    /// no-op; a list where none exist is `NotFound`.
    pub(crate) async fn delete_range(&self, ids: &[AggregateId]) -> ServiceResponse<()> {
        if ids.is_empty() {
            return ServiceResponse::no_content();
        }

        let result = async {
            let mut found = self.repo.get_many(ids).await?;
            if found.is_empty() {
                return Err(DomainError::NotFound {
                    aggregate_type: A::ENTITY_TYPE,
                    id: ids[0],
                });
            }
            self.repo.delete_range(&mut found, &self.cancel).await
        }
        .await;
        respond::<A, _>("delete_range", result, ResponseStatus::NoContent)
    }

    /// Drops `key` from the read cache if the response succeeded.
    pub(crate) async fn invalidating<T>(
        &self,
        key: &str,
        response: ServiceResponse<T>,
    ) -> ServiceResponse<T> {
        if response.is_success() {
            self.cache.remove(key).await;
        }
        response
    }
}

/// Wraps a result in an envelope, logging failures at a level that matches
/// their status.
pub(crate) fn respond<A: Aggregate, T>(
    operation: &'static str,
    result: Result<T, DomainError>,
    status: ResponseStatus,
) -> ServiceResponse<T> {
    match result {
        Ok(_) if status == ResponseStatus::NoContent => ServiceResponse::no_content(),
        Ok(data) => ServiceResponse::from_result(Ok(data), status),
        Err(e) => {
            if e.status() == ResponseStatus::InternalServerError {
                tracing::error!(
                    aggregate_type = A::ENTITY_TYPE,
                    operation,
                    error = %e,
                    "service operation failed"
                );
            } else {
                tracing::warn!(
                    aggregate_type = A::ENTITY_TYPE,
                    operation,
                    error = %e,
                    "service operation rejected"
                );
            }
            ServiceResponse::from_error(&e)
        }
    }
}

/// A `BadRequest` envelope for input rejected before reaching an aggregate.
pub(crate) fn bad_request<A: Aggregate, T>(
    operation: &'static str,
    message: impl Into<String>,
) -> ServiceResponse<T> {
    let message = message.into();
    tracing::warn!(
        aggregate_type = A::ENTITY_TYPE,
        operation,
        error = %message,
        "service input rejected"
    );
    ServiceResponse::failure(ResponseStatus::BadRequest, message)
}
