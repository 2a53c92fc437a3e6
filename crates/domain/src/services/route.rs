use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use common::AggregateId;

use crate::cache::{ReadCache, keys};
use crate::commands::CreateRoute;
use crate::error::DomainError;
use crate::repository::Repository;
use crate::response::ServiceResponse;
use crate::retry::CancelSignal;
use crate::route::Route;

use super::{EntityOps, bad_request};

/// Service for managing routes and their checkpoints.
#[derive(Clone)]
pub struct RouteService {
    ops: EntityOps<Route>,
}

impl RouteService {
    pub fn new(repo: Repository<Route>, cache: Arc<dyn ReadCache>) -> Self {
        Self {
            ops: EntityOps::new(repo, cache),
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.ops.set_cache_ttl(ttl);
        self
    }

    pub fn with_cancel_signal(mut self, cancel: CancelSignal) -> Self {
        self.ops.set_cancel_signal(cancel);
        self
    }

    #[tracing::instrument(skip(self))]
    pub async fn create(&self, cmd: CreateRoute) -> ServiceResponse<Route> {
        let Some(duration) = TimeDelta::try_minutes(cmd.estimated_duration_minutes) else {
            return bad_request::<Route, _>("create", "Estimated duration is out of range.");
        };
        let route = Route::new(&cmd.origin, &cmd.destination, duration, &cmd.checkpoints);
        let response = self.ops.add(route).await;
        self.ops.invalidating(keys::ROUTES, response).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_by_id(&self, id: AggregateId) -> ServiceResponse<Route> {
        self.ops.get_by_id(id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_by_id_cached(&self, id: AggregateId) -> ServiceResponse<Route> {
        self.ops.get_by_id_cached(&keys::route(id), id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_all(&self) -> ServiceResponse<Vec<Route>> {
        self.ops.get_all().await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_all_cached(&self, refresh: bool) -> ServiceResponse<Vec<Route>> {
        self.ops.get_all_cached(keys::ROUTES, refresh).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn add_checkpoint(&self, id: AggregateId, name: &str) -> ServiceResponse<Route> {
        self.ops
            .modify("add_checkpoint", id, |r| r.add_checkpoint(name))
            .await
    }

    /// Removes a checkpoint by exact name. Naming a checkpoint the route
    /// does not have is a bad request.
    #[tracing::instrument(skip(self))]
    pub async fn remove_checkpoint(&self, id: AggregateId, name: &str) -> ServiceResponse<Route> {
        self.ops
            .modify("remove_checkpoint", id, |r| {
                if r.remove_checkpoint(name) {
                    Ok(())
                } else {
                    Err(DomainError::Validation(format!(
                        "checkpoint '{}' is not on this route",
                        name.trim()
                    )))
                }
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_estimated_duration(
        &self,
        id: AggregateId,
        duration_minutes: i64,
    ) -> ServiceResponse<Route> {
        let Some(duration) = TimeDelta::try_minutes(duration_minutes) else {
            return bad_request::<Route, _>(
                "update_estimated_duration",
                "Estimated duration is out of range.",
            );
        };
        self.ops
            .modify("update_estimated_duration", id, |r| {
                r.update_estimated_duration(duration)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: AggregateId) -> ServiceResponse<()> {
        let response = self.ops.delete(id).await;
        let response = self.ops.invalidating(&keys::route(id), response).await;
        self.ops.invalidating(keys::ROUTES, response).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_range(&self, ids: &[AggregateId]) -> ServiceResponse<()> {
        let mut response = self.ops.delete_range(ids).await;
        for id in ids {
            response = self.ops.invalidating(&keys::route(*id), response).await;
        }
        self.ops.invalidating(keys::ROUTES, response).await
    }
}
