use std::sync::Arc;
use std::time::Duration;

use common::{AggregateId, SmartEnum};

use crate::cache::{ReadCache, keys};
use crate::commands::RegisterVehicle;
use crate::enums::VehicleModel;
use crate::repository::Repository;
use crate::response::ServiceResponse;
use crate::retry::CancelSignal;
use crate::vehicle::Vehicle;

use super::{EntityOps, bad_request};

/// Service for managing vehicles.
#[derive(Clone)]
pub struct VehicleService {
    ops: EntityOps<Vehicle>,
}

impl VehicleService {
    pub fn new(repo: Repository<Vehicle>, cache: Arc<dyn ReadCache>) -> Self {
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

    /// Registers a functional, available vehicle. The model name is matched
    /// case-insensitively.
    #[tracing::instrument(skip(self))]
    pub async fn register(&self, cmd: RegisterVehicle) -> ServiceResponse<Vehicle> {
        let Some(model) = VehicleModel::from_name(&cmd.model, true) else {
            return bad_request::<Vehicle, _>(
                "register",
                format!("Invalid vehicle model: '{}'.", cmd.model),
            );
        };
        let response = self.ops.add(Vehicle::new(model, cmd.cargo_capacity)).await;
        self.ops.invalidating(keys::VEHICLES, response).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_by_id(&self, id: AggregateId) -> ServiceResponse<Vehicle> {
        self.ops.get_by_id(id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_all(&self) -> ServiceResponse<Vec<Vehicle>> {
        self.ops.get_all().await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_all_cached(&self, refresh: bool) -> ServiceResponse<Vec<Vehicle>> {
        self.ops.get_all_cached(keys::VEHICLES, refresh).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn mark_damaged(&self, id: AggregateId) -> ServiceResponse<Vehicle> {
        self.ops
            .modify("mark_damaged", id, |v| {
                v.mark_damaged();
                Ok(())
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn repair(&self, id: AggregateId) -> ServiceResponse<Vehicle> {
        self.ops.modify("repair", id, Vehicle::repair).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: AggregateId) -> ServiceResponse<()> {
        let response = self.ops.delete(id).await;
        self.ops.invalidating(keys::VEHICLES, response).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_range(&self, ids: &[AggregateId]) -> ServiceResponse<()> {
        let response = self.ops.delete_range(ids).await;
        self.ops.invalidating(keys::VEHICLES, response).await
    }
}
