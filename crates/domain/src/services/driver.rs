use std::sync::Arc;
use std::time::Duration;

use common::{AggregateId, SmartEnum};

use crate::cache::{ReadCache, keys};
use crate::commands::RegisterDriver;
use crate::driver::Driver;
use crate::enums::LicenseLevel;
use crate::repository::Repository;
use crate::response::ServiceResponse;
use crate::retry::CancelSignal;

use super::{EntityOps, bad_request};

/// Service for managing drivers.
#[derive(Clone)]
pub struct DriverService {
    ops: EntityOps<Driver>,
}

impl DriverService {
    pub fn new(repo: Repository<Driver>, cache: Arc<dyn ReadCache>) -> Self {
        Self {
            ops: EntityOps::new(repo, cache),
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.ops.set_cache_ttl(ttl);
        self
    }

    /// Aborts in-flight write retries when the signal is raised.
    pub fn with_cancel_signal(mut self, cancel: CancelSignal) -> Self {
        self.ops.set_cancel_signal(cancel);
        self
    }

    /// Registers a new, available driver. The license level must match a
    /// level name exactly.
    #[tracing::instrument(skip(self))]
    pub async fn register(&self, cmd: RegisterDriver) -> ServiceResponse<Driver> {
        let Some(level) = LicenseLevel::from_name(&cmd.license_level, false) else {
            return bad_request::<Driver, _>(
                "register",
                format!("Invalid license level: '{}'.", cmd.license_level),
            );
        };
        let response = self.ops.add(Driver::new(&cmd.name, level)).await;
        self.ops.invalidating(keys::DRIVERS, response).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_by_id(&self, id: AggregateId) -> ServiceResponse<Driver> {
        self.ops.get_by_id(id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_all(&self) -> ServiceResponse<Vec<Driver>> {
        self.ops.get_all().await
    }

    /// Lists drivers through the read cache.
    #[tracing::instrument(skip(self))]
    pub async fn get_all_cached(&self, refresh: bool) -> ServiceResponse<Vec<Driver>> {
        self.ops.get_all_cached(keys::DRIVERS, refresh).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn rename(&self, id: AggregateId, name: &str) -> ServiceResponse<Driver> {
        self.ops.modify("rename", id, |d| d.rename(name)).await
    }

    /// Changes the license level; the level name is matched exactly.
    #[tracing::instrument(skip(self))]
    pub async fn change_license(
        &self,
        id: AggregateId,
        level_name: &str,
    ) -> ServiceResponse<Driver> {
        let Some(level) = LicenseLevel::from_name(level_name, false) else {
            return bad_request::<Driver, _>(
                "change_license",
                format!("Invalid license level: '{level_name}'."),
            );
        };
        self.ops
            .modify("change_license", id, |d| {
                d.change_license(level);
                Ok(())
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: AggregateId) -> ServiceResponse<()> {
        let response = self.ops.delete(id).await;
        self.ops.invalidating(keys::DRIVERS, response).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_range(&self, ids: &[AggregateId]) -> ServiceResponse<()> {
        let response = self.ops.delete_range(ids).await;
        self.ops.invalidating(keys::DRIVERS, response).await
    }
}
