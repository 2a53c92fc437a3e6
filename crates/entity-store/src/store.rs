use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::try_join_all;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{AggregateId, Result, StoreError, VersionToken};

/// Capability every persisted entity must provide.
///
/// The store only needs an id, a version token and the two timestamps; the
/// rest of the entity travels as serialized state.
pub trait Storable: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Name rows of this type are stored under (e.g. "Driver").
    const ENTITY_TYPE: &'static str;

    fn id(&self) -> AggregateId;

    fn version(&self) -> VersionToken;

    /// Called by the store after a successful write, or by a retry to adopt
    /// the latest persisted token.
    fn set_version(&mut self, version: VersionToken);

    fn created_at(&self) -> DateTime<Utc>;

    /// Stamps the last-update timestamp.
    fn touch(&mut self, at: DateTime<Utc>);
}

/// Version-checked CRUD over one entity type.
///
/// Writes take the entity mutably: on success the store writes the new token
/// and update timestamp back onto the caller's instance. On failure the
/// instance is left untouched and nothing is persisted.
#[async_trait]
pub trait EntityStore<E: Storable>: Send + Sync {
    /// Persists a new entity. Fails with a conflict if the id is taken.
    async fn add(&self, entity: &mut E) -> Result<VersionToken>;

    /// Adds several new entities. Either all are stored or none.
    async fn add_range(&self, entities: &mut [E]) -> Result<()>;

    /// Loads an entity by id. Absence is `Ok(None)`, never an error.
    async fn get_by_id(&self, id: AggregateId) -> Result<Option<E>>;

    /// Loads every entity of this type, oldest first.
    async fn get_all(&self) -> Result<Vec<E>>;

    /// Persists changes, expecting the stored token to equal `entity.version()`.
    async fn update(&self, entity: &mut E) -> Result<VersionToken>;

    /// Updates several entities. Each carries its own expected token.
    async fn update_range(&self, entities: &mut [E]) -> Result<()>;

    /// Removes an entity, with the same token check as `update`.
    async fn delete(&self, entity: &E) -> Result<()>;

    async fn delete_range(&self, entities: &[E]) -> Result<()>;

    /// Latest stored token for an id, or `None` when no row exists.
    async fn current_version(&self, id: AggregateId) -> Result<Option<VersionToken>>;
}

/// Convenience lookups built on [`EntityStore`].
#[async_trait]
pub trait EntityStoreExt<E: Storable>: EntityStore<E> {
    /// Checks whether an entity with this id exists.
    async fn exists(&self, id: AggregateId) -> Result<bool> {
        Ok(self.current_version(id).await?.is_some())
    }

    /// Loads several entities concurrently, skipping ids that are absent.
    async fn get_many(&self, ids: &[AggregateId]) -> Result<Vec<E>> {
        let found = try_join_all(ids.iter().map(|id| self.get_by_id(*id))).await?;
        Ok(found.into_iter().flatten().collect())
    }
}

impl<E: Storable, T: EntityStore<E> + ?Sized> EntityStoreExt<E> for T {}

/// Serializes the entity as it will look once a write carrying `version`
/// commits at `at`, leaving the caller's instance untouched.
pub(crate) fn staged_state<E: Storable>(
    entity: &E,
    version: VersionToken,
    at: DateTime<Utc>,
) -> Result<serde_json::Value> {
    let mut staged = entity.clone();
    staged.set_version(version);
    staged.touch(at);
    Ok(serde_json::to_value(&staged)?)
}

/// Writes the committed token and update time back onto the caller's instance.
pub(crate) fn commit_write<E: Storable>(entity: &mut E, version: VersionToken, at: DateTime<Utc>) {
    entity.set_version(version);
    entity.touch(at);
}

/// Builds the error for a write whose token no longer matches the stored
/// row, counting it under `store_conflicts_total`.
pub(crate) fn version_conflict<E: Storable>(
    entity_id: AggregateId,
    expected: VersionToken,
    actual: Option<VersionToken>,
) -> StoreError {
    metrics::counter!("store_conflicts_total", "entity_type" => E::ENTITY_TYPE).increment(1);
    tracing::debug!(
        entity_type = E::ENTITY_TYPE,
        %entity_id,
        %expected,
        actual = ?actual.map(|v| v.as_i64()),
        "version token mismatch"
    );
    StoreError::Conflict {
        entity_type: E::ENTITY_TYPE,
        entity_id,
        expected,
        actual,
    }
}

/// Returns the first id that occurs twice in a batch.
pub(crate) fn duplicate_id<E: Storable>(entities: &[E]) -> Option<AggregateId> {
    let mut seen = std::collections::HashSet::with_capacity(entities.len());
    entities.iter().map(Storable::id).find(|id| !seen.insert(*id))
}
