use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::store::{
    EntityStore, Storable, commit_write, duplicate_id, staged_state, version_conflict,
};
use crate::{AggregateId, Result, StoreError, VersionToken};

#[derive(Debug, Clone)]
struct StoredRow {
    version: VersionToken,
    state: serde_json::Value,
}

/// In-memory entity store for tests and single-process deployments.
///
/// Rows are kept as serialized JSON, so every read hands out a detached copy
/// just like a database would, and in-memory-only fields (such as pending
/// domain events) never survive a round trip.
pub struct InMemoryEntityStore<E> {
    rows: Arc<RwLock<HashMap<AggregateId, StoredRow>>>,
    injected_conflicts: Arc<AtomicUsize>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Storable> InMemoryEntityStore<E> {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
            injected_conflicts: Arc::new(AtomicUsize::new(0)),
            _entity: PhantomData,
        }
    }

    /// Returns the number of stored entities.
    pub async fn entity_count(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Makes the next `count` version-matching updates or deletes fail with a
    /// conflict, as if another writer had committed first.
    pub fn inject_conflicts(&self, count: usize) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    /// Removes every stored entity.
    pub async fn clear(&self) {
        self.rows.write().await.clear();
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn check_token(
        &self,
        rows: &HashMap<AggregateId, StoredRow>,
        entity: &E,
    ) -> Result<VersionToken> {
        let expected = entity.version();
        let actual = rows.get(&entity.id()).map(|row| row.version);
        if actual != Some(expected) || self.take_injected_conflict() {
            return Err(version_conflict::<E>(entity.id(), expected, actual));
        }
        Ok(expected)
    }
}

impl<E: Storable> Default for InMemoryEntityStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for InMemoryEntityStore<E> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
            injected_conflicts: Arc::clone(&self.injected_conflicts),
            _entity: PhantomData,
        }
    }
}

fn staged_row<E: Storable>(
    entity: &E,
    version: VersionToken,
    at: DateTime<Utc>,
) -> Result<StoredRow> {
    Ok(StoredRow {
        version,
        state: staged_state(entity, version, at)?,
    })
}

#[async_trait]
impl<E: Storable> EntityStore<E> for InMemoryEntityStore<E> {
    async fn add(&self, entity: &mut E) -> Result<VersionToken> {
        let mut rows = self.rows.write().await;
        let id = entity.id();
        if let Some(existing) = rows.get(&id) {
            return Err(version_conflict::<E>(id, entity.version(), Some(existing.version)));
        }

        let now = Utc::now();
        let row = staged_row(entity, VersionToken::first(), now)?;
        rows.insert(id, row);
        commit_write(entity, VersionToken::first(), now);
        Ok(VersionToken::first())
    }

    async fn add_range(&self, entities: &mut [E]) -> Result<()> {
        if let Some(id) = duplicate_id(entities) {
            return Err(version_conflict::<E>(id, VersionToken::initial(), None));
        }

        let mut rows = self.rows.write().await;
        if let Some(taken) = entities.iter().find(|e| rows.contains_key(&e.id())) {
            let actual = rows.get(&taken.id()).map(|row| row.version);
            return Err(version_conflict::<E>(taken.id(), taken.version(), actual));
        }

        let now = Utc::now();
        let staged = entities
            .iter()
            .map(|e| staged_row(e, VersionToken::first(), now))
            .collect::<Result<Vec<_>>>()?;
        for (entity, row) in entities.iter_mut().zip(staged) {
            rows.insert(entity.id(), row);
            commit_write(entity, VersionToken::first(), now);
        }
        Ok(())
    }

    async fn get_by_id(&self, id: AggregateId) -> Result<Option<E>> {
        let rows = self.rows.read().await;
        rows.get(&id)
            .map(|row| serde_json::from_value(row.state.clone()).map_err(StoreError::from))
            .transpose()
    }

    async fn get_all(&self) -> Result<Vec<E>> {
        let rows = self.rows.read().await;
        let mut entities = rows
            .values()
            .map(|row| serde_json::from_value::<E>(row.state.clone()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        entities.sort_by_key(|e| e.created_at());
        Ok(entities)
    }

    async fn update(&self, entity: &mut E) -> Result<VersionToken> {
        let mut rows = self.rows.write().await;
        let expected = self.check_token(&rows, entity)?;

        let next = expected.next();
        let now = Utc::now();
        let row = staged_row(entity, next, now)?;
        rows.insert(entity.id(), row);
        commit_write(entity, next, now);
        Ok(next)
    }

    async fn update_range(&self, entities: &mut [E]) -> Result<()> {
        if let Some(id) = duplicate_id(entities) {
            return Err(version_conflict::<E>(id, VersionToken::initial(), None));
        }

        let mut rows = self.rows.write().await;
        for entity in entities.iter() {
            self.check_token(&rows, entity)?;
        }

        let now = Utc::now();
        let staged = entities
            .iter()
            .map(|e| staged_row(e, e.version().next(), now))
            .collect::<Result<Vec<_>>>()?;
        for (entity, row) in entities.iter_mut().zip(staged) {
            let next = row.version;
            rows.insert(entity.id(), row);
            commit_write(entity, next, now);
        }
        Ok(())
    }

    async fn delete(&self, entity: &E) -> Result<()> {
        let mut rows = self.rows.write().await;
        self.check_token(&rows, entity)?;
        rows.remove(&entity.id());
        Ok(())
    }

    async fn delete_range(&self, entities: &[E]) -> Result<()> {
        let mut rows = self.rows.write().await;
        for entity in entities {
            self.check_token(&rows, entity)?;
        }
        for entity in entities {
            rows.remove(&entity.id());
        }
        Ok(())
    }

    async fn current_version(&self, id: AggregateId) -> Result<Option<VersionToken>> {
        Ok(self.rows.read().await.get(&id).map(|row| row.version))
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::EntityStoreExt;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Crate {
        id: AggregateId,
        label: String,
        version: VersionToken,
        created_at: DateTime<Utc>,
        updated_at: Option<DateTime<Utc>>,
        #[serde(skip)]
        scratch: Vec<String>,
    }

    impl Crate {
        fn new(label: &str) -> Self {
            Self {
                id: AggregateId::new(),
                label: label.to_string(),
                version: VersionToken::initial(),
                created_at: Utc::now(),
                updated_at: None,
                scratch: vec!["pending".to_string()],
            }
        }
    }

    impl Storable for Crate {
        const ENTITY_TYPE: &'static str = "Crate";

        fn id(&self) -> AggregateId {
            self.id
        }

        fn version(&self) -> VersionToken {
            self.version
        }

        fn set_version(&mut self, version: VersionToken) {
            self.version = version;
        }

        fn created_at(&self) -> DateTime<Utc> {
            self.created_at
        }

        fn touch(&mut self, at: DateTime<Utc>) {
            self.updated_at = Some(at);
        }
    }

    #[tokio::test]
    async fn add_assigns_first_token_and_stamps_update_time() {
        let store = InMemoryEntityStore::<Crate>::new();
        let mut item = Crate::new("spare parts");

        let token = store.add(&mut item).await.unwrap();

        assert_eq!(token, VersionToken::first());
        assert_eq!(item.version, VersionToken::first());
        assert!(item.updated_at.is_some());
        assert_eq!(store.entity_count().await, 1);
    }

    #[tokio::test]
    async fn read_back_matches_written_state() {
        let store = InMemoryEntityStore::<Crate>::new();
        let mut item = Crate::new("fuel cells");
        store.add(&mut item).await.unwrap();

        let loaded = store.get_by_id(item.id).await.unwrap().unwrap();

        assert_eq!(loaded.label, item.label);
        assert_eq!(loaded.version, item.version);
        assert_eq!(loaded.updated_at, item.updated_at);
        // in-memory only fields do not survive persistence
        assert!(loaded.scratch.is_empty());
    }

    #[tokio::test]
    async fn missing_id_is_none() {
        let store = InMemoryEntityStore::<Crate>::new();
        assert!(store.get_by_id(AggregateId::new()).await.unwrap().is_none());
        assert!(!store.exists(AggregateId::new()).await.unwrap());
    }

    #[tokio::test]
    async fn adding_a_taken_id_conflicts() {
        let store = InMemoryEntityStore::<Crate>::new();
        let mut item = Crate::new("a");
        store.add(&mut item).await.unwrap();

        let mut twin = item.clone();
        twin.version = VersionToken::initial();
        let err = store.add(&mut twin).await.unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(twin.version, VersionToken::initial());
    }

    #[tokio::test]
    async fn update_advances_token() {
        let store = InMemoryEntityStore::<Crate>::new();
        let mut item = Crate::new("a");
        store.add(&mut item).await.unwrap();

        item.label = "b".to_string();
        let token = store.update(&mut item).await.unwrap();

        assert_eq!(token, VersionToken::new(2));
        let loaded = store.get_by_id(item.id).await.unwrap().unwrap();
        assert_eq!(loaded.label, "b");
        assert_eq!(loaded.version, VersionToken::new(2));
    }

    #[tokio::test]
    async fn stale_update_is_rejected_without_partial_write() {
        let store = InMemoryEntityStore::<Crate>::new();
        let mut item = Crate::new("original");
        store.add(&mut item).await.unwrap();

        let mut first = store.get_by_id(item.id).await.unwrap().unwrap();
        let mut second = store.get_by_id(item.id).await.unwrap().unwrap();

        first.label = "first".to_string();
        store.update(&mut first).await.unwrap();

        second.label = "second".to_string();
        let err = store.update(&mut second).await.unwrap_err();

        match err {
            StoreError::Conflict {
                expected, actual, ..
            } => {
                assert_eq!(expected, VersionToken::first());
                assert_eq!(actual, Some(VersionToken::new(2)));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(second.version, VersionToken::first());
        let stored = store.get_by_id(item.id).await.unwrap().unwrap();
        assert_eq!(stored.label, "first");
    }

    #[tokio::test]
    async fn concurrent_updates_from_same_token_let_exactly_one_commit() {
        let store = InMemoryEntityStore::<Crate>::new();
        let mut item = Crate::new("contested");
        store.add(&mut item).await.unwrap();

        let mut handles = Vec::new();
        for label in ["left", "right"] {
            let store = store.clone();
            let mut copy = item.clone();
            handles.push(tokio::spawn(async move {
                copy.label = label.to_string();
                store.update(&mut copy).await
            }));
        }

        let mut successes = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(e) if e.is_conflict() => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(conflicts, 1);
    }

    #[tokio::test]
    async fn update_of_deleted_row_conflicts_with_no_actual_token() {
        let store = InMemoryEntityStore::<Crate>::new();
        let mut item = Crate::new("doomed");
        store.add(&mut item).await.unwrap();
        store.delete(&item).await.unwrap();

        let err = store.update(&mut item).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { actual: None, .. }));
        assert_eq!(store.current_version(item.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_checks_token() {
        let store = InMemoryEntityStore::<Crate>::new();
        let mut item = Crate::new("a");
        store.add(&mut item).await.unwrap();
        let stale = item.clone();
        store.update(&mut item).await.unwrap();

        assert!(store.delete(&stale).await.unwrap_err().is_conflict());
        store.delete(&item).await.unwrap();
        assert_eq!(store.entity_count().await, 0);
    }

    #[tokio::test]
    async fn injected_conflicts_are_consumed_one_per_write() {
        let store = InMemoryEntityStore::<Crate>::new();
        let mut item = Crate::new("a");
        store.add(&mut item).await.unwrap();
        store.inject_conflicts(2);

        assert!(store.update(&mut item).await.unwrap_err().is_conflict());
        assert!(store.update(&mut item).await.unwrap_err().is_conflict());
        assert_eq!(store.update(&mut item).await.unwrap(), VersionToken::new(2));
    }

    #[tokio::test]
    async fn range_update_rejects_whole_batch_on_one_stale_token() {
        let store = InMemoryEntityStore::<Crate>::new();
        let mut batch = vec![Crate::new("a"), Crate::new("b")];
        store.add_range(&mut batch).await.unwrap();

        let mut concurrent = batch[1].clone();
        store.update(&mut concurrent).await.unwrap();

        batch[0].label = "a2".to_string();
        batch[1].label = "b2".to_string();
        assert!(store.update_range(&mut batch).await.unwrap_err().is_conflict());

        let a = store.get_by_id(batch[0].id).await.unwrap().unwrap();
        assert_eq!(a.label, "a");
        assert_eq!(batch[0].version, VersionToken::first());
    }

    #[tokio::test]
    async fn range_add_rejects_duplicate_ids() {
        let store = InMemoryEntityStore::<Crate>::new();
        let item = Crate::new("a");
        let mut batch = vec![item.clone(), item];

        assert!(store.add_range(&mut batch).await.unwrap_err().is_conflict());
        assert_eq!(store.entity_count().await, 0);
    }

    #[tokio::test]
    async fn get_all_and_get_many() {
        let store = InMemoryEntityStore::<Crate>::new();
        let mut batch = vec![Crate::new("a"), Crate::new("b"), Crate::new("c")];
        store.add_range(&mut batch).await.unwrap();

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 3);

        let some = store
            .get_many(&[batch[0].id, AggregateId::new(), batch[2].id])
            .await
            .unwrap();
        assert_eq!(some.len(), 2);

        store.delete_range(&batch).await.unwrap();
        assert!(store.get_all().await.unwrap().is_empty());
    }
}
