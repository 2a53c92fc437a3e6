use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Row};

use crate::store::{
    EntityStore, Storable, commit_write, duplicate_id, staged_state, version_conflict,
};
use crate::{AggregateId, Result, StoreError, VersionToken};

/// PostgreSQL-backed entity store.
///
/// All aggregate types share the `entities` table, keyed by id and tagged with
/// [`Storable::ENTITY_TYPE`]. Entity state is stored as JSONB next to the
/// version column the concurrency check runs against.
pub struct PostgresEntityStore<E> {
    pool: PgPool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Storable> PostgresEntityStore<E> {
    /// Creates a new PostgreSQL entity store.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("entity store migrations applied");
        Ok(())
    }

    async fn fetch_version(
        conn: &mut PgConnection,
        id: AggregateId,
    ) -> Result<Option<VersionToken>> {
        let version: Option<i64> = sqlx::query_scalar(
            "SELECT version FROM entities WHERE id = $1 AND entity_type = $2",
        )
        .bind(id.as_uuid())
        .bind(E::ENTITY_TYPE)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(version.map(VersionToken::new))
    }

    async fn conflict(conn: &mut PgConnection, entity: &E) -> Result<StoreError> {
        let actual = Self::fetch_version(conn, entity.id()).await?;
        Ok(version_conflict::<E>(entity.id(), entity.version(), actual))
    }

    /// Inserts a new row; returns false when the id is already taken.
    async fn insert_row(conn: &mut PgConnection, entity: &E, at: DateTime<Utc>) -> Result<bool> {
        let state = staged_state(entity, VersionToken::first(), at)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO entities (id, entity_type, version, created_at, updated_at, state)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(entity.id().as_uuid())
        .bind(E::ENTITY_TYPE)
        .bind(VersionToken::first().as_i64())
        .bind(entity.created_at())
        .bind(at)
        .bind(state)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        Ok(inserted == 1)
    }

    /// Conditionally rewrites a row; returns false when the stored version no
    /// longer matches the entity's token.
    async fn update_row(conn: &mut PgConnection, entity: &E, at: DateTime<Utc>) -> Result<bool> {
        let next = entity.version().next();
        let state = staged_state(entity, next, at)?;

        let updated = sqlx::query(
            r#"
            UPDATE entities
            SET version = $1, updated_at = $2, state = $3
            WHERE id = $4 AND entity_type = $5 AND version = $6
            "#,
        )
        .bind(next.as_i64())
        .bind(at)
        .bind(state)
        .bind(entity.id().as_uuid())
        .bind(E::ENTITY_TYPE)
        .bind(entity.version().as_i64())
        .execute(&mut *conn)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }

    async fn delete_row(conn: &mut PgConnection, entity: &E) -> Result<bool> {
        let deleted =
            sqlx::query("DELETE FROM entities WHERE id = $1 AND entity_type = $2 AND version = $3")
                .bind(entity.id().as_uuid())
                .bind(E::ENTITY_TYPE)
                .bind(entity.version().as_i64())
                .execute(&mut *conn)
                .await?
                .rows_affected();

        Ok(deleted == 1)
    }
}

impl<E> Clone for PostgresEntityStore<E> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<E: Storable> EntityStore<E> for PostgresEntityStore<E> {
    async fn add(&self, entity: &mut E) -> Result<VersionToken> {
        let mut conn = self.pool.acquire().await?;
        let now = Utc::now();

        if !Self::insert_row(&mut conn, entity, now).await? {
            return Err(Self::conflict(&mut conn, entity).await?);
        }

        commit_write(entity, VersionToken::first(), now);
        Ok(VersionToken::first())
    }

    async fn add_range(&self, entities: &mut [E]) -> Result<()> {
        if let Some(id) = duplicate_id(entities) {
            return Err(version_conflict::<E>(id, VersionToken::initial(), None));
        }

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        for entity in entities.iter() {
            if !Self::insert_row(&mut tx, entity, now).await? {
                // dropping the transaction rolls back earlier inserts
                return Err(Self::conflict(&mut tx, entity).await?);
            }
        }

        tx.commit().await?;
        for entity in entities.iter_mut() {
            commit_write(entity, VersionToken::first(), now);
        }
        Ok(())
    }

    async fn get_by_id(&self, id: AggregateId) -> Result<Option<E>> {
        let row = sqlx::query("SELECT state FROM entities WHERE id = $1 AND entity_type = $2")
            .bind(id.as_uuid())
            .bind(E::ENTITY_TYPE)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let state: serde_json::Value = row.try_get("state")?;
                Ok(Some(serde_json::from_value(state)?))
            }
            None => Ok(None),
        }
    }

    async fn get_all(&self) -> Result<Vec<E>> {
        let rows = sqlx::query(
            "SELECT state FROM entities WHERE entity_type = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(E::ENTITY_TYPE)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<E> {
                let state: serde_json::Value = row.try_get("state")?;
                Ok(serde_json::from_value(state)?)
            })
            .collect()
    }

    async fn update(&self, entity: &mut E) -> Result<VersionToken> {
        let mut conn = self.pool.acquire().await?;
        let now = Utc::now();

        if !Self::update_row(&mut conn, entity, now).await? {
            return Err(Self::conflict(&mut conn, entity).await?);
        }

        let next = entity.version().next();
        commit_write(entity, next, now);
        Ok(next)
    }

    async fn update_range(&self, entities: &mut [E]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        for entity in entities.iter() {
            if !Self::update_row(&mut tx, entity, now).await? {
                return Err(Self::conflict(&mut tx, entity).await?);
            }
        }

        tx.commit().await?;
        for entity in entities.iter_mut() {
            let next = entity.version().next();
            commit_write(entity, next, now);
        }
        Ok(())
    }

    async fn delete(&self, entity: &E) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        if !Self::delete_row(&mut conn, entity).await? {
            return Err(Self::conflict(&mut conn, entity).await?);
        }
        Ok(())
    }

    async fn delete_range(&self, entities: &[E]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for entity in entities {
            if !Self::delete_row(&mut tx, entity).await? {
                return Err(Self::conflict(&mut tx, entity).await?);
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn current_version(&self, id: AggregateId) -> Result<Option<VersionToken>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_version(&mut conn, id).await
    }
}
