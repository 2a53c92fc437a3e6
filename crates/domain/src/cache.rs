//! Read-through caching for list and detail queries.
//!
//! Cached values may be stale until a subscriber invalidates them.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use common::AggregateId;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::DomainError;

/// How long cached entries live unless a caller says otherwise.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Cache keys shared by the services and the invalidation subscriber.
pub mod keys {
    use super::AggregateId;

    pub const DRIVERS: &str = "drivers:all";
    pub const VEHICLES: &str = "vehicles:all";
    pub const ROUTES: &str = "routes:all";

    pub fn trip(id: AggregateId) -> String {
        format!("trip:{id}")
    }

    pub fn route(id: AggregateId) -> String {
        format!("route:{id}")
    }
}

/// Key/value cache holding JSON documents.
#[async_trait]
pub trait ReadCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;

    async fn set(&self, key: &str, value: Value, ttl: Duration);

    async fn remove(&self, key: &str);
}

/// Returns the cached value for `key`, or runs `fetch` and caches its result.
///
/// `refresh` skips the lookup and always fetches. Entries that no longer
/// deserialize into `T` are treated as misses.
pub async fn cached<T, F, Fut>(
    cache: &dyn ReadCache,
    key: &str,
    ttl: Duration,
    refresh: bool,
    fetch: F,
) -> Result<T, DomainError>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, DomainError>>,
{
    if !refresh {
        if let Some(value) = cache.get(key).await {
            match serde_json::from_value(value) {
                Ok(hit) => {
                    metrics::counter!("cache_hits_total").increment(1);
                    return Ok(hit);
                }
                Err(e) => tracing::warn!(key, error = %e, "discarding unreadable cache entry"),
            }
        }
    }

    metrics::counter!("cache_misses_total").increment(1);
    let fresh = fetch().await?;
    match serde_json::to_value(&fresh) {
        Ok(value) => cache.set(key, value, ttl).await,
        Err(e) => tracing::warn!(key, error = %e, "value not cached"),
    }
    Ok(fresh)
}
