// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Read-through response cache for the facility list endpoints.
//!
//! Values are stored as JSON under a fixed key per list with a fixed TTL.
//! The `postgres` backend shares entries across instances through the
//! `query_cache` table; the `local` backend is an in-process map.
//!
//! Cache failures are never fatal: reads fall through to the store and
//! writes are dropped, with a warning either way.
//!
//! Every key carries a generation that `invalidate` bumps. A read-through
//! load only stores its result if the generation it saw before loading is
//! still current, so a load that raced a mutation never puts the old list
//! back.

use crate::config::CacheBackendKind;
use crate::error::AppError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::types::Json;
use sqlx::PgPool;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cached lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Buildings,
    Amenities,
}

impl CacheKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKey::Buildings => "facility:buildings",
            CacheKey::Amenities => "facility:amenities",
        }
    }
}

struct LocalEntry {
    stored_at: Instant,
    value: serde_json::Value,
}

/// Per-key slot. Kept after invalidation so the generation never resets.
#[derive(Default)]
struct LocalSlot {
    generation: i64,
    entry: Option<LocalEntry>,
}

#[derive(Clone)]
enum Backend {
    Postgres(PgPool),
    Local(Arc<DashMap<CacheKey, LocalSlot>>),
}

/// Response cache handle. Cheap to clone.
#[derive(Clone)]
pub struct ResponseCache {
    backend: Backend,
    ttl: Duration,
}

impl ResponseCache {
    /// In-process cache.
    pub fn local(ttl: Duration) -> Self {
        Self {
            backend: Backend::Local(Arc::new(DashMap::new())),
            ttl,
        }
    }

    /// Cache shared through the `query_cache` table.
    pub fn postgres(pool: PgPool, ttl: Duration) -> Self {
        Self {
            backend: Backend::Postgres(pool),
            ttl,
        }
    }

    /// Pick a backend. Falls back to `local` when `postgres` is requested
    /// without a database.
    pub fn from_kind(kind: CacheBackendKind, pool: Option<&PgPool>, ttl: Duration) -> Self {
        match (kind, pool) {
            (CacheBackendKind::Postgres, Some(pool)) => Self::postgres(pool.clone(), ttl),
            (CacheBackendKind::Postgres, None) => {
                tracing::warn!("Postgres cache requested without a database, using local cache");
                Self::local(ttl)
            }
            (CacheBackendKind::Local, _) => Self::local(ttl),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Postgres(_) => "postgres",
            Backend::Local(_) => "local",
        }
    }

    /// Cached value for `key`, or `None` when absent, expired or unreadable.
    pub async fn get<T: DeserializeOwned>(&self, key: CacheKey) -> Option<T> {
        let (value, _) = self.lookup(key).await;
        value.and_then(|v| decode(key, v))
    }

    /// Live value for `key` together with the key's current generation.
    async fn lookup(&self, key: CacheKey) -> (Option<serde_json::Value>, i64) {
        match &self.backend {
            Backend::Local(slots) => {
                let Some(mut slot) = slots.get_mut(&key) else {
                    return (None, 0);
                };
                if slot
                    .entry
                    .as_ref()
                    .is_some_and(|e| e.stored_at.elapsed() >= self.ttl)
                {
                    slot.entry = None;
                }
                (slot.entry.as_ref().map(|e| e.value.clone()), slot.generation)
            }
            Backend::Postgres(pool) => {
                let result: Result<Option<(Option<Json<serde_json::Value>>, i64)>, sqlx::Error> =
                    sqlx::query_as(
                        "SELECT CASE WHEN expires_at > now() THEN value END, generation \
                         FROM query_cache WHERE key = $1",
                    )
                    .bind(key.as_str())
                    .fetch_optional(pool)
                    .await;

                match result {
                    Ok(Some((value, generation))) => (value.map(|v| v.0), generation),
                    Ok(None) => (None, 0),
                    Err(e) => {
                        tracing::warn!(key = key.as_str(), error = %e, "Cache read failed");
                        (None, 0)
                    }
                }
            }
        }
    }

    /// Store `value` under `key` for one TTL.
    pub async fn put<T: Serialize>(&self, key: CacheKey, value: &T) {
        self.store(key, value, None).await;
    }

    /// Store `value`, but only when `generation` is still the key's
    /// current generation (`Some`), or unconditionally (`None`).
    async fn store<T: Serialize>(&self, key: CacheKey, value: &T, generation: Option<i64>) {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key = key.as_str(), error = %e, "Cache encode failed");
                return;
            }
        };

        let stored = match &self.backend {
            Backend::Local(slots) => {
                let entry = LocalEntry {
                    stored_at: Instant::now(),
                    value,
                };
                match slots.entry(key) {
                    Entry::Occupied(mut slot) => {
                        let current = generation.is_none_or(|g| g == slot.get().generation);
                        if current {
                            slot.get_mut().entry = Some(entry);
                        }
                        current
                    }
                    Entry::Vacant(slot) => {
                        let current = generation.is_none_or(|g| g == 0);
                        if current {
                            slot.insert(LocalSlot {
                                generation: 0,
                                entry: Some(entry),
                            });
                        }
                        current
                    }
                }
            }
            Backend::Postgres(pool) => {
                let result = sqlx::query(
                    "INSERT INTO query_cache (key, value, expires_at, generation) \
                     VALUES ($1, $2, now() + make_interval(secs => $3), COALESCE($4::bigint, 0)) \
                     ON CONFLICT (key) DO UPDATE \
                     SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at \
                     WHERE $4::bigint IS NULL OR query_cache.generation = $4::bigint",
                )
                .bind(key.as_str())
                .bind(Json(value))
                .bind(self.ttl.as_secs_f64())
                .bind(generation)
                .execute(pool)
                .await;

                match result {
                    Ok(done) => done.rows_affected() > 0,
                    Err(e) => {
                        tracing::warn!(key = key.as_str(), error = %e, "Cache write failed");
                        return;
                    }
                }
            }
        };

        if !stored {
            tracing::debug!(key = key.as_str(), "Cache write skipped, key invalidated during load");
        }
    }

    /// Drop the given keys and bump their generations.
    pub async fn invalidate(&self, keys: &[CacheKey]) {
        match &self.backend {
            Backend::Local(slots) => {
                for key in keys {
                    let mut slot = slots.entry(*key).or_default();
                    slot.generation += 1;
                    slot.entry = None;
                }
            }
            Backend::Postgres(pool) => {
                let names: Vec<String> = keys.iter().map(|k| k.as_str().to_string()).collect();
                let result = sqlx::query(
                    "INSERT INTO query_cache (key, value, expires_at, generation) \
                     SELECT name, NULL::jsonb, now(), 1 FROM UNNEST($1::text[]) AS name \
                     ON CONFLICT (key) DO UPDATE \
                     SET value = NULL, generation = query_cache.generation + 1",
                )
                .bind(&names)
                .execute(pool)
                .await;

                if let Err(e) = result {
                    tracing::warn!(error = %e, "Cache invalidation failed");
                }
            }
        }
        tracing::debug!(keys = ?keys, "Cache invalidated");
    }

    /// Return the cached value for `key`, or load it, cache it and return it.
    pub async fn get_or_load<T, F, Fut>(&self, key: CacheKey, load: F) -> Result<T, AppError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let (cached, generation) = self.lookup(key).await;
        if let Some(hit) = cached.and_then(|v| decode(key, v)) {
            tracing::debug!(key = key.as_str(), "Cache hit");
            return Ok(hit);
        }

        let value = load().await?;
        self.store(key, &value, Some(generation)).await;
        Ok(value)
    }
}

fn decode<T: DeserializeOwned>(key: CacheKey, value: serde_json::Value) -> Option<T> {
    serde_json::from_value(value)
        .map_err(|e| tracing::warn!(key = key.as_str(), error = %e, "Cache decode failed"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_round_trip_and_invalidate() {
        let cache = ResponseCache::local(Duration::from_secs(60));
        assert!(cache.get::<Vec<i64>>(CacheKey::Buildings).await.is_none());

        cache.put(CacheKey::Buildings, &vec![1i64, 2, 3]).await;
        assert_eq!(
            cache.get::<Vec<i64>>(CacheKey::Buildings).await,
            Some(vec![1, 2, 3])
        );
        assert!(cache.get::<Vec<i64>>(CacheKey::Amenities).await.is_none());

        cache.invalidate(&[CacheKey::Buildings]).await;
        assert!(cache.get::<Vec<i64>>(CacheKey::Buildings).await.is_none());
    }

    #[tokio::test]
    async fn test_local_entries_expire() {
        let cache = ResponseCache::local(Duration::ZERO);
        cache.put(CacheKey::Amenities, &"stale").await;
        assert!(cache.get::<String>(CacheKey::Amenities).await.is_none());
    }

    #[tokio::test]
    async fn test_get_or_load_loads_once() {
        let cache = ResponseCache::local(Duration::from_secs(60));
        let first: Vec<i64> = cache
            .get_or_load(CacheKey::Amenities, || async { Ok(vec![7]) })
            .await
            .unwrap();
        let second: Vec<i64> = cache
            .get_or_load(CacheKey::Amenities, || async {
                Err(AppError::Internal(anyhow::anyhow!("loader should not run")))
            })
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_load_racing_invalidation_is_not_cached() {
        let cache = ResponseCache::local(Duration::from_secs(60));
        let loaded: Vec<i64> = cache
            .get_or_load(CacheKey::Amenities, || async {
                // A mutation lands after the store read.
                cache.invalidate(&[CacheKey::Amenities]).await;
                Ok(vec![1])
            })
            .await
            .unwrap();
        assert_eq!(loaded, vec![1]);
        assert!(cache.get::<Vec<i64>>(CacheKey::Amenities).await.is_none());

        let fresh: Vec<i64> = cache
            .get_or_load(CacheKey::Amenities, || async { Ok(vec![2]) })
            .await
            .unwrap();
        assert_eq!(fresh, vec![2]);
        assert_eq!(
            cache.get::<Vec<i64>>(CacheKey::Amenities).await,
            Some(vec![2])
        );
    }

    #[tokio::test]
    async fn test_wrong_shape_is_a_miss() {
        let cache = ResponseCache::local(Duration::from_secs(60));
        cache.put(CacheKey::Buildings, &"not a list").await;
        assert!(cache.get::<Vec<i64>>(CacheKey::Buildings).await.is_none());
    }
}
