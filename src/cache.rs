//! Append-only memoization cache for expensive model calls.
//!
//! Entries live in the store under `(namespace, scope, strategy, digest(key))`
//! and are never updated. A `DashMap` in front of the store avoids repeated
//! SQLite reads for hot keys; it is only filled from values the store holds.

use crate::config::DASHMAP_SHARD_COUNT;
use crate::error::{Error, Result};
use crate::metrics::MetricsCollector;
use crate::store::Store;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    Enrichment,
    Topics,
}

impl CacheNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheNamespace::Enrichment => "enrichment",
            CacheNamespace::Topics => "topics",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub scope: String,
    pub strategy: String,
    pub key: String,
}

impl CacheKey {
    pub fn new(scope: impl ToString, strategy: impl Into<String>, key: impl Into<String>) -> Self {
        Self { scope: scope.to_string(), strategy: strategy.into(), key: key.into() }
    }

    /// SHA-256 of the key text, so long signatures index cheaply.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.key.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.scope, self.strategy, self.key)
    }
}

pub struct MemoCache<V> {
    store: Arc<Store>,
    namespace: CacheNamespace,
    front: DashMap<CacheKey, V>,
    metrics: Arc<MetricsCollector>,
}

impl<V> MemoCache<V>
where
    V: Serialize + DeserializeOwned + Clone,
{
    pub fn new(store: Arc<Store>, namespace: CacheNamespace, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            store,
            namespace,
            front: DashMap::with_shard_amount(DASHMAP_SHARD_COUNT),
            metrics,
        }
    }

    pub fn namespace(&self) -> CacheNamespace {
        self.namespace
    }

    pub fn lookup(&self, key: &CacheKey) -> Result<Option<V>> {
        if let Some(hit) = self.front.get(key) {
            return Ok(Some(hit.value().clone()));
        }

        let Some(raw) = self.store.cache_lookup(self.namespace, key)? else {
            return Ok(None);
        };
        let value: V = serde_json::from_str(&raw)?;
        self.front.insert(key.clone(), value.clone());
        Ok(Some(value))
    }

    /// Write once. Storing an existing key is `Error::Conflict`.
    pub fn store(&self, key: &CacheKey, value: &V) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.store.cache_insert(self.namespace, key, &raw)?;
        self.front.insert(key.clone(), value.clone());
        Ok(())
    }

    /// Return the cached value, or run `compute` once and persist its output.
    /// If another writer stores the key first, its value wins.
    pub async fn get_or_compute<F, Fut>(&self, key: &CacheKey, compute: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(value) = self.lookup(key)? {
            self.metrics.record_cache_hit();
            debug!("{} cache hit {}", self.namespace.as_str(), key);
            return Ok(value);
        }

        self.metrics.record_cache_miss();
        let computed = compute().await?;

        match self.store(key, &computed) {
            Ok(()) => Ok(computed),
            Err(Error::Conflict { .. }) => {
                warn!("{} cache entry {} written concurrently, using stored value", self.namespace.as_str(), key);
                self.lookup(key)?
                    .ok_or_else(|| Error::Invariant(format!("cache entry {} missing after conflict", key)))
            }
            Err(e) => Err(e),
        }
    }
}
