// src/count_cache.rs
//
// Run-scoped cache of remote row counts
//
// Count queries are expensive on the remote side and every random draw needs
// one, so each (record type, filter) key is counted at most once per run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

use crate::error::{Result, SamplerError};
use crate::query::CountKey;
use crate::remote::RemoteClient;

/// Memoized remote row counts keyed by [`CountKey`].
///
/// Entries never expire and are never invalidated: the remote dataset is
/// assumed immutable for the duration of a generation run. A count of zero
/// is cached like any other value. Failed count queries are not cached.
///
/// ```no_run
/// # use remote_sampler::count_cache::CountCache;
/// # use remote_sampler::query::CountKey;
/// # use remote_sampler::remote::RemoteClient;
/// # async fn example(client: &dyn RemoteClient) -> remote_sampler::Result<()> {
/// let cache = CountCache::new();
/// let key = CountKey::new("Account", None);
/// let n = cache.get_count(client, &key).await?;   // remote count query
/// let again = cache.get_count(client, &key).await?; // served from cache
/// assert_eq!(n, again);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct CountCache {
    entries: Mutex<HashMap<CountKey, Arc<OnceCell<u64>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CountCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached count for `key`, issuing `SELECT count() ...` on first request.
    pub async fn get_count(&self, client: &dyn RemoteClient, key: &CountKey) -> Result<u64> {
        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.entry(key.clone()).or_default().clone()
        };

        if let Some(n) = cell.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("Count cache HIT: {} = {}", key, n);
            return Ok(*n);
        }

        let n = cell
            .get_or_try_init(|| async {
                self.misses.fetch_add(1, Ordering::Relaxed);
                let query = key.count_query();
                tracing::debug!("Count cache MISS: {}, querying remote", key);
                let result = client
                    .query(&query)
                    .await
                    .map_err(|e| SamplerError::remote(query.clone(), e))?;
                tracing::debug!("Remote count for {} = {}", key, result.total_size);
                Ok::<_, SamplerError>(result.total_size)
            })
            .await?;
        Ok(*n)
    }

    /// Cached value without touching the remote service.
    pub fn peek(&self, key: &CountKey) -> Option<u64> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).and_then(|c| c.get().copied())
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        CacheStats {
            entries: entries.values().filter(|c| c.initialized()).count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Statistics about cache use during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Keys holding a computed count
    pub entries: usize,
    pub hits: u64,
    /// Each miss is one remote count query
    pub misses: u64,
}
