//! Resolution cache using moka
//!
//! Resolution is deterministic, so a framework's fingerprint fully
//! determines its [`ResolvedFramework`]. Entries are shared as `Arc`s.

use std::sync::Arc;
use std::time::Duration;

use irf_schema::{Fingerprint, Framework};
use moka::future::Cache;

use crate::error::ResolveError;
use crate::resolved::ResolvedFramework;
use crate::resolver::resolve;

/// Cache of resolved frameworks keyed by framework fingerprint
#[derive(Debug, Clone)]
pub struct ResolutionCache {
    inner: Cache<Fingerprint, Arc<ResolvedFramework>>,
}

impl ResolutionCache {
    /// Create a cache holding at most `max_capacity` frameworks
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
        }
    }

    /// Create a cache whose entries expire after `ttl`
    #[inline]
    #[must_use]
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Resolve through the cache
    ///
    /// Failures are not cached.
    ///
    /// # Errors
    /// Any [`ResolveError`] from resolution
    pub async fn resolve(&self, framework: &Framework) -> Result<Arc<ResolvedFramework>, ResolveError> {
        let key = Fingerprint::of(framework)?;
        if let Some(hit) = self.inner.get(&key).await {
            tracing::trace!(framework = %framework.id, "resolution cache hit");
            return Ok(hit);
        }
        let resolved = Arc::new(resolve(framework)?);
        self.inner.insert(key, Arc::clone(&resolved)).await;
        Ok(resolved)
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.inner.invalidate_all();
    }

    /// Approximate number of entries
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Apply pending maintenance so counts are exact
    pub async fn sync(&self) {
        self.inner.run_pending_tasks().await;
    }
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new(64)
    }
}
