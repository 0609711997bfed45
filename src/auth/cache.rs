use moka::future::Cache;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::db::Token;
use crate::settings::AuthCacheSettings;

/// Authenticated tokens keyed by their access token content.
///
/// Anything that replaces or deletes a token's content must
/// [`invalidate`](AuthCache::invalidate) the old content once the store
/// change is done. A lookup that was already running when an invalidation
/// happened does not leave its result behind.
#[derive(Clone)]
pub struct AuthCache {
    cache: Cache<String, Token>,
    /// Bumped on every invalidation
    generation: Arc<AtomicU64>,
}

impl AuthCache {
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .time_to_live(ttl)
            .max_capacity(max_capacity)
            .build();
        Self {
            cache,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_settings(settings: &AuthCacheSettings) -> Self {
        Self::new(Duration::from_secs(settings.ttl_secs), settings.max_capacity)
    }

    pub async fn get(&self, content: &str) -> Option<Token> {
        self.cache.get(content).await
    }

    /// Return the cached token or compute and cache it; `None` results are not cached
    pub async fn get_or_compute<Fut>(&self, content: &str, compute: Fut) -> Option<Token>
    where
        Fut: Future<Output = Option<Token>>,
    {
        let generation = self.generation.load(Ordering::Acquire);
        let token = self
            .cache
            .optionally_get_with(content.to_string(), compute)
            .await;

        // The row may have changed while the lookup ran
        if self.generation.load(Ordering::Acquire) != generation {
            self.cache.invalidate(content).await;
        }
        token
    }

    pub async fn invalidate(&self, content: &str) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.cache.invalidate(content).await;
    }
}
