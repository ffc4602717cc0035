use std::sync::Arc;

use crate::binding::{BindOptions, Binding, Fetcher};
use crate::bus::InvalidationBus;
use crate::store::CacheStore;
use crate::utils::now_ms;

/// High-level cache API tying the store and the invalidation bus together.
///
/// One `Cache` is constructed at process start and handed to every consumer;
/// it is cheap to clone (both halves are shared behind `Arc`). Tests build
/// isolated instances instead of sharing process globals.
pub struct Cache<V>
where
    V: Clone + Send + Sync,
{
    store: Arc<CacheStore<V>>,
    bus: Arc<InvalidationBus>,
}

impl<V> Clone for Cache<V>
where
    V: Clone + Send + Sync,
{
    fn clone(&self) -> Self {
        Cache {
            store: Arc::clone(&self.store),
            bus: Arc::clone(&self.bus),
        }
    }
}

impl<V> Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Cache {
            store: Arc::new(CacheStore::new()),
            bus: Arc::new(InvalidationBus::new()),
        }
    }

    /// Create a binding registered on this cache's invalidation bus.
    ///
    /// The binding watches nothing until [`Binding::bind`] is called.
    pub fn bind(&self) -> Binding<V> {
        Binding::new(Arc::clone(&self.store), Arc::clone(&self.bus))
    }

    /// Mark every entry carrying one of `tags` as stale, then notify all
    /// live bindings so the ones watching an affected tag refetch in the
    /// background.
    ///
    /// Every listener subscribed at the time of the call observes it before
    /// this returns; the refetches themselves run on background tasks.
    pub async fn invalidate(&self, tags: &[&str]) {
        let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        self.store.mark_stale(&tags).await;
        self.bus.publish(&tags);
    }

    /// Drop every cached entry (session teardown). Live bindings keep their
    /// visible state until they next rebind or refetch.
    pub async fn clear(&self) {
        self.store.clear().await;
    }

    /// Warm the store for `key` without creating a binding.
    ///
    /// Fire-and-forget: a fresh entry makes this a no-op, a fetch failure is
    /// dropped since no consumer exists to report it to.
    pub fn prefetch(&self, key: &str, fetch: Fetcher<V>, opts: BindOptions) {
        let store = Arc::clone(&self.store);
        let key = key.to_string();

        tokio::spawn(async move {
            if let Some(entry) = store.get(&key).await {
                if entry.is_fresh(now_ms()) {
                    return;
                }
            }

            let stamp = store.next_stamp();
            match fetch().await {
                Ok(value) => {
                    store.put(&key, value, &opts.tags, opts.ttl_ms, stamp).await;
                }
                Err(err) => {
                    tracing::debug!("Prefetch failed: key={}, error={}", key, err);
                }
            }
        });
    }

    /// Direct access to the underlying store, mainly for inspection.
    pub fn store(&self) -> &CacheStore<V> {
        &self.store
    }

    /// Direct access to the invalidation bus.
    pub fn bus(&self) -> &InvalidationBus {
        &self.bus
    }
}

impl<V> Default for Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
