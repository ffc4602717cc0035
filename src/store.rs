use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::entry::CacheEntry;
use crate::utils::now_ms;

/// In-memory store mapping cache keys to entries.
///
/// Pure bookkeeping with no policy: freshness decisions and fetch
/// orchestration live in [`crate::binding::Binding`]. The store is unbounded
/// for the process lifetime; `clear` exists for session teardown.
pub struct CacheStore<V>
where
    V: Clone + Send + Sync,
{
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    stamp: AtomicU64,
}

impl<V> CacheStore<V>
where
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        CacheStore {
            entries: RwLock::new(HashMap::new()),
            stamp: AtomicU64::new(0),
        }
    }

    /// Issue the next write stamp.
    ///
    /// Fetches take their stamp when they start, not when they resolve,
    /// which lets `put` order racing writers by start time.
    pub fn next_stamp(&self) -> u64 {
        self.stamp.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Return a clone of the entry for `key`, if present.
    pub async fn get(&self, key: &str) -> Option<CacheEntry<V>> {
        self.entries.read().await.get(key).cloned()
    }

    /// Replace the entry for `key` wholesale with fresh data.
    ///
    /// Returns false without touching the store when the current entry
    /// carries a newer stamp than the write: a fetch that started earlier
    /// than the last writer must not clobber its result.
    pub async fn put(
        &self,
        key: &str,
        data: V,
        tags: &[String],
        ttl_ms: i64,
        stamp: u64,
    ) -> bool {
        let mut entries = self.entries.write().await;

        if let Some(existing) = entries.get(key) {
            if existing.stamp > stamp {
                tracing::debug!("Discarding store write with superseded stamp: key={}", key);
                return false;
            }
        }

        entries.insert(
            key.to_string(),
            CacheEntry {
                data,
                fetched_at: now_ms(),
                ttl_ms,
                tags: tags.iter().cloned().collect(),
                stale: false,
                stamp,
            },
        );
        true
    }

    /// Flip `stale` on every entry whose tag set intersects `tags`.
    ///
    /// Data is retained so stale entries stay servable as placeholders.
    /// Returns the subset of requested tags that matched at least one entry.
    pub async fn mark_stale(&self, tags: &[String]) -> Vec<String> {
        let mut entries = self.entries.write().await;
        let mut affected: HashSet<&str> = HashSet::new();

        for entry in entries.values_mut() {
            for tag in tags {
                if entry.tags.contains(tag) {
                    entry.stale = true;
                    affected.insert(tag.as_str());
                }
            }
        }

        tags.iter()
            .filter(|t| affected.contains(t.as_str()))
            .cloned()
            .collect()
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Number of entries currently held.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl<V> Default for CacheStore<V>
where
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}
