use std::collections::HashSet;

/// A cache entry holding a fetched value and its bookkeeping.
///
/// Entries are replaced wholesale on every write; the only field ever
/// flipped in place is `stale` (by tag invalidation).
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The last successfully fetched value.
    pub data: V,

    /// Unix timestamp in milliseconds of the last successful fetch.
    pub fetched_at: i64,

    /// Freshness window in milliseconds, supplied by whoever wrote the entry.
    pub ttl_ms: i64,

    /// Tags grouping this key with others for coarse invalidation.
    pub tags: HashSet<String>,

    /// Forced true by invalidation, forced false on every successful write.
    /// A stale entry stays servable as a placeholder while revalidation runs.
    pub stale: bool,

    /// Monotonic write stamp, assigned when the writing fetch started.
    /// Writes carrying an older stamp than the current entry are rejected,
    /// so of two fetches racing on one key the later-started one wins
    /// regardless of which resolves first.
    pub(crate) stamp: u64,
}

impl<V> CacheEntry<V> {
    /// An entry is fresh iff it has not been invalidated and its
    /// freshness window has not elapsed.
    pub fn is_fresh(&self, now_ms: i64) -> bool {
        !self.stale && now_ms - self.fetched_at < self.ttl_ms
    }
}
