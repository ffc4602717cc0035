use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::{Arc, Mutex};

use crate::bus::{InvalidationBus, ListenerId};
use crate::error::{BoxError, CacheError};
use crate::store::CacheStore;
use crate::utils::now_ms;

/// Zero-argument async loader supplied by the consumer, called whenever the
/// binding needs the authoritative value for its key.
pub type Fetcher<V> = Arc<dyn Fn() -> BoxFuture<'static, Result<V, BoxError>> + Send + Sync>;

/// Wrap an async closure into a [`Fetcher`].
///
/// # Example
/// ```ignore
/// let fetch = fetcher(|| async { Ok(api.list_tickets().await?) });
/// ```
pub fn fetcher<V, F, Fut>(f: F) -> Fetcher<V>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, BoxError>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Per-key caching parameters supplied at bind time.
#[derive(Debug, Clone)]
pub struct BindOptions {
    /// Tags grouping this key with others for coarse invalidation.
    pub tags: Vec<String>,
    /// Time in milliseconds before the entry written by this binding
    /// becomes stale.
    pub ttl_ms: i64,
}

/// Consumer-visible state of a binding at one point in time.
#[derive(Debug, Clone)]
pub struct Snapshot<V> {
    /// Last known value for the bound key, possibly stale.
    pub data: Option<V>,
    /// Failure of the most recent fetch, cleared by the next success,
    /// optimistic mutate, or rebind.
    pub error: Option<CacheError>,
    /// True while a fetch is outstanding and no cached data exists yet.
    pub loading: bool,
    /// True while cached data is being refreshed in the background.
    pub is_revalidating: bool,
}

struct BindingState<V> {
    key: Option<String>,
    fetcher: Option<Fetcher<V>>,
    tags: Vec<String>,
    ttl_ms: i64,
    data: Option<V>,
    error: Option<CacheError>,
    loading: bool,
    is_revalidating: bool,
    /// Monotonic request counter: bumped on every rebind and every fetch
    /// start. A resolving fetch compares its captured value against the
    /// current one and discards itself on mismatch, so a superseded
    /// attempt can never overwrite newer state.
    attempt: u64,
}

struct BindingInner<V>
where
    V: Clone + Send + Sync,
{
    store: Arc<CacheStore<V>>,
    bus: Arc<InvalidationBus>,
    state: Mutex<BindingState<V>>,
}

/// A consumer's live subscription to one cache key at a time.
///
/// The binding owns fetch orchestration for its key: it serves cached data
/// immediately, refreshes stale data in the background, re-fetches when one
/// of its tags is invalidated, and guards against superseded fetch results
/// landing after the consumer has moved on to another key.
///
/// Fetch failures never reach the consumer as errors; they surface only
/// through [`Snapshot::error`] while previously cached data stays visible.
pub struct Binding<V>
where
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<BindingInner<V>>,
    listener_id: ListenerId,
}

enum FetchPlan {
    None,
    Foreground,
    Background,
}

impl<V> Binding<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(store: Arc<CacheStore<V>>, bus: Arc<InvalidationBus>) -> Self {
        let inner = Arc::new(BindingInner {
            store,
            bus: Arc::clone(&bus),
            state: Mutex::new(BindingState {
                key: None,
                fetcher: None,
                tags: Vec::new(),
                ttl_ms: 0,
                data: None,
                error: None,
                loading: false,
                is_revalidating: false,
                attempt: 0,
            }),
        });

        // One bus listener per binding lifetime, removed again on Drop.
        // The listener holds a weak reference so it cannot keep a dropped
        // binding's state alive.
        let weak = Arc::downgrade(&inner);
        let listener_id = bus.subscribe(Arc::new(move |published| {
            if let Some(inner) = weak.upgrade() {
                BindingInner::on_invalidate(&inner, published);
            }
        }));

        Binding { inner, listener_id }
    }

    /// Bind to `key`, adopting whatever the store holds for it and starting
    /// a fetch if the entry is missing or not fresh.
    ///
    /// Binding to the already-bound key is a no-op: the fetch decision was
    /// made when the key was first bound, so repeated calls trigger at most
    /// one fetch. Binding to a new key supersedes any fetch still in flight
    /// for the old one.
    pub async fn bind(&self, key: &str, fetch: Fetcher<V>, opts: BindOptions) {
        {
            let state = self.inner.state.lock().unwrap();
            if state.key.as_deref() == Some(key) {
                return;
            }
        }

        let entry = self.inner.store.get(key).await;

        let plan = {
            let mut state = self.inner.state.lock().unwrap();
            if state.key.as_deref() == Some(key) {
                return;
            }
            state.attempt += 1;
            state.key = Some(key.to_string());
            state.fetcher = Some(fetch);
            state.tags = opts.tags;
            state.ttl_ms = opts.ttl_ms;
            state.error = None;
            state.is_revalidating = false;

            match entry {
                Some(entry) => {
                    // Stale data is still served as a placeholder while the
                    // refresh runs.
                    let fresh = entry.is_fresh(now_ms());
                    state.data = Some(entry.data);
                    state.loading = false;
                    if fresh {
                        FetchPlan::None
                    } else {
                        FetchPlan::Background
                    }
                }
                None => {
                    state.data = None;
                    state.loading = true;
                    FetchPlan::Foreground
                }
            }
        };

        match plan {
            FetchPlan::None => {}
            FetchPlan::Foreground => BindingInner::spawn_fetch(&self.inner, false),
            FetchPlan::Background => BindingInner::spawn_fetch(&self.inner, true),
        }
    }

    /// Stop watching the current key and clear visible state.
    ///
    /// Any fetch still in flight becomes inert; the underlying operation is
    /// not aborted, its result is simply discarded on arrival.
    pub fn unbind(&self) {
        let mut state = self.inner.state.lock().unwrap();
        if state.key.is_none() {
            return;
        }
        state.attempt += 1;
        state.key = None;
        state.fetcher = None;
        state.tags = Vec::new();
        state.data = None;
        state.error = None;
        state.loading = false;
        state.is_revalidating = false;
    }

    /// Force a background refresh of the bound key regardless of freshness.
    pub fn revalidate(&self) {
        BindingInner::spawn_fetch(&self.inner, true);
    }

    /// Optimistically replace the visible value and the store entry with
    /// `value`, without calling the fetcher.
    ///
    /// A later background refresh may overwrite this with the authoritative
    /// value; that risk is the caller's.
    pub async fn mutate(&self, value: V) {
        self.apply_local(move |_| value).await;
    }

    /// Optimistic update computed from the previous visible value.
    pub async fn mutate_with<F>(&self, update: F)
    where
        F: FnOnce(Option<&V>) -> V,
    {
        self.apply_local(update).await;
    }

    async fn apply_local<F>(&self, update: F)
    where
        F: FnOnce(Option<&V>) -> V,
    {
        let (key, value, tags, ttl_ms) = {
            let mut state = self.inner.state.lock().unwrap();
            let Some(key) = state.key.clone() else {
                return;
            };
            let value = update(state.data.as_ref());
            state.data = Some(value.clone());
            state.error = None;
            (key, value, state.tags.clone(), state.ttl_ms)
        };

        // The local value is the newest information we have, so it gets a
        // stamp taken at write time.
        let stamp = self.inner.store.next_stamp();
        self.inner.store.put(&key, value, &tags, ttl_ms, stamp).await;
    }

    /// Current consumer-visible state.
    pub fn snapshot(&self) -> Snapshot<V> {
        let state = self.inner.state.lock().unwrap();
        Snapshot {
            data: state.data.clone(),
            error: state.error.clone(),
            loading: state.loading,
            is_revalidating: state.is_revalidating,
        }
    }

    /// The currently bound key, if any.
    pub fn key(&self) -> Option<String> {
        self.inner.state.lock().unwrap().key.clone()
    }
}

impl<V> Drop for Binding<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.inner.bus.unsubscribe(self.listener_id);
    }
}

impl<V> BindingInner<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn on_invalidate(inner: &Arc<Self>, published: &[String]) {
        let interested = {
            let state = inner.state.lock().unwrap();
            state.key.is_some()
                && state
                    .tags
                    .iter()
                    .any(|tag| published.iter().any(|p| p == tag))
        };
        if interested {
            Self::spawn_fetch(inner, true);
        }
    }

    fn spawn_fetch(inner: &Arc<Self>, background: bool) {
        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            Self::run_fetch(inner, background).await;
        });
    }

    /// One fetch attempt. The attempt counter captured at the start is
    /// re-checked under the lock before any visible state changes, so a
    /// superseded attempt resolves into nothing.
    async fn run_fetch(inner: Arc<Self>, background: bool) {
        let (my_attempt, key, fetch, tags, ttl_ms) = {
            let mut state = inner.state.lock().unwrap();
            let (Some(key), Some(fetch)) = (state.key.clone(), state.fetcher.clone()) else {
                return;
            };
            state.attempt += 1;
            if background {
                state.is_revalidating = true;
            } else {
                state.loading = true;
            }
            (state.attempt, key, fetch, state.tags.clone(), state.ttl_ms)
        };

        // Stamp taken at fetch start: if another fetch for this key starts
        // later but resolves earlier, our store write loses to it.
        let stamp = inner.store.next_stamp();

        let result = fetch().await;

        {
            let state = inner.state.lock().unwrap();
            if state.attempt != my_attempt {
                tracing::debug!("Discarding superseded fetch result: key={}", key);
                return;
            }
        }

        match result {
            Ok(value) => {
                inner
                    .store
                    .put(&key, value.clone(), &tags, ttl_ms, stamp)
                    .await;
                let mut state = inner.state.lock().unwrap();
                if state.attempt != my_attempt {
                    return;
                }
                state.data = Some(value);
                state.error = None;
                state.loading = false;
                state.is_revalidating = false;
            }
            Err(err) => {
                // Previously cached data stays visible; only the error
                // surfaces.
                let mut state = inner.state.lock().unwrap();
                if state.attempt != my_attempt {
                    return;
                }
                state.error = Some(CacheError::fetch(&key, &err));
                state.loading = false;
                state.is_revalidating = false;
            }
        }
    }
}
