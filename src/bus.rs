use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Listener callback invoked with the published tag list.
pub type Listener = Arc<dyn Fn(&[String]) + Send + Sync>;

/// Identifier handed out by [`InvalidationBus::subscribe`], used to remove
/// the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

/// Broadcast registry decoupling "who changed the data" from "who must
/// refresh".
///
/// Mutation call sites publish the tags they touched; every live binding
/// watching an affected tag hears about it without the store or the mutator
/// knowing about consumers.
pub struct InvalidationBus {
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
}

impl InvalidationBus {
    pub fn new() -> Self {
        InvalidationBus {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a listener; it stays subscribed until `unsubscribe` is
    /// called with the returned id.
    pub fn subscribe(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.lock().unwrap().push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) {
        self.listeners
            .lock()
            .unwrap()
            .retain(|(lid, _)| *lid != id);
    }

    /// Invoke every currently subscribed listener synchronously, in
    /// subscription order, with the full tag list.
    ///
    /// The listener list is snapshotted before dispatch, so a listener
    /// subscribed during another listener's callback is not invoked by this
    /// publish. A panicking listener is isolated and does not prevent the
    /// remaining listeners from running.
    pub fn publish(&self, tags: &[String]) {
        let snapshot: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(tags))).is_err() {
                tracing::warn!("Invalidation listener panicked: tags={:?}", tags);
            }
        }
    }

    /// Number of currently subscribed listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }
}

impl Default for InvalidationBus {
    fn default() -> Self {
        Self::new()
    }
}
