//! swr-bind - a stale-while-revalidate cache with tag-based invalidation
//!
//! This library provides the data layer a client application puts between its
//! views and a remote backend:
//! - Stale-while-revalidate (SWR) semantics per cache key
//! - Tag-based whole-entry invalidation fanning out to every live consumer
//! - Optimistic local mutation ahead of the round-trip
//! - Race-safe background refresh across many concurrent consumers
//!
//! # Example
//!
//! ```ignore
//! use swr_bind::{fetcher, BindOptions, Cache};
//!
//! #[tokio::main]
//! async fn main() {
//!     let cache: Cache<Vec<Ticket>> = Cache::new();
//!
//!     // One binding per view of the data
//!     let binding = cache.bind();
//!     binding
//!         .bind(
//!             "tickets:list",
//!             fetcher(|| async { Ok(api.list_tickets().await?) }),
//!             BindOptions {
//!                 tags: vec!["tickets".into()],
//!                 ttl_ms: 60_000,
//!             },
//!         )
//!         .await;
//!
//!     // Somewhere else, after updating a ticket: every binding tagged
//!     // "tickets" silently refetches in the background.
//!     cache.invalidate(&["tickets"]).await;
//! }
//! ```

mod binding;
mod bus;
mod cache;
mod entry;
mod error;
mod store;
mod utils;

// Re-export public API
pub use binding::{fetcher, BindOptions, Binding, Fetcher, Snapshot};
pub use bus::{InvalidationBus, Listener, ListenerId};
pub use cache::Cache;
pub use entry::CacheEntry;
pub use error::{BoxError, CacheError};
pub use store::CacheStore;
