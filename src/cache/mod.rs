//! Home feed cache.
//!
//! The rendered home listing is kept in a single slot under the fixed key
//! `index_page` for a short TTL (20 seconds by default). Writes never touch
//! the slot, so new posts appear on `/` only after expiry or an explicit
//! clear through the admin listener:
//!
//! ```toml
//! [cache]
//! enabled = true
//! index_ttl_seconds = 20
//! ```

mod clock;
mod config;
mod lock;
mod middleware;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{FeedCacheConfig, INDEX_PAGE_KEY};
pub use middleware::index_cache_layer;
pub use store::{CacheStoreError, CachedResponse, FeedCache};
