//! Page-level cache for paginated post listings.
//!
//! [`CachedPaginator`] memoizes the item list of each page under
//! `"{namespace}:{page_size}:{page_number}"` in a [`PageCache`] backend for a
//! fixed time-to-live. Entries are never invalidated on writes; staleness is
//! bounded by the TTL alone.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! capacity = 1024
//! page_ttl_seconds = 20
//! purge_interval_seconds = 60
//! ```

mod config;
mod keys;
mod paginator;
mod store;

pub use config::CacheConfig;
pub use keys::{CachedListing, ListingKey, build_page_key};
pub use paginator::CachedPaginator;
pub use store::{CacheError, DisabledPageCache, MemoryPageCache, PageCache};

pub(crate) const METRIC_PAGE_CACHE_HIT: &str = "yatube_page_cache_hit_total";
pub(crate) const METRIC_PAGE_CACHE_MISS: &str = "yatube_page_cache_miss_total";
pub(crate) const METRIC_PAGE_CACHE_EVICT: &str = "yatube_page_cache_evict_total";
pub(crate) const METRIC_PAGE_CACHE_UNAVAILABLE: &str = "yatube_page_cache_unavailable_total";
