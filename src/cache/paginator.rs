//! Paginator decorator that memoizes page item lists.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::application::pagination::{ItemSource, Page, PaginationError, Paginator};

use super::keys::build_page_key;
use super::store::PageCache;
use super::{METRIC_PAGE_CACHE_HIT, METRIC_PAGE_CACHE_MISS, METRIC_PAGE_CACHE_UNAVAILABLE};

/// Serves pages of a [`Paginator`] through a [`PageCache`].
///
/// A hit rebuilds the page from the cached item list, while the page count and
/// neighbour links still come from the live paginator. The two can disagree
/// until the entry expires.
pub struct CachedPaginator<T, S> {
    paginator: Paginator<T, S>,
    cache: Arc<dyn PageCache>,
    cache_key: String,
    ttl: Duration,
}

impl<T, S> CachedPaginator<T, S>
where
    T: Serialize + DeserializeOwned + Send,
    S: ItemSource<T>,
{
    pub fn new(
        paginator: Paginator<T, S>,
        cache: Arc<dyn PageCache>,
        cache_key: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            paginator,
            cache,
            cache_key: cache_key.into(),
            ttl,
        }
    }

    pub fn paginator(&self) -> &Paginator<T, S> {
        &self.paginator
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Full cache key for one page of this listing.
    pub fn build_cache_key(&self, number: u64) -> String {
        build_page_key(&self.cache_key, self.paginator.per_page(), number)
    }

    /// Return page `number` (page 1 when absent), from the cache when possible.
    pub async fn page(&self, number: Option<i64>) -> Result<Page<T>, PaginationError> {
        let number = self.paginator.validate_number(number.unwrap_or(1)).await?;
        let key = self.build_cache_key(number);

        if let Some(items) = self.lookup(&key).await {
            counter!(METRIC_PAGE_CACHE_HIT).increment(1);
            let meta = self.paginator.meta().await?;
            let (_, live_len) = self.paginator.bounds(&meta, number);
            if items.len() as u64 != live_len {
                debug!(
                    key = %key,
                    cached_len = items.len(),
                    live_len,
                    "cached page differs in length from the live collection"
                );
            }
            return Ok(Page::new(items, number, meta));
        }

        counter!(METRIC_PAGE_CACHE_MISS).increment(1);
        let page = self.paginator.fetch_page(number).await?;
        self.store(&key, page.items()).await;
        Ok(page)
    }

    async fn lookup(&self, key: &str) -> Option<Vec<T>> {
        let bytes = match self.cache.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(err) => {
                counter!(METRIC_PAGE_CACHE_UNAVAILABLE).increment(1);
                warn!(key = %key, error = %err, "page cache lookup failed, serving uncached");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(items) => Some(items),
            Err(err) => {
                warn!(key = %key, error = %err, "discarding undecodable cached page");
                None
            }
        }
    }

    async fn store(&self, key: &str, items: &[T]) {
        let payload = match serde_json::to_vec(items) {
            Ok(payload) => Bytes::from(payload),
            Err(err) => {
                warn!(key = %key, error = %err, "page items could not be serialized for caching");
                return;
            }
        };

        if let Err(err) = self.cache.set(key, payload, self.ttl).await {
            counter!(METRIC_PAGE_CACHE_UNAVAILABLE).increment(1);
            warn!(key = %key, error = %err, "page cache write failed");
        }
    }
}
