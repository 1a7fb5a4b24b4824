use std::collections::HashMap;
use std::num::{NonZeroU32, NonZeroUsize};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use serial_test::serial;
use yatube::application::pagination::Paginator;
use yatube::cache::{CacheError, CachedPaginator, MemoryPageCache, PageCache};

const TTL: Duration = Duration::from_secs(20);

struct BrokenCache;

#[async_trait]
impl PageCache for BrokenCache {
    async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
        Err(CacheError::Unavailable("backend down".to_string()))
    }

    async fn set(&self, _key: &str, _value: Bytes, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("backend down".to_string()))
    }
}

fn paginator(items: Vec<u32>, cache: Arc<dyn PageCache>) -> CachedPaginator<u32, Vec<u32>> {
    CachedPaginator::new(
        Paginator::new(items, NonZeroU32::new(10).expect("non-zero")),
        cache,
        "index_page",
        TTL,
    )
}

#[tokio::test]
#[serial]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    // One-page cache: reading page 2 pushes page 1 out.
    let store: Arc<dyn PageCache> = Arc::new(MemoryPageCache::with_capacity(
        NonZeroUsize::new(1).expect("non-zero"),
    ));
    let items: Vec<u32> = (1..=19).collect();

    paginator(items.clone(), store.clone())
        .page(Some(1))
        .await
        .expect("miss");
    paginator(items.clone(), store.clone())
        .page(Some(1))
        .await
        .expect("hit");
    paginator(items.clone(), store.clone())
        .page(Some(2))
        .await
        .expect("miss and evict");

    paginator(items, Arc::new(BrokenCache))
        .page(Some(1))
        .await
        .expect("served without cache");

    let counters: HashMap<String, u64> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter_map(|(composite_key, _, _, value)| match value {
            DebugValue::Counter(count) => Some((composite_key.key().name().to_string(), count)),
            _ => None,
        })
        .collect();

    let expected = [
        ("yatube_page_cache_hit_total", 1),
        ("yatube_page_cache_miss_total", 3),
        ("yatube_page_cache_evict_total", 1),
        ("yatube_page_cache_unavailable_total", 2),
    ];

    for (metric, count) in expected {
        assert_eq!(counters.get(metric), Some(&count), "metric: {metric}");
    }
}
