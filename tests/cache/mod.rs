use slr_sweep::cache::*;
use slr_sweep::error::Error;
use slr_sweep::metrics::MetricsCollector;
use slr_sweep::store::Store;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn cache(store: &Arc<Store>, namespace: CacheNamespace) -> MemoCache<Vec<String>> {
    MemoCache::new(store.clone(), namespace, Arc::new(MetricsCollector::new()))
}

fn words(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_lookup_after_store() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let c = cache(&store, CacheNamespace::Enrichment);
    let key = CacheKey::new(1, "thesaurus", "machine");

    assert_eq!(c.lookup(&key).unwrap(), None);
    c.store(&key, &words(&["computer", "device"])).unwrap();
    assert_eq!(c.lookup(&key).unwrap(), Some(words(&["computer", "device"])));
}

#[test]
fn test_second_store_conflicts() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let c = cache(&store, CacheNamespace::Enrichment);
    let key = CacheKey::new(1, "thesaurus", "machine");

    c.store(&key, &words(&["computer"])).unwrap();
    let err = c.store(&key, &words(&["device"])).unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));

    // First write wins.
    assert_eq!(c.lookup(&key).unwrap(), Some(words(&["computer"])));
}

#[test]
fn test_entries_survive_a_new_cache_instance() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let key = CacheKey::new(3, "ollama", "smell");
    cache(&store, CacheNamespace::Enrichment).store(&key, &words(&["odor"])).unwrap();

    let fresh = cache(&store, CacheNamespace::Enrichment);
    assert_eq!(fresh.lookup(&key).unwrap(), Some(words(&["odor"])));
    assert_eq!(store.count_cache_entries(CacheNamespace::Enrichment).unwrap(), 1);
}

#[test]
fn test_key_parts_and_namespaces_are_independent() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let enrichment = cache(&store, CacheNamespace::Enrichment);
    let topics = cache(&store, CacheNamespace::Topics);

    enrichment.store(&CacheKey::new(1, "thesaurus", "code"), &words(&["source"])).unwrap();

    assert_eq!(enrichment.lookup(&CacheKey::new(2, "thesaurus", "code")).unwrap(), None);
    assert_eq!(enrichment.lookup(&CacheKey::new(1, "ollama", "code")).unwrap(), None);
    assert_eq!(topics.lookup(&CacheKey::new(1, "thesaurus", "code")).unwrap(), None);
    assert_eq!(store.count_cache_entries(CacheNamespace::Topics).unwrap(), 0);
}

#[test]
fn test_digest_is_stable_hex() {
    let a = CacheKey::new(1, "lda", "x");
    let b = CacheKey::new(1, "lda", "x");
    assert_eq!(a.digest(), b.digest());
    assert_eq!(a.digest().len(), 64);
    assert_ne!(a.digest(), CacheKey::new(1, "lda", "y").digest());
}

#[tokio::test]
async fn test_get_or_compute_runs_once() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let metrics = Arc::new(MetricsCollector::new());
    let c: MemoCache<Vec<String>> = MemoCache::new(store.clone(), CacheNamespace::Topics, metrics.clone());
    let key = CacheKey::new(1, "bertopic", "k=2");
    let calls = &AtomicUsize::new(0);

    for _ in 0..3 {
        let value = c
            .get_or_compute(&key, || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(words(&["machine", "learning"]))
            })
            .await
            .unwrap();
        assert_eq!(value, words(&["machine", "learning"]));
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(metrics.cache_misses.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.cache_hits.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn test_failed_compute_stores_nothing() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let c = cache(&store, CacheNamespace::Topics);
    let key = CacheKey::new(1, "bertopic", "k=2");

    let result = c.get_or_compute(&key, || async { Err(Error::model("bertopic", "out of memory")) }).await;
    assert!(result.is_err());
    assert_eq!(c.lookup(&key).unwrap(), None);
}

#[tokio::test]
async fn test_concurrent_writer_value_wins() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let ours = cache(&store, CacheNamespace::Enrichment);
    let theirs = cache(&store, CacheNamespace::Enrichment);
    let key = &CacheKey::new(1, "thesaurus", "machine");
    let theirs = &theirs;

    let value = ours
        .get_or_compute(key, || async move {
            // Another process records the entry while we compute.
            theirs.store(key, &words(&["computer"])).unwrap();
            Ok(words(&["device"]))
        })
        .await
        .unwrap();

    assert_eq!(value, words(&["computer"]));
    assert_eq!(ours.lookup(key).unwrap(), Some(words(&["computer"])));
}
