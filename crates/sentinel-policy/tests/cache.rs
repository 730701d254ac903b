use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sentinel_policy::cache::PolicyCache;
use sentinel_policy::error::PolicyError;
use sentinel_policy::source::ParameterSource;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const POLICY_JSON: &str = r#"{
    "version": "1",
    "rules": [{"name": "allow-all", "effect": "allow"}]
}"#;

struct CountingSource {
    fetches: AtomicUsize,
    delay: Duration,
    payload: String,
}

impl CountingSource {
    fn new(payload: &str, delay: Duration) -> Self {
        Self {
            fetches: AtomicUsize::new(0),
            delay,
            payload: payload.to_string(),
        }
    }

    fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ParameterSource for CountingSource {
    fn fetch(&self, _name: &str) -> BoxFuture<'_, Result<String, PolicyError>> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(self.payload.clone())
        })
    }
}

struct FailingSource;

impl ParameterSource for FailingSource {
    fn fetch(&self, name: &str) -> BoxFuture<'_, Result<String, PolicyError>> {
        let name = name.to_string();
        Box::pin(async move { Err(PolicyError::NotFound(name)) })
    }
}

#[tokio::test]
async fn hit_within_ttl_skips_the_source() {
    let source = Arc::new(CountingSource::new(POLICY_JSON, Duration::ZERO));
    let cache = PolicyCache::new(source.clone(), Duration::from_secs(60));

    let first = cache.load("default").await.unwrap();
    let second = cache.load("default").await.unwrap();

    assert_eq!(source.fetch_count(), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.rules.len(), 1);
}

#[tokio::test]
async fn zero_ttl_refetches_every_time() {
    let source = Arc::new(CountingSource::new(POLICY_JSON, Duration::ZERO));
    let cache = PolicyCache::new(source.clone(), Duration::ZERO);

    cache.load("default").await.unwrap();
    cache.load("default").await.unwrap();
    cache.load("default").await.unwrap();

    assert_eq!(source.fetch_count(), 3);
}

#[tokio::test]
async fn concurrent_misses_coalesce_to_one_fetch() {
    let source = Arc::new(CountingSource::new(POLICY_JSON, Duration::from_millis(50)));
    let cache = Arc::new(PolicyCache::new(source.clone(), Duration::from_secs(60)));

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let cache = cache.clone();
        tasks.push(tokio::spawn(async move { cache.load("default").await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(source.fetch_count(), 1);
}

#[tokio::test]
async fn distinct_names_fetch_independently() {
    let source = Arc::new(CountingSource::new(POLICY_JSON, Duration::ZERO));
    let cache = PolicyCache::new(source.clone(), Duration::from_secs(60));

    cache.load("default").await.unwrap();
    cache.load("staging").await.unwrap();

    assert_eq!(source.fetch_count(), 2);
}

#[tokio::test]
async fn invalidate_forces_refetch() {
    let source = Arc::new(CountingSource::new(POLICY_JSON, Duration::ZERO));
    let cache = PolicyCache::new(source.clone(), Duration::from_secs(60));

    cache.load("default").await.unwrap();
    cache.invalidate("default");
    cache.load("default").await.unwrap();

    assert_eq!(source.fetch_count(), 2);
}

#[tokio::test]
async fn source_errors_surface_unchanged() {
    let cache = PolicyCache::new(Arc::new(FailingSource), Duration::from_secs(60));

    let err = cache.load("missing").await.unwrap_err();
    assert!(matches!(err, PolicyError::NotFound(name) if name == "missing"));
}

#[tokio::test]
async fn malformed_document_is_a_parse_error() {
    let source = Arc::new(CountingSource::new("not json", Duration::ZERO));
    let cache = PolicyCache::new(source, Duration::from_secs(60));

    let err = cache.load("default").await.unwrap_err();
    assert!(matches!(err, PolicyError::Parse(_)));
}
