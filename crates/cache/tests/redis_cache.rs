//! Integration tests for the Redis query cache.
//!
//! Tests use testcontainers to spin up a real Redis instance; they are
//! ignored by default because they need a local Docker daemon.

use std::time::Duration;

use shelf_cache::{create_pool, PurgeOutcome, QueryCache};
use shelf_kernel::settings::CacheSettings;
use testcontainers::{runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;

// Shared Redis container for all tests
static SHARED_REDIS: OnceCell<(ContainerAsync<Redis>, String)> = OnceCell::const_new();

/// Get or create the shared Redis container
async fn get_redis_url() -> String {
    let (_, url) = SHARED_REDIS
        .get_or_init(|| async {
            let container = Redis::default()
                .start()
                .await
                .expect("start redis container");

            let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
            let url = format!("redis://127.0.0.1:{}", host_port);

            (container, url)
        })
        .await;

    url.clone()
}

async fn test_cache(scan_batch: usize) -> QueryCache {
    let settings = CacheSettings {
        url: get_redis_url().await,
        scan_batch,
        ..Default::default()
    };
    let pool = create_pool(&settings).expect("create redis pool");
    QueryCache::new(pool, &settings)
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn test_get_absent_key_is_miss() {
    let cache = test_cache(200).await;

    let value = cache.get("absent:page:1:limit:10:title:").await.unwrap();
    assert_eq!(value, None);
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn test_set_then_get_roundtrip() {
    let cache = test_cache(200).await;

    cache
        .set("rt:page:1:limit:10:title:", r#"{"page":1}"#, Duration::from_secs(60))
        .await
        .unwrap();

    let value = cache.get("rt:page:1:limit:10:title:").await.unwrap();
    assert_eq!(value.as_deref(), Some(r#"{"page":1}"#));
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn test_entry_expires_with_ttl() {
    let cache = test_cache(200).await;

    cache
        .set("ttl:page:1:limit:10:title:", "{}", Duration::from_secs(1))
        .await
        .unwrap();

    assert!(cache.get("ttl:page:1:limit:10:title:").await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert!(cache.get("ttl:page:1:limit:10:title:").await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn test_delete_matching_covers_keyspace_larger_than_one_batch() {
    // Batch of 10 forces many SCAN round trips over 250 keys.
    let cache = test_cache(10).await;

    for i in 0..250 {
        cache
            .set(
                &format!("sweep:page:{}:limit:10:title:", i),
                "{}",
                Duration::from_secs(300),
            )
            .await
            .unwrap();
    }
    cache
        .set("other:page:1:limit:10:title:", "{}", Duration::from_secs(300))
        .await
        .unwrap();

    let deleted = cache.delete_matching("sweep:*").await.unwrap();
    assert_eq!(deleted, 250);

    // Every matching key is gone, non-matching keys survive.
    assert!(cache.get("sweep:page:0:limit:10:title:").await.unwrap().is_none());
    assert!(cache.get("sweep:page:249:limit:10:title:").await.unwrap().is_none());
    assert!(cache.get("other:page:1:limit:10:title:").await.unwrap().is_some());
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn test_delete_matching_on_empty_keyspace() {
    let cache = test_cache(200).await;

    let deleted = cache.delete_matching("nothing-here:*").await.unwrap();
    assert_eq!(deleted, 0);
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn test_purge_matching_reports_purged_count() {
    let cache = test_cache(200).await;

    cache
        .set("purge:page:1:limit:10:title:", "{}", Duration::from_secs(300))
        .await
        .unwrap();
    cache
        .set("purge:page:2:limit:10:title:", "{}", Duration::from_secs(300))
        .await
        .unwrap();

    assert_eq!(cache.purge_matching("purge:*").await, PurgeOutcome::Purged(2));
    assert!(cache.get("purge:page:1:limit:10:title:").await.unwrap().is_none());
}
