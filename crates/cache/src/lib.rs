//! Redis-backed query cache.
//!
//! Entries map a query signature to a serialized page result with an
//! absolute TTL enforced by Redis itself (`SETEX`). Bulk invalidation
//! walks the key space with an incremental cursor scan ([`KeyScan`])
//! because Redis has no wildcard-delete primitive; see [`QueryCache::delete_matching`].
//!
//! Write-path callers use [`QueryCache::purge_matching`], the best-effort
//! variant: a failed purge is logged and reported as
//! [`PurgeOutcome::Failed`], never propagated — the store write it
//! follows has already committed.

use std::time::Duration;

use deadpool_redis::{Config as RedisConfig, Pool, PoolConfig, Runtime};
use redis::AsyncCommands;

use shelf_kernel::settings::CacheSettings;

pub mod scan;

pub use scan::KeyScan;

/// Cache-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache pool setup error: {0}")]
    CreatePool(#[from] deadpool_redis::CreatePoolError),

    #[error("cache pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("cache command error: {0}")]
    Redis(#[from] redis::RedisError),
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// Outcome of a best-effort cache purge.
///
/// `Failed` means the key space may still hold stale entries until their
/// TTL expires; it is never an error for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeOutcome {
    Purged(u64),
    Failed,
}

/// Creates a bounded Redis connection pool from the given settings.
pub fn create_pool(settings: &CacheSettings) -> Result<Pool> {
    tracing::info!(
        url = %settings.url,
        pool_size = settings.pool_size,
        "creating Redis connection pool"
    );

    let mut cfg = RedisConfig::from_url(&settings.url);
    cfg.pool = Some(PoolConfig::new(settings.pool_size));

    Ok(cfg.create_pool(Some(Runtime::Tokio1))?)
}

/// Key-value cache for serialized query results.
#[derive(Clone)]
pub struct QueryCache {
    pool: Pool,
    default_ttl: Duration,
    scan_batch: usize,
}

impl QueryCache {
    pub fn new(pool: Pool, settings: &CacheSettings) -> Self {
        Self {
            pool,
            default_ttl: Duration::from_secs(settings.ttl_secs),
            scan_batch: settings.scan_batch,
        }
    }

    /// TTL applied by [`QueryCache::set_default_ttl`].
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up a serialized entry.
    ///
    /// Returns `Ok(None)` when the key is absent or its TTL has elapsed;
    /// Redis enforces expiry, the cache never re-validates a live entry.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.pool.get().await?;
        Ok(conn.get::<_, Option<String>>(key).await?)
    }

    /// Store a serialized entry with an absolute TTL.
    pub async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.pool.get().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    /// Store a serialized entry with the configured default TTL.
    pub async fn set_default_ttl(&self, key: &str, value: &str) -> Result<()> {
        self.set(key, value, self.default_ttl).await
    }

    /// Delete every key matching `pattern`.
    ///
    /// The key space is unbounded (one entry per distinct query signature
    /// ever seen), so this drives a full cursor scan in bounded batches
    /// rather than a single round trip. Returns the number of keys
    /// removed.
    pub async fn delete_matching(&self, pattern: &str) -> Result<u64> {
        let mut conn = self.pool.get().await?;
        let mut scan = KeyScan::new(pattern, self.scan_batch);
        let mut deleted: u64 = 0;

        while let Some(keys) = scan.next_batch(&mut conn).await? {
            if keys.is_empty() {
                continue;
            }
            deleted += conn.del::<_, u64>(&keys).await?;
        }

        Ok(deleted)
    }

    /// Best-effort variant of [`QueryCache::delete_matching`].
    ///
    /// Errors are logged and swallowed; stale entries left behind expire
    /// with their TTL.
    pub async fn purge_matching(&self, pattern: &str) -> PurgeOutcome {
        match self.delete_matching(pattern).await {
            Ok(purged) => {
                tracing::debug!(pattern, purged, "query cache purged");
                PurgeOutcome::Purged(purged)
            }
            Err(error) => {
                tracing::warn!(
                    pattern,
                    %error,
                    "query cache purge failed; stale entries remain until TTL expiry"
                );
                PurgeOutcome::Failed
            }
        }
    }
}
