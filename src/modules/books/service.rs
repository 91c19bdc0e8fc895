//! Read-through query orchestration over the book store and query cache.

use anyhow::Context;
use uuid::Uuid;

use shelf_cache::QueryCache;
use shelf_http::error::AppError;

use super::models::{Book, BookChanges, NewBook, PageResult};
use super::store::BookStore;

/// Pattern covering every cached book query.
pub const CACHE_PATTERN: &str = "books:*";

/// Derive the cache key for a (page, limit, term) query signature.
///
/// Identical signatures must collide and distinct ones must not; the
/// term is normalized (trim + lowercase) so case-variant searches —
/// which the store answers identically — share one entry.
pub fn cache_key(page: i64, limit: i64, term: &str) -> String {
    format!(
        "books:page:{}:limit:{}:title:{}",
        page,
        limit,
        term.trim().to_lowercase()
    )
}

/// `ceil(total_items / limit)` with an empty store yielding zero pages.
fn total_pages(total_items: i64, limit: i64) -> i64 {
    (total_items + limit - 1) / limit
}

/// Answers paginated book queries through the cache and keeps the cache
/// coherent (coarsely) across writes.
pub struct BookQueryService {
    store: BookStore,
    cache: QueryCache,
}

impl BookQueryService {
    pub fn new(store: BookStore, cache: QueryCache) -> Self {
        Self { store, cache }
    }

    /// List one page of books, read-through cached.
    ///
    /// A cache miss costs exactly one count plus one fetch against the
    /// store; the assembled page is cached under the derived key with the
    /// configured TTL before returning. Cache failures (read, decode, or
    /// write) degrade to uncached operation rather than failing the
    /// request.
    pub async fn list(&self, page: i64, limit: i64, term: &str) -> Result<PageResult, AppError> {
        let key = cache_key(page, limit, term);

        match self.cache.get(&key).await {
            Ok(Some(cached)) => match serde_json::from_str::<PageResult>(&cached) {
                Ok(result) => {
                    tracing::debug!(key = %key, "query cache hit");
                    return Ok(result);
                }
                Err(error) => {
                    tracing::warn!(key = %key, %error, "undecodable cache entry, treating as miss");
                }
            },
            Ok(None) => {
                tracing::debug!(key = %key, "query cache miss");
            }
            Err(error) => {
                tracing::warn!(key = %key, %error, "cache read failed, falling back to store");
            }
        }

        let total_items = self
            .store
            .count(term)
            .await
            .context("failed to count books")?;
        let data = self
            .store
            .search(term, limit, (page - 1) * limit)
            .await
            .context("failed to query books")?;

        let result = PageResult {
            page,
            limit,
            total_pages: total_pages(total_items, limit),
            total_items,
            data,
        };

        match serde_json::to_string(&result) {
            Ok(serialized) => {
                if let Err(error) = self.cache.set_default_ttl(&key, &serialized).await {
                    tracing::warn!(key = %key, %error, "cache write failed, result served uncached");
                }
            }
            Err(error) => {
                tracing::warn!(key = %key, %error, "failed to serialize page result for caching");
            }
        }

        Ok(result)
    }

    /// Point lookup; never touches the cache.
    pub async fn get(&self, id: Uuid) -> Result<Book, AppError> {
        self.store
            .get(id)
            .await
            .context("failed to load book")?
            .ok_or_else(|| AppError::not_found("book not found"))
    }

    /// Insert a book, then purge every cached page.
    pub async fn create(&self, new_book: NewBook) -> Result<Book, AppError> {
        let book = self
            .store
            .insert(&new_book)
            .await
            .context("failed to insert book")?;

        self.cache.purge_matching(CACHE_PATTERN).await;

        Ok(book)
    }

    /// Apply a partial update, then purge every cached page.
    pub async fn update(&self, id: Uuid, changes: &BookChanges) -> Result<Book, AppError> {
        let book = self
            .store
            .update(id, changes)
            .await
            .context("failed to update book")?
            .ok_or_else(|| AppError::not_found("book not found"))?;

        self.cache.purge_matching(CACHE_PATTERN).await;

        Ok(book)
    }

    /// Delete a book, then purge every cached page.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let deleted = self
            .store
            .delete(id)
            .await
            .context("failed to delete book")?;

        if !deleted {
            return Err(AppError::not_found("book not found"));
        }

        self.cache.purge_matching(CACHE_PATTERN).await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_uses_defaults_shape() {
        assert_eq!(cache_key(1, 10, ""), "books:page:1:limit:10:title:");
    }

    #[test]
    fn cache_key_distinguishes_pages_limits_and_terms() {
        let keys = [
            cache_key(1, 10, ""),
            cache_key(2, 10, ""),
            cache_key(1, 20, ""),
            cache_key(1, 10, "dune"),
            cache_key(1, 10, "herbert"),
        ];

        for (i, a) in keys.iter().enumerate() {
            for b in keys.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn cache_key_normalizes_case_variants_together() {
        assert_eq!(cache_key(1, 10, "Dune"), cache_key(1, 10, " dune "));
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(95, 10), 10);
    }
}
