//! Book persistence.

use sqlx::PgPool;
use uuid::Uuid;

use super::models::{Book, BookChanges, NewBook};

/// Book storage operations against PostgreSQL.
///
/// Listing order is `created_seq DESC` — most recently created first,
/// with the same sequence as the tie breaker.
#[derive(Clone)]
pub struct BookStore {
    pool: PgPool,
}

impl BookStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Escape LIKE wildcards so the term always matches as a raw substring.
    fn like_pattern(term: &str) -> String {
        let escaped = term
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        format!("%{}%", escaped)
    }

    /// Count books matching the term (all books when the term is empty).
    pub async fn count(&self, term: &str) -> sqlx::Result<i64> {
        let row: (i64,) = if term.is_empty() {
            sqlx::query_as("SELECT COUNT(*) FROM books")
                .fetch_one(&self.pool)
                .await?
        } else {
            sqlx::query_as("SELECT COUNT(*) FROM books WHERE title ILIKE $1 OR author ILIKE $1")
                .bind(Self::like_pattern(term))
                .fetch_one(&self.pool)
                .await?
        };

        Ok(row.0)
    }

    /// Fetch one page of books matching the term, newest first.
    ///
    /// The match is case-insensitive and unanchored over title OR author.
    pub async fn search(&self, term: &str, limit: i64, offset: i64) -> sqlx::Result<Vec<Book>> {
        if term.is_empty() {
            sqlx::query_as(
                r#"
                SELECT id, title, author, year, thumbnail
                FROM books
                ORDER BY created_seq DESC
                LIMIT $1 OFFSET $2
                "#,
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as(
                r#"
                SELECT id, title, author, year, thumbnail
                FROM books
                WHERE title ILIKE $1 OR author ILIKE $1
                ORDER BY created_seq DESC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(Self::like_pattern(term))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        }
    }

    /// Point lookup by id.
    pub async fn get(&self, id: Uuid) -> sqlx::Result<Option<Book>> {
        sqlx::query_as(
            r#"
            SELECT id, title, author, year, thumbnail
            FROM books
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Insert a new book with a fresh id.
    pub async fn insert(&self, new_book: &NewBook) -> sqlx::Result<Book> {
        sqlx::query_as(
            r#"
            INSERT INTO books (id, title, author, year, thumbnail)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, title, author, year, thumbnail
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_book.title)
        .bind(&new_book.author)
        .bind(new_book.year)
        .bind(&new_book.thumbnail)
        .fetch_one(&self.pool)
        .await
    }

    /// Apply a partial update; absent fields keep their stored value.
    pub async fn update(&self, id: Uuid, changes: &BookChanges) -> sqlx::Result<Option<Book>> {
        sqlx::query_as(
            r#"
            UPDATE books
            SET title     = COALESCE($2, title),
                author    = COALESCE($3, author),
                year      = COALESCE($4, year),
                thumbnail = COALESCE($5, thumbnail)
            WHERE id = $1
            RETURNING id, title, author, year, thumbnail
            "#,
        )
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.author)
        .bind(changes.year)
        .bind(&changes.thumbnail)
        .fetch_optional(&self.pool)
        .await
    }

    /// Delete by id; returns whether a row was removed.
    pub async fn delete(&self, id: Uuid) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(BookStore::like_pattern("dune"), "%dune%");
        assert_eq!(BookStore::like_pattern("100%"), "%100\\%%");
        assert_eq!(BookStore::like_pattern("a_b"), "%a\\_b%");
        assert_eq!(BookStore::like_pattern("c\\d"), "%c\\\\d%");
    }
}
