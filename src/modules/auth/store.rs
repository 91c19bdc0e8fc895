//! Credential persistence and verification.

use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::UserRecord;

/// Result of checking a username/password pair.
///
/// The failure arms are logged distinctly but must surface to clients
/// identically, so usernames cannot be enumerated through login.
#[derive(Debug)]
pub enum CredentialCheck {
    Verified(UserRecord),
    UnknownUser,
    WrongPassword,
}

/// Errors from user registration.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("username already exists")]
    DuplicateUsername,

    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// User storage operations against PostgreSQL.
#[derive(Clone)]
pub struct CredentialStore {
    pool: PgPool,
}

impl CredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Exact-match lookup by username.
    pub async fn find_by_username(&self, username: &str) -> sqlx::Result<Option<UserRecord>> {
        sqlx::query_as(
            r#"
            SELECT id, username, password_hash
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
    }

    /// Insert a new user; a duplicate username is a distinct, recoverable
    /// error.
    pub async fn insert(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<UserRecord, RegistrationError> {
        sqlx::query_as(
            r#"
            INSERT INTO users (id, username, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, password_hash
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            if let sqlx::Error::Database(ref db_error) = error {
                if db_error.is_unique_violation() {
                    return RegistrationError::DuplicateUsername;
                }
            }
            RegistrationError::Db(error)
        })
    }

    /// All users, oldest first.
    pub async fn list(&self) -> sqlx::Result<Vec<UserRecord>> {
        sqlx::query_as(
            r#"
            SELECT id, username, password_hash
            FROM users
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    /// Check a username/password pair against the stored hash.
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> anyhow::Result<CredentialCheck> {
        let Some(user) = self
            .find_by_username(username)
            .await
            .context("failed to look up user")?
        else {
            return Ok(CredentialCheck::UnknownUser);
        };

        let matches = shelf_auth::verify_password(password, &user.password_hash)
            .map_err(|error| anyhow::anyhow!("stored password hash is unreadable: {error}"))?;

        if matches {
            Ok(CredentialCheck::Verified(user))
        } else {
            Ok(CredentialCheck::WrongPassword)
        }
    }
}
