//! Bearer-token issuance and verification.
//!
//! Tokens are HS256 JWTs carrying the user id and username, valid for a
//! configured lifetime (one hour by default) and verified statelessly —
//! there is no server-side session record and no pre-expiry revocation.

use std::time::Duration;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use shelf_kernel::settings::AuthSettings;

/// Errors that can occur during token operations.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// No signing secret is configured; startup must treat this as fatal.
    #[error("auth.jwt_secret is not configured")]
    MissingSecret,

    /// Failed to encode a token.
    #[error("failed to encode token: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),

    /// The token has expired.
    #[error("token expired")]
    Expired,

    /// The token is malformed, carries a bad signature, or has invalid
    /// claims. Collapsed into one variant on purpose: clients receive
    /// the same rejection for every failure mode.
    #[error("invalid token")]
    Invalid,
}

/// Claims embedded in an issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject — user id.
    pub sub: Uuid,
    /// Username, carried for log attribution downstream.
    pub username: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
}

/// Verified caller identity, extracted from a valid token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
}

/// Issues and verifies signed bearer tokens.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    validation: Validation,
}

impl TokenService {
    /// Build the service from settings.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::MissingSecret`] when no signing secret is
    /// configured.
    pub fn from_settings(settings: &AuthSettings) -> Result<Self, TokenError> {
        let secret = settings
            .jwt_secret
            .as_deref()
            .ok_or(TokenError::MissingSecret)?;

        Ok(Self::new(secret, Duration::from_secs(settings.token_ttl_secs)))
    }

    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // No clock slack: a token is rejected the second its expiry passes.
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
            validation,
        }
    }

    /// Issue a token for the given user, expiring `ttl` from now.
    pub fn issue(&self, user_id: Uuid, username: &str) -> Result<String, TokenError> {
        self.issue_at(user_id, username, OffsetDateTime::now_utc())
    }

    /// Issue a token with an explicit issuance instant.
    pub fn issue_at(
        &self,
        user_id: Uuid,
        username: &str,
        issued_at: OffsetDateTime,
    ) -> Result<String, TokenError> {
        let iat = issued_at.unix_timestamp();
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            iat,
            exp: iat + self.ttl.as_secs() as i64,
        };

        encode(&Header::default(), &claims, &self.encoding).map_err(TokenError::Encoding)
    }

    /// Verify a token, yielding the caller identity on success.
    ///
    /// Expiry is distinguished from every other failure for logging only;
    /// both must surface to the client as the same rejection.
    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|error| {
            match error.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;

        Ok(Identity {
            user_id: data.claims.sub,
            username: data.claims.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("test-secret", Duration::from_secs(3600))
    }

    #[test]
    fn issue_then_verify_roundtrip() {
        let service = service();
        let user_id = Uuid::new_v4();

        let token = service.issue(user_id, "frank").unwrap();
        let identity = service.verify(&token).unwrap();

        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.username, "frank");
    }

    #[test]
    fn token_is_accepted_just_before_expiry() {
        let service = service();
        // Issued 59 minutes ago with a one hour lifetime.
        let issued_at = OffsetDateTime::now_utc() - time::Duration::minutes(59);

        let token = service.issue_at(Uuid::new_v4(), "frank", issued_at).unwrap();
        assert!(service.verify(&token).is_ok());
    }

    #[test]
    fn token_is_rejected_after_expiry() {
        let service = service();
        // Issued 61 minutes ago with a one hour lifetime.
        let issued_at = OffsetDateTime::now_utc() - time::Duration::minutes(61);

        let token = service.issue_at(Uuid::new_v4(), "frank", issued_at).unwrap();
        assert!(matches!(service.verify(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn token_signed_with_other_secret_is_invalid() {
        let issuer = TokenService::new("secret-a", Duration::from_secs(3600));
        let verifier = TokenService::new("secret-b", Duration::from_secs(3600));

        let token = issuer.issue(Uuid::new_v4(), "frank").unwrap();
        assert!(matches!(verifier.verify(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn garbage_token_is_invalid() {
        assert!(matches!(
            service().verify("not.a.token"),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn missing_secret_is_a_startup_error() {
        let settings = AuthSettings::default();
        assert!(matches!(
            TokenService::from_settings(&settings),
            Err(TokenError::MissingSecret)
        ));
    }
}
