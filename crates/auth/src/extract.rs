//! Axum extractor enforcing the `Authorization: Bearer` contract.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::token::{Identity, TokenService};

/// Uniform rejection for every authentication failure.
///
/// Missing header, wrong scheme, malformed token, bad signature, and
/// expiry all produce this same response; the distinction lives only in
/// the logs.
#[derive(Debug)]
pub struct AuthRejection;

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let body = json!({
            "msg": "authentication required",
            "code": "unauthorized",
            "details": [],
            "trace_id": Uuid::new_v4().to_string(),
            "timestamp": OffsetDateTime::now_utc().to_string(),
        });

        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
    Arc<TokenService>: FromRef<S>,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = Arc::<TokenService>::from_ref(state);

        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AuthRejection)?;

        let token = header_value.strip_prefix("Bearer ").ok_or(AuthRejection)?;

        tokens.verify(token.trim()).map_err(|error| {
            tracing::debug!(%error, "bearer token rejected");
            AuthRejection
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use std::time::Duration;

    fn state() -> Arc<TokenService> {
        Arc::new(TokenService::new("extractor-secret", Duration::from_secs(3600)))
    }

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/books");
        if let Some(value) = value {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let mut parts = parts_with_auth(None);
        let result = Identity::from_request_parts(&mut parts, &state()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_rejected() {
        let mut parts = parts_with_auth(Some("Basic dXNlcjpwYXNz"));
        let result = Identity::from_request_parts(&mut parts, &state()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn valid_bearer_token_yields_identity() {
        let state = state();
        let user_id = Uuid::new_v4();
        let token = state.issue(user_id, "frank").unwrap();

        let mut parts = parts_with_auth(Some(&format!("Bearer {}", token)));
        let identity = Identity::from_request_parts(&mut parts, &state).await.unwrap();

        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.username, "frank");
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let state = state();
        let issued_at = OffsetDateTime::now_utc() - time::Duration::hours(2);
        let token = state.issue_at(Uuid::new_v4(), "frank", issued_at).unwrap();

        let mut parts = parts_with_auth(Some(&format!("Bearer {}", token)));
        let result = Identity::from_request_parts(&mut parts, &state).await;
        assert!(result.is_err());
    }
}
