pub mod models;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use shelf_auth::{hash_password, Identity, TokenService};
use shelf_http::error::AppError;
use shelf_kernel::{InitCtx, Migration, Module};

use crate::bootstrap::AppContext;
use models::{CredentialsRequest, PublicUser, RegisterResponse, TokenResponse};
use store::{CredentialCheck, CredentialStore, RegistrationError};

/// Shared state of the auth routes.
#[derive(Clone)]
pub struct AuthState {
    pub store: CredentialStore,
    pub tokens: Arc<TokenService>,
}

impl FromRef<AuthState> for Arc<TokenService> {
    fn from_ref(state: &AuthState) -> Self {
        state.tokens.clone()
    }
}

/// Auth module: registration, login, and the user listing.
pub struct AuthModule {
    state: AuthState,
}

#[async_trait]
impl Module for AuthModule {
    fn name(&self) -> &'static str {
        "auth"
    }

    /// Mounted at `/api` directly so the routes land at `/api/register`,
    /// `/api/login`, and `/api/users`.
    fn mount_path(&self) -> String {
        "/api".to_string()
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "auth module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/register", post(register))
            .route("/login", post(login))
            .route("/users", get(list_users))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    fn migrations(&self) -> Vec<Migration> {
        migrations()
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "auth module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "auth module stopped");
        Ok(())
    }
}

/// Migrations contributed by the auth module.
pub fn migrations() -> Vec<Migration> {
    vec![Migration {
        id: "001_users",
        up: r#"
            CREATE TABLE IF NOT EXISTS users (
                id            UUID PRIMARY KEY,
                username      TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
    }]
}

/// Register a new user.
async fn register(
    State(state): State<AuthState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let Json(payload) = payload.map_err(|_| AppError::bad_request("invalid request body"))?;
    let (username, password) = payload.validate()?;

    let password_hash = hash_password(&password)
        .map_err(|error| anyhow::anyhow!("failed to hash password: {error}"))?;

    match state.store.insert(&username, &password_hash).await {
        Ok(user) => {
            tracing::info!(username = %user.username, "user registered");
            Ok((
                StatusCode::CREATED,
                Json(RegisterResponse {
                    msg: "user registered".to_string(),
                    user: PublicUser::from(user),
                }),
            ))
        }
        Err(RegistrationError::DuplicateUsername) => {
            Err(AppError::conflict("username already exists"))
        }
        Err(RegistrationError::Db(error)) => Err(AppError::Internal(error.into())),
    }
}

/// Exchange credentials for a bearer token.
///
/// Unknown usernames and wrong passwords produce the same response; the
/// distinction exists only in the logs.
async fn login(
    State(state): State<AuthState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let Json(payload) = payload.map_err(|_| AppError::bad_request("invalid request body"))?;
    let (username, password) = payload.validate()?;

    match state.store.verify_credentials(&username, &password).await? {
        CredentialCheck::Verified(user) => {
            let token = state
                .tokens
                .issue(user.id, &user.username)
                .map_err(|error| anyhow::anyhow!("failed to issue token: {error}"))?;

            tracing::info!(username = %user.username, "login succeeded");
            Ok(Json(TokenResponse { token }))
        }
        CredentialCheck::UnknownUser => {
            tracing::warn!(username = %username, "login attempt for unknown user");
            Err(AppError::unauthorized("invalid credentials"))
        }
        CredentialCheck::WrongPassword => {
            tracing::warn!(username = %username, "login attempt with wrong password");
            Err(AppError::unauthorized("invalid credentials"))
        }
    }
}

/// List registered users (id and username only).
async fn list_users(
    State(state): State<AuthState>,
    identity: Identity,
) -> Result<Json<Vec<PublicUser>>, AppError> {
    let users = state
        .store
        .list()
        .await
        .map_err(|error| AppError::Internal(error.into()))?;

    tracing::debug!(user = %identity.username, count = users.len(), "users listed");

    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

fn openapi_fragment() -> serde_json::Value {
    serde_json::json!({
        "paths": {
            "/register": {
                "post": {
                    "summary": "Register a user",
                    "tags": ["Auth"],
                    "requestBody": {
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/Credentials"}
                            }
                        }
                    },
                    "responses": {
                        "201": {
                            "description": "User registered",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/RegisterResponse"}
                                }
                            }
                        },
                        "400": {
                            "description": "Missing username or password",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/ErrorResponse"}
                                }
                            }
                        },
                        "409": {
                            "description": "Username already exists",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/ErrorResponse"}
                                }
                            }
                        }
                    }
                }
            },
            "/login": {
                "post": {
                    "summary": "Log in",
                    "tags": ["Auth"],
                    "requestBody": {
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/Credentials"}
                            }
                        }
                    },
                    "responses": {
                        "200": {
                            "description": "Bearer token",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/TokenResponse"}
                                }
                            }
                        },
                        "401": {
                            "description": "Invalid credentials",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/ErrorResponse"}
                                }
                            }
                        }
                    }
                }
            },
            "/users": {
                "get": {
                    "summary": "List users",
                    "tags": ["Auth"],
                    "responses": {
                        "200": {
                            "description": "Registered users",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "array",
                                        "items": {"$ref": "#/components/schemas/PublicUser"}
                                    }
                                }
                            }
                        },
                        "401": {
                            "description": "Missing or invalid bearer token",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/ErrorResponse"}
                                }
                            }
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Credentials": {
                    "type": "object",
                    "properties": {
                        "username": {"type": "string"},
                        "password": {"type": "string"}
                    },
                    "required": ["username", "password"]
                },
                "RegisterResponse": {
                    "type": "object",
                    "properties": {
                        "msg": {"type": "string"},
                        "user": {"$ref": "#/components/schemas/PublicUser"}
                    },
                    "required": ["msg", "user"]
                },
                "TokenResponse": {
                    "type": "object",
                    "properties": {
                        "token": {"type": "string"}
                    },
                    "required": ["token"]
                },
                "PublicUser": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "string", "format": "uuid"},
                        "username": {"type": "string"}
                    },
                    "required": ["id", "username"]
                }
            }
        }
    })
}

/// Create the auth module wired to the shared application context.
pub fn create_module(ctx: &AppContext) -> Arc<dyn Module> {
    Arc::new(AuthModule {
        state: AuthState {
            store: CredentialStore::new(ctx.db.clone()),
            tokens: ctx.tokens.clone(),
        },
    })
}
