pub mod models;
pub mod service;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use shelf_auth::{Identity, TokenService};
use shelf_http::error::AppError;
use shelf_kernel::{InitCtx, Migration, Module};

use crate::bootstrap::AppContext;
use models::{Book, CreateBookRequest, ListParams, PageResult, UpdateBookRequest};
use service::BookQueryService;

/// Shared state of the books routes.
#[derive(Clone)]
pub struct BooksState {
    pub service: Arc<BookQueryService>,
    pub tokens: Arc<TokenService>,
}

impl FromRef<BooksState> for Arc<TokenService> {
    fn from_ref(state: &BooksState) -> Self {
        state.tokens.clone()
    }
}

/// Books module: authenticated CRUD plus the cached paginated search.
pub struct BooksModule {
    state: BooksState,
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(list_books).post(create_book))
            .route("/{id}", get(get_book).put(update_book).delete(delete_book))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    fn migrations(&self) -> Vec<Migration> {
        migrations()
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Migrations contributed by the books module.
pub fn migrations() -> Vec<Migration> {
    vec![Migration {
        id: "001_books",
        up: r#"
            CREATE TABLE IF NOT EXISTS books (
                id          UUID PRIMARY KEY,
                title       TEXT NOT NULL,
                author      TEXT NOT NULL,
                year        INT NOT NULL,
                thumbnail   TEXT,
                created_seq BIGINT GENERATED ALWAYS AS IDENTITY
            );
            CREATE INDEX IF NOT EXISTS books_created_seq_idx
                ON books (created_seq DESC);
            "#,
    }]
}

/// List one page of books, optionally filtered by a title/author substring.
async fn list_books(
    State(state): State<BooksState>,
    identity: Identity,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<PageResult>, AppError> {
    let Query(params) = params.map_err(|_| AppError::bad_request("invalid query parameters"))?;
    let (page, limit, term) = params.sanitize();

    let result = state.service.list(page, limit, &term).await?;

    tracing::info!(
        user = %identity.username,
        page,
        limit,
        term = %term,
        "books searched"
    );

    Ok(Json(result))
}

/// Fetch a single book by id.
async fn get_book(
    State(state): State<BooksState>,
    _identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<Book>, AppError> {
    let id = parse_book_id(&id)?;
    let book = state.service.get(id).await?;
    Ok(Json(book))
}

/// Insert a new book.
async fn create_book(
    State(state): State<BooksState>,
    identity: Identity,
    payload: Result<Json<CreateBookRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    let Json(payload) = payload.map_err(|_| AppError::bad_request("invalid request body"))?;
    let new_book = payload.validate()?;

    let book = state.service.create(new_book).await?;

    tracing::info!(user = %identity.username, title = %book.title, "book created");

    Ok((StatusCode::CREATED, Json(book)))
}

/// Partially update a book.
async fn update_book(
    State(state): State<BooksState>,
    identity: Identity,
    Path(id): Path<String>,
    payload: Result<Json<UpdateBookRequest>, JsonRejection>,
) -> Result<Json<Book>, AppError> {
    let id = parse_book_id(&id)?;
    let Json(payload) = payload.map_err(|_| AppError::bad_request("invalid request body"))?;
    let changes = payload.validate()?;

    let book = state.service.update(id, &changes).await?;

    tracing::info!(user = %identity.username, title = %book.title, "book updated");

    Ok(Json(book))
}

/// Delete a book.
async fn delete_book(
    State(state): State<BooksState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_book_id(&id)?;

    state.service.delete(id).await?;

    tracing::info!(user = %identity.username, book_id = %id, "book deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// A malformed id is a bad request, distinct from a well-formed id that
/// matches nothing.
fn parse_book_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::bad_request("invalid book id"))
}

fn openapi_fragment() -> serde_json::Value {
    serde_json::json!({
        "paths": {
            "/": {
                "get": {
                    "summary": "List books",
                    "description": "Paginated, cached search over title and author",
                    "tags": ["Books"],
                    "parameters": [
                        {"name": "page", "in": "query", "schema": {"type": "integer", "default": 1}},
                        {"name": "limit", "in": "query", "schema": {"type": "integer", "default": 10}},
                        {"name": "title", "in": "query", "schema": {"type": "string"}}
                    ],
                    "responses": {
                        "200": {
                            "description": "One page of books",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/PageResult"}
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
                },
                "post": {
                    "summary": "Create a book",
                    "tags": ["Books"],
                    "requestBody": {
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/CreateBook"}
                            }
                        }
                    },
                    "responses": {
                        "201": {
                            "description": "Created book",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/Book"}
                                }
                            }
                        },
                        "400": {
                            "description": "Validation error",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/ErrorResponse"}
                                }
                            }
                        }
                    }
                }
            },
            "/{id}": {
                "get": {
                    "summary": "Fetch a book",
                    "tags": ["Books"],
                    "parameters": [
                        {"name": "id", "in": "path", "required": true, "schema": {"type": "string", "format": "uuid"}}
                    ],
                    "responses": {
                        "200": {
                            "description": "The book",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/Book"}
                                }
                            }
                        },
                        "400": {
                            "description": "Malformed id",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/ErrorResponse"}
                                }
                            }
                        },
                        "404": {
                            "description": "Unknown id",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/ErrorResponse"}
                                }
                            }
                        }
                    }
                },
                "put": {
                    "summary": "Partially update a book",
                    "tags": ["Books"],
                    "parameters": [
                        {"name": "id", "in": "path", "required": true, "schema": {"type": "string", "format": "uuid"}}
                    ],
                    "requestBody": {
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/UpdateBook"}
                            }
                        }
                    },
                    "responses": {
                        "200": {
                            "description": "Updated book",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/Book"}
                                }
                            }
                        },
                        "404": {
                            "description": "Unknown id",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/ErrorResponse"}
                                }
                            }
                        }
                    }
                },
                "delete": {
                    "summary": "Delete a book",
                    "tags": ["Books"],
                    "parameters": [
                        {"name": "id", "in": "path", "required": true, "schema": {"type": "string", "format": "uuid"}}
                    ],
                    "responses": {
                        "204": {"description": "Deleted"},
                        "404": {
                            "description": "Unknown id",
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
                "Book": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "string", "format": "uuid"},
                        "title": {"type": "string"},
                        "author": {"type": "string"},
                        "year": {"type": "integer"},
                        "thumbnail": {"type": "string", "nullable": true}
                    },
                    "required": ["id", "title", "author", "year"]
                },
                "CreateBook": {
                    "type": "object",
                    "properties": {
                        "title": {"type": "string"},
                        "author": {"type": "string"},
                        "year": {"type": "integer"},
                        "thumbnail": {"type": "string"}
                    },
                    "required": ["title", "author", "year"]
                },
                "UpdateBook": {
                    "type": "object",
                    "properties": {
                        "title": {"type": "string"},
                        "author": {"type": "string"},
                        "year": {"type": "integer"},
                        "thumbnail": {"type": "string"}
                    }
                },
                "PageResult": {
                    "type": "object",
                    "properties": {
                        "page": {"type": "integer"},
                        "limit": {"type": "integer"},
                        "totalPages": {"type": "integer"},
                        "totalItems": {"type": "integer"},
                        "data": {
                            "type": "array",
                            "items": {"$ref": "#/components/schemas/Book"}
                        }
                    },
                    "required": ["page", "limit", "totalPages", "totalItems", "data"]
                }
            }
        }
    })
}

/// Create the books module wired to the shared application context.
pub fn create_module(ctx: &AppContext) -> Arc<dyn Module> {
    let store = store::BookStore::new(ctx.db.clone());
    let service = Arc::new(BookQueryService::new(store, ctx.cache.clone()));

    Arc::new(BooksModule {
        state: BooksState {
            service,
            tokens: ctx.tokens.clone(),
        },
    })
}
