pub mod handlers;
pub mod models;
pub mod routes;
pub mod store;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use async_trait::async_trait;
use bookshelf_kernel::{InitCtx, Module};
use axum::Router;
use serde_json::json;

use handlers::BooksState;
use store::BookStore;

/// Books module: CRUD over the book collection
pub struct BooksModule {
    state: BooksState,
}

impl BooksModule {
    pub fn new(store: Arc<dyn BookStore>) -> Self {
        Self {
            state: BooksState::new(store),
        }
    }
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
            collection = %self.state.store.collection(),
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
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

fn error_response(description: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}

fn book_response(description: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/Book" }
            }
        }
    })
}

fn id_parameter() -> serde_json::Value {
    json!({
        "name": "id",
        "in": "path",
        "required": true,
        "description": "24 character hexadecimal book id",
        "schema": { "type": "string", "pattern": "^[0-9a-fA-F]{24}$" }
    })
}

fn book_request_body() -> serde_json::Value {
    json!({
        "required": true,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/BookPayload" }
            },
            "application/x-www-form-urlencoded": {
                "schema": { "$ref": "#/components/schemas/BookPayload" }
            }
        }
    })
}

fn openapi_fragment() -> serde_json::Value {
    json!({
        "paths": {
            "/": {
                "get": {
                    "summary": "List books",
                    "tags": ["Books"],
                    "responses": {
                        "200": {
                            "description": "Every book, id and title only",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "array",
                                        "items": { "$ref": "#/components/schemas/BookListItem" }
                                    }
                                }
                            }
                        },
                        "500": error_response("Persistence error")
                    }
                },
                "post": {
                    "summary": "Create a book",
                    "tags": ["Books"],
                    "requestBody": book_request_body(),
                    "responses": {
                        "201": book_response("Created book"),
                        "400": error_response("Invalid request"),
                        "500": error_response("Persistence error")
                    }
                }
            },
            "/{id}": {
                "get": {
                    "summary": "Get a book",
                    "tags": ["Books"],
                    "parameters": [id_parameter()],
                    "responses": {
                        "200": book_response("The book"),
                        "400": error_response("Malformed id"),
                        "404": error_response("Book not found"),
                        "500": error_response("Persistence error")
                    }
                },
                "put": {
                    "summary": "Replace a book's title and author",
                    "tags": ["Books"],
                    "parameters": [id_parameter()],
                    "requestBody": book_request_body(),
                    "responses": {
                        "200": book_response("Updated book"),
                        "400": error_response("Malformed id or invalid request"),
                        "404": error_response("Book not found"),
                        "500": error_response("Persistence error")
                    }
                },
                "delete": {
                    "summary": "Delete a book",
                    "tags": ["Books"],
                    "parameters": [id_parameter()],
                    "responses": {
                        "200": {
                            "description": "Deleted",
                            "content": {
                                "application/json": { "schema": { "type": "boolean" } }
                            }
                        },
                        "400": error_response("Malformed id"),
                        "404": error_response("Book not found"),
                        "500": error_response("Persistence error")
                    }
                }
            },
            "/health": {
                "get": {
                    "summary": "Books health check",
                    "tags": ["Books"],
                    "responses": {
                        "200": {
                            "description": "OK",
                            "content": {
                                "text/plain": { "schema": { "type": "string" } }
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
                        "id": { "type": "string", "description": "Unique identifier for the book" },
                        "title": { "type": "string", "description": "Title of the book" },
                        "author": { "type": "string", "nullable": true, "description": "Author of the book" },
                        "createdAt": { "type": "string", "format": "date-time" },
                        "updatedAt": { "type": "string", "format": "date-time" }
                    },
                    "required": ["id", "title", "author", "createdAt", "updatedAt"]
                },
                "BookListItem": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "title": { "type": "string" }
                    },
                    "required": ["id", "title"]
                },
                "BookPayload": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string", "minLength": 1 },
                        "author": { "type": "string" }
                    },
                    "required": ["title"]
                }
            }
        }
    })
}

/// Create the books module around an already connected store
pub fn create_module(store: Arc<dyn BookStore>) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(store))
}
