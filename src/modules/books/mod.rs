pub mod models;
pub mod routes;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use serde_json::{json, Value};
use shelf_kernel::{InitCtx, Module};

pub use routes::BooksState;
pub use store::{BookStore, PlatformBookStore};

/// Books module: the caller's personal reading list
pub struct BooksModule {
    state: BooksState,
}

impl BooksModule {
    pub fn new(state: BooksState) -> Self {
        Self { state }
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
            table = %ctx.settings.platform.table,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.state.clone())
    }

    fn openapi(&self) -> Option<Value> {
        Some(openapi_fragment())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create a new instance of the books module
pub fn create_module(state: BooksState) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(state))
}

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}

fn book_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/Book" }
            }
        }
    })
}

fn openapi_fragment() -> Value {
    let id_param = json!({
        "name": "id",
        "in": "path",
        "required": true,
        "schema": { "type": "string", "format": "uuid" }
    });
    let status_schema = json!({
        "type": "string",
        "enum": ["reading", "completed", "wishlist"]
    });
    let security = json!([{ "bearerAuth": [] }]);

    json!({
        "paths": {
            "/books": {
                "get": {
                    "summary": "List the caller's books in creation order",
                    "tags": ["Books"],
                    "security": security,
                    "parameters": [{
                        "name": "status",
                        "in": "query",
                        "required": false,
                        "schema": status_schema
                    }],
                    "responses": {
                        "200": {
                            "description": "Books owned by the caller",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "array",
                                        "items": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            }
                        },
                        "400": error_response("Invalid status filter"),
                        "401": error_response("Missing or invalid bearer token"),
                        "503": error_response("Platform unavailable")
                    }
                },
                "post": {
                    "summary": "Add a book",
                    "tags": ["Books"],
                    "security": security,
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": { "$ref": "#/components/schemas/CreateBook" }
                            }
                        }
                    },
                    "responses": {
                        "201": book_response("Created book"),
                        "400": error_response("Validation error"),
                        "401": error_response("Missing or invalid bearer token"),
                        "503": error_response("Platform unavailable")
                    }
                }
            },
            "/books/{id}": {
                "patch": {
                    "summary": "Change a book's status",
                    "tags": ["Books"],
                    "security": security,
                    "parameters": [id_param],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": { "$ref": "#/components/schemas/UpdateBookStatus" }
                            }
                        }
                    },
                    "responses": {
                        "200": book_response("Updated book"),
                        "400": error_response("Validation error"),
                        "401": error_response("Missing or invalid bearer token"),
                        "404": error_response("Book not found"),
                        "503": error_response("Platform unavailable")
                    }
                },
                "delete": {
                    "summary": "Delete a book",
                    "tags": ["Books"],
                    "security": security,
                    "parameters": [id_param],
                    "responses": {
                        "204": { "description": "Deleted" },
                        "400": error_response("Invalid id"),
                        "401": error_response("Missing or invalid bearer token"),
                        "404": error_response("Book not found"),
                        "503": error_response("Platform unavailable")
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Book": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "format": "uuid" },
                        "user_id": { "type": "string" },
                        "title": { "type": "string" },
                        "author": { "type": "string" },
                        "status": status_schema,
                        "created_at": { "type": "string", "format": "date-time" }
                    },
                    "required": ["id", "user_id", "title", "author", "status", "created_at"]
                },
                "CreateBook": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string", "minLength": 1 },
                        "author": { "type": "string", "minLength": 1 },
                        "status": status_schema
                    },
                    "required": ["title", "author"]
                },
                "UpdateBookStatus": {
                    "type": "object",
                    "properties": { "status": status_schema },
                    "required": ["status"],
                    "additionalProperties": false
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_documents_every_book_route() {
        let doc = openapi_fragment();

        assert!(doc["paths"]["/books"]["get"].is_object());
        assert!(doc["paths"]["/books"]["post"].is_object());
        assert!(doc["paths"]["/books/{id}"]["patch"].is_object());
        assert!(doc["paths"]["/books/{id}"]["delete"].is_object());
        assert_eq!(
            doc["components"]["schemas"]["Book"]["properties"]["status"]["enum"],
            json!(["reading", "completed", "wishlist"])
        );
    }
}
