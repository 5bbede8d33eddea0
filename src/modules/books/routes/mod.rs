//! HTTP handlers for the Books module.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRef, Path, Query, State,
    },
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use shelf_authz::{Caller, TokenVerifier};
use shelf_http::error::AppError;

use super::models::{parse_book_id, Book, CreateBook, ListBooksQuery, UpdateBookStatus};
use super::store::BookStore;

/// Shared handler state. Immutable; cloned per request.
#[derive(Clone)]
pub struct BooksState {
    pub store: Arc<dyn BookStore>,
    pub verifier: Arc<TokenVerifier>,
}

impl FromRef<BooksState> for Arc<TokenVerifier> {
    fn from_ref(state: &BooksState) -> Self {
        state.verifier.clone()
    }
}

pub fn router(state: BooksState) -> Router {
    Router::new()
        .route("/books", get(list_books).post(create_book))
        .route("/books/{id}", patch(update_book_status).delete(delete_book))
        .with_state(state)
}

async fn create_book(
    State(state): State<BooksState>,
    caller: Caller,
    payload: Result<Json<CreateBook>, JsonRejection>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    let Json(payload) = payload.map_err(body_error)?;
    let new_book = payload.validate(caller.user_id())?;

    let book = state.store.create(&caller, new_book).await?;
    tracing::info!(user_id = caller.user_id(), book_id = %book.id, "book created");

    Ok((StatusCode::CREATED, Json(book)))
}

async fn list_books(
    State(state): State<BooksState>,
    caller: Caller,
    query: Result<Query<ListBooksQuery>, QueryRejection>,
) -> Result<Json<Vec<Book>>, AppError> {
    let Query(query) =
        query.map_err(|rejection| AppError::invalid_field("status", rejection.body_text()))?;
    let status = query.validate()?;

    let books = state.store.list(&caller, status).await?;
    tracing::debug!(
        user_id = caller.user_id(),
        status = ?status,
        count = books.len(),
        "books listed"
    );

    Ok(Json(books))
}

async fn update_book_status(
    State(state): State<BooksState>,
    caller: Caller,
    Path(id): Path<String>,
    payload: Result<Json<UpdateBookStatus>, JsonRejection>,
) -> Result<Json<Book>, AppError> {
    let id = parse_book_id(&id)?;
    let Json(payload) = payload.map_err(body_error)?;
    let status = payload.validate()?;

    let book = state
        .store
        .update_status(&caller, id, status)
        .await?
        .ok_or_else(|| AppError::not_found("Book not found"))?;
    tracing::info!(user_id = caller.user_id(), book_id = %id, %status, "book status updated");

    Ok(Json(book))
}

async fn delete_book(
    State(state): State<BooksState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_book_id(&id)?;

    if !state.store.delete(&caller, id).await? {
        return Err(AppError::not_found("Book not found"));
    }
    tracing::info!(user_id = caller.user_id(), book_id = %id, "book deleted");

    Ok(StatusCode::NO_CONTENT)
}

fn body_error(rejection: JsonRejection) -> AppError {
    AppError::validation(
        vec![serde_json::json!({ "field": "body", "error": rejection.body_text() })],
        "Malformed request body",
    )
}
