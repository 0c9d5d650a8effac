//! HTTP handlers for the books resource.

use std::sync::Arc;

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Request, State},
    http::{header::CONTENT_TYPE, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use bookshelf_http::error::AppError;
use thiserror::Error;
use time::OffsetDateTime;

use super::models::{BookId, BookListItem, BookPayload, BookResponse, FieldError};
use super::store::{BookStore, StoreError};

/// Shared state handed to every books handler.
#[derive(Clone)]
pub struct BooksState {
    pub store: Arc<dyn BookStore>,
}

impl BooksState {
    pub fn new(store: Arc<dyn BookStore>) -> Self {
        Self { store }
    }
}

/// Failure of a books operation.
#[derive(Debug, Error)]
pub enum BookError {
    #[error("invalid request: {message}")]
    InvalidRequest {
        message: String,
        field: Option<FieldError>,
    },

    #[error("book {0} not found")]
    NotFound(BookId),

    #[error("book store failure")]
    Persistence(#[from] StoreError),
}

impl BookError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            field: None,
        }
    }
}

impl From<FieldError> for BookError {
    fn from(field: FieldError) -> Self {
        Self::InvalidRequest {
            message: format!("{} {}", field.field, field.error),
            field: Some(field),
        }
    }
}

impl From<BookError> for AppError {
    fn from(error: BookError) -> Self {
        match error {
            BookError::InvalidRequest { message, field } => match field {
                Some(field) => AppError::invalid_fields(
                    vec![serde_json::json!(field)],
                    format!("Invalid request: {message}"),
                ),
                None => AppError::bad_request(format!("Invalid request: {message}")),
            },
            BookError::NotFound(_) => AppError::not_found("Book not found"),
            BookError::Persistence(source) => {
                AppError::Internal(anyhow::Error::new(source).context("book store operation failed"))
            }
        }
    }
}

impl IntoResponse for BookError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

/// Create/update body, decoded from JSON or from an urlencoded form
/// depending on the request's content type.
pub struct BookBody(pub BookPayload);

impl<S> FromRequest<S> for BookBody
where
    S: Send + Sync,
{
    type Rejection = BookError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));

        let payload = if is_form {
            let Form(payload) = Form::<BookPayload>::from_request(req, state)
                .await
                .map_err(|rejection| BookError::invalid(rejection.body_text()))?;
            payload
        } else {
            let Json(payload) = Json::<BookPayload>::from_request(req, state)
                .await
                .map_err(|rejection| BookError::invalid(rejection.body_text()))?;
            payload
        };

        Ok(Self(payload))
    }
}

/// Book id taken from the `{id}` path segment.
///
/// Path extractors run before the body is read, so a malformed id is
/// reported ahead of any body error and never reaches the store.
pub struct BookIdParam(pub BookId);

impl<S> FromRequestParts<S> for BookIdParam
where
    S: Send + Sync,
{
    type Rejection = BookError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| BookError::invalid(rejection.body_text()))?;

        raw.parse::<BookId>()
            .map(Self)
            .map_err(|e| BookError::invalid(e.to_string()))
    }
}

/// `POST /books`
pub async fn create_book(
    State(state): State<BooksState>,
    BookBody(payload): BookBody,
) -> Result<(StatusCode, Json<BookResponse>), BookError> {
    let new_book = payload.validate()?;

    let book = state.store.insert_one(new_book).await?;
    tracing::info!(id = %book.id, "book created");

    Ok((StatusCode::CREATED, Json(book.into())))
}

/// `GET /books/{id}`
pub async fn get_book(
    State(state): State<BooksState>,
    BookIdParam(id): BookIdParam,
) -> Result<Json<BookResponse>, BookError> {
    let book = state
        .store
        .find_by_id(&id)
        .await?
        .ok_or(BookError::NotFound(id))?;

    Ok(Json(book.into()))
}

/// `PUT /books/{id}`
///
/// Full replacement: an omitted author clears the stored one. There is no
/// version check, so concurrent updates to one book are last-write-wins.
pub async fn update_book(
    State(state): State<BooksState>,
    BookIdParam(id): BookIdParam,
    BookBody(payload): BookBody,
) -> Result<Json<BookResponse>, BookError> {
    let fields = payload.validate()?;

    let mut book = state
        .store
        .find_by_id(&id)
        .await?
        .ok_or(BookError::NotFound(id))?;

    book.replace_fields(fields, OffsetDateTime::now_utc());

    // Deleted between the fetch and the replace
    if !state.store.replace_by_id(&book).await? {
        return Err(BookError::NotFound(id));
    }
    tracing::info!(%id, "book updated");

    Ok(Json(book.into()))
}

/// `DELETE /books/{id}`
pub async fn delete_book(
    State(state): State<BooksState>,
    BookIdParam(id): BookIdParam,
) -> Result<Json<bool>, BookError> {
    if state.store.find_by_id(&id).await?.is_none() {
        return Err(BookError::NotFound(id));
    }
    if !state.store.delete_by_id(&id).await? {
        return Err(BookError::NotFound(id));
    }
    tracing::info!(%id, "book deleted");

    Ok(Json(true))
}

/// `GET /books`
///
/// Returns the whole collection; there is no paging.
pub async fn list_books(
    State(state): State<BooksState>,
) -> Result<Json<Vec<BookListItem>>, BookError> {
    let books = state.store.find_all().await.inspect_err(|e| {
        tracing::error!(error = %e, collection = %state.store.collection(), "listing books failed");
    })?;
    tracing::debug!(count = books.len(), "books listed");

    Ok(Json(books.into_iter().map(BookListItem::from).collect()))
}

/// Module health probe
pub async fn health_check() -> &'static str {
    "books module is healthy"
}
