use axum::{routing::get, Router};

use super::handlers::{
    create_book, delete_book, get_book, health_check, list_books, update_book, BooksState,
};

/// HTTP routes of the books module, relative to its mount path.
pub fn router(state: BooksState) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/health", get(health_check))
        .route("/{id}", get(get_book).put(update_book).delete(delete_book))
        .with_state(state)
}
