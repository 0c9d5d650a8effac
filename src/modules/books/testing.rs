//! In-process [`BookStore`] for handler tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::models::{Book, BookId, NewBook};
use super::store::{BookStore, StoreError};

/// Keeps books in insertion order. `failing()` makes every call time out.
#[derive(Default)]
pub struct MemoryBookStore {
    books: RwLock<Vec<Book>>,
    failing: bool,
    writes_miss: bool,
    calls: AtomicUsize,
}

impl MemoryBookStore {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Reads still see every book, but replace and delete find nothing, as
    /// if another request deleted the book in between.
    pub fn deleted_concurrently() -> Self {
        Self {
            writes_miss: true,
            ..Self::default()
        }
    }

    /// Number of store calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self, op: &'static str) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(StoreError::Timeout {
                op,
                after: Duration::from_millis(1),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BookStore for MemoryBookStore {
    fn collection(&self) -> &str {
        "memory"
    }

    async fn insert_one(&self, book: NewBook) -> Result<Book, StoreError> {
        self.enter("insert_one")?;
        let now = OffsetDateTime::now_utc();
        let book = Book {
            id: BookId::generate(),
            title: book.title,
            author: book.author,
            created_at: now,
            updated_at: now,
        };
        self.books.write().await.push(book.clone());
        Ok(book)
    }

    async fn find_by_id(&self, id: &BookId) -> Result<Option<Book>, StoreError> {
        self.enter("find_by_id")?;
        Ok(self
            .books
            .read()
            .await
            .iter()
            .find(|book| book.id == *id)
            .cloned())
    }

    async fn find_all(&self) -> Result<Vec<Book>, StoreError> {
        self.enter("find_all")?;
        Ok(self.books.read().await.clone())
    }

    async fn replace_by_id(&self, book: &Book) -> Result<bool, StoreError> {
        self.enter("replace_by_id")?;
        if self.writes_miss {
            return Ok(false);
        }
        let mut books = self.books.write().await;
        match books.iter_mut().find(|stored| stored.id == book.id) {
            Some(stored) => {
                *stored = book.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_by_id(&self, id: &BookId) -> Result<bool, StoreError> {
        self.enter("delete_by_id")?;
        if self.writes_miss {
            return Ok(false);
        }
        let mut books = self.books.write().await;
        let before = books.len();
        books.retain(|book| book.id != *id);
        Ok(books.len() != before)
    }
}
