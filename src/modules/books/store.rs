//! Book persistence.
//!
//! [`BookStore`] is the contract the handlers depend on; [`SurrealBookStore`]
//! implements it against one SurrealDB table.

use std::future::{Future, IntoFuture};
use std::time::Duration;

use async_trait::async_trait;
use bookshelf_db::SurrealClient;
use bookshelf_kernel::settings::DatabaseSettings;
use serde::{de::IgnoredAny, Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use super::models::{Book, BookId, NewBook};

/// Failure of a single store call.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    #[error("{op} failed")]
    Database {
        op: &'static str,
        #[source]
        source: surrealdb::Error,
    },

    #[error("stored book document is malformed: {0}")]
    Corrupt(String),
}

/// Access to the book collection.
///
/// Implementations must be safe to share between concurrent requests.
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Name of the backing collection, for diagnostics.
    fn collection(&self) -> &str;

    /// Persist a new book. The store assigns the id and sets both timestamps
    /// to the same instant.
    async fn insert_one(&self, book: NewBook) -> Result<Book, StoreError>;

    async fn find_by_id(&self, id: &BookId) -> Result<Option<Book>, StoreError>;

    /// Every book, in whatever order the backend yields them.
    async fn find_all(&self) -> Result<Vec<Book>, StoreError>;

    /// Replace the stored document with `book`. Returns `false` when no
    /// document has that id.
    async fn replace_by_id(&self, book: &Book) -> Result<bool, StoreError>;

    /// Returns `false` when no document has that id.
    async fn delete_by_id(&self, id: &BookId) -> Result<bool, StoreError>;
}

const SELECT_BY_ID: &str = "SELECT record::id(id) AS id, title, author, created_at, updated_at \
     FROM type::thing($table, $id)";
const SELECT_ALL: &str = "SELECT record::id(id) AS id, title, author, created_at, updated_at \
     FROM type::table($table)";

/// Document body as written to SurrealDB; the id lives in the record key.
#[derive(Debug, Serialize)]
struct BookRecord {
    title: String,
    author: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

impl From<&Book> for BookRecord {
    fn from(book: &Book) -> Self {
        Self {
            title: book.title.clone(),
            author: book.author.clone(),
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}

/// Row shape of [`SELECT_BY_ID`] and [`SELECT_ALL`].
#[derive(Debug, Deserialize)]
struct BookRow {
    id: String,
    title: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

impl TryFrom<BookRow> for Book {
    type Error = StoreError;

    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        let id = row
            .id
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("{e}")))?;
        Ok(Book {
            id,
            title: row.title,
            author: row.author,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// [`BookStore`] backed by a SurrealDB table.
#[derive(Clone)]
pub struct SurrealBookStore {
    client: SurrealClient,
    table: String,
    deadline: Duration,
}

impl SurrealBookStore {
    pub fn new(client: SurrealClient, settings: &DatabaseSettings) -> Self {
        Self {
            client,
            table: settings.collection.clone(),
            deadline: Duration::from_millis(settings.query_timeout_ms),
        }
    }

    /// Run one database call under the configured deadline.
    async fn bounded<T, F>(&self, op: &'static str, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, surrealdb::Error>>,
    {
        match tokio::time::timeout(self.deadline, call).await {
            Ok(result) => result.map_err(|source| StoreError::Database { op, source }),
            Err(_) => Err(StoreError::Timeout {
                op,
                after: self.deadline,
            }),
        }
    }

    async fn select(
        &self,
        op: &'static str,
        query: &'static str,
        id: Option<&BookId>,
    ) -> Result<Vec<Book>, StoreError> {
        let rows: Vec<BookRow> = self
            .bounded(op, async {
                let mut request = self.client.query(query).bind(("table", self.table.clone()));
                if let Some(id) = id {
                    request = request.bind(("id", id.to_string()));
                }
                request.await?.take(0)
            })
            .await?;

        rows.into_iter().map(Book::try_from).collect()
    }
}

#[async_trait]
impl BookStore for SurrealBookStore {
    fn collection(&self) -> &str {
        &self.table
    }

    async fn insert_one(&self, book: NewBook) -> Result<Book, StoreError> {
        let now = OffsetDateTime::now_utc();
        let book = Book {
            id: BookId::generate(),
            title: book.title,
            author: book.author,
            created_at: now,
            updated_at: now,
        };

        let _: Option<IgnoredAny> = self
            .bounded(
                "insert_one",
                self.client
                    .create((self.table.as_str(), book.id.to_string()))
                    .content(BookRecord::from(&book))
                    .into_future(),
            )
            .await?;

        tracing::debug!(collection = %self.table, id = %book.id, "book inserted");
        Ok(book)
    }

    async fn find_by_id(&self, id: &BookId) -> Result<Option<Book>, StoreError> {
        let books = self.select("find_by_id", SELECT_BY_ID, Some(id)).await?;
        Ok(books.into_iter().next())
    }

    async fn find_all(&self) -> Result<Vec<Book>, StoreError> {
        self.select("find_all", SELECT_ALL, None).await
    }

    async fn replace_by_id(&self, book: &Book) -> Result<bool, StoreError> {
        let written: Option<IgnoredAny> = self
            .bounded(
                "replace_by_id",
                self.client
                    .update((self.table.as_str(), book.id.to_string()))
                    .content(BookRecord::from(book))
                    .into_future(),
            )
            .await?;
        Ok(written.is_some())
    }

    async fn delete_by_id(&self, id: &BookId) -> Result<bool, StoreError> {
        let deleted: Option<IgnoredAny> = self
            .bounded(
                "delete_by_id",
                self.client
                    .delete((self.table.as_str(), id.to_string()))
                    .into_future(),
            )
            .await?;
        Ok(deleted.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookshelf_db::Database;

    async fn mem_store() -> (Database, SurrealBookStore) {
        let settings = DatabaseSettings {
            endpoint: "mem://".to_string(),
            namespace: "test".to_string(),
            database: "test".to_string(),
            ..DatabaseSettings::default()
        };
        let database = Database::connect(&settings).await.unwrap();
        let store = SurrealBookStore::new(database.client(), &settings);
        (database, store)
    }

    fn dune() -> NewBook {
        NewBook {
            title: "Dune".to_string(),
            author: Some("Herbert".to_string()),
        }
    }

    #[tokio::test]
    async fn insert_assigns_id_and_equal_timestamps() {
        let (_db, store) = mem_store().await;
        let book = store.insert_one(dune()).await.unwrap();

        assert_eq!(book.title, "Dune");
        assert_eq!(book.created_at, book.updated_at);
        assert_eq!(store.find_by_id(&book.id).await.unwrap(), Some(book));
    }

    #[tokio::test]
    async fn missing_author_round_trips_as_none() {
        let (_db, store) = mem_store().await;
        let book = store
            .insert_one(NewBook {
                title: "Anonymous".to_string(),
                author: None,
            })
            .await
            .unwrap();

        let found = store.find_by_id(&book.id).await.unwrap().unwrap();
        assert_eq!(found.author, None);
    }

    #[tokio::test]
    async fn find_by_unknown_id_is_none() {
        let (_db, store) = mem_store().await;
        let id: BookId = "ffffffffffffffffffffffff".parse().unwrap();
        assert_eq!(store.find_by_id(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn find_all_returns_every_book() {
        let (_db, store) = mem_store().await;
        assert!(store.find_all().await.unwrap().is_empty());

        let first = store.insert_one(dune()).await.unwrap();
        let second = store
            .insert_one(NewBook {
                title: "Hyperion".to_string(),
                author: Some("Simmons".to_string()),
            })
            .await
            .unwrap();

        let mut ids: Vec<BookId> = store
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|book| book.id)
            .collect();
        ids.sort();
        let mut expected = vec![first.id, second.id];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn replace_overwrites_document() {
        let (_db, store) = mem_store().await;
        let mut book = store.insert_one(dune()).await.unwrap();

        book.replace_fields(
            NewBook {
                title: "Dune Messiah".to_string(),
                author: None,
            },
            OffsetDateTime::now_utc(),
        );
        assert!(store.replace_by_id(&book).await.unwrap());

        let stored = store.find_by_id(&book.id).await.unwrap().unwrap();
        assert_eq!(stored, book);
    }

    #[tokio::test]
    async fn replace_and_delete_report_missing_documents() {
        let (_db, store) = mem_store().await;
        let book = store.insert_one(dune()).await.unwrap();

        assert!(store.delete_by_id(&book.id).await.unwrap());
        assert!(!store.delete_by_id(&book.id).await.unwrap());
        assert!(!store.replace_by_id(&book).await.unwrap());
        assert_eq!(store.find_by_id(&book.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_deadline_maps_to_timeout() {
        let (_db, store) = mem_store().await;
        let store = SurrealBookStore {
            deadline: Duration::from_millis(10),
            ..store
        };

        let result = store
            .bounded("sleepy", async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<(), surrealdb::Error>(())
            })
            .await;

        assert!(matches!(
            result,
            Err(StoreError::Timeout { op: "sleepy", .. })
        ));
    }
}
