use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Random per-process bytes mixed into every generated identifier.
static PROCESS_NONCE: Lazy<[u8; 5]> = Lazy::new(|| {
    let bytes = Uuid::new_v4().into_bytes();
    [bytes[0], bytes[1], bytes[2], bytes[3], bytes[4]]
});

/// Wrapping 24-bit counter, seeded randomly.
static SEQUENCE: Lazy<AtomicU32> = Lazy::new(|| {
    let bytes = Uuid::new_v4().into_bytes();
    AtomicU32::new(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
});

/// Opaque book identifier: 12 bytes, written as 24 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BookId([u8; BookId::LEN]);

impl BookId {
    pub const LEN: usize = 12;

    pub const fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; Self::LEN] {
        self.0
    }

    /// Generate a fresh identifier.
    ///
    /// Layout: 4 bytes of Unix seconds, 5 bytes of process nonce, 3 bytes of
    /// counter. Only stores should call this; everyone else treats the id as
    /// opaque.
    pub fn generate() -> Self {
        let seconds = OffsetDateTime::now_utc().unix_timestamp() as u32;
        let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;

        let mut bytes = [0u8; Self::LEN];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&*PROCESS_NONCE);
        bytes[9..].copy_from_slice(&sequence.to_be_bytes()[1..]);
        Self(bytes)
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a valid book id; expected {len} hexadecimal characters", len = BookId::LEN * 2)]
pub struct ParseBookIdError(String);

impl FromStr for BookId {
    type Err = ParseBookIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseBookIdError(value.to_string());

        // from_str_radix alone would accept a leading '+'
        if value.len() != Self::LEN * 2 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let mut bytes = [0u8; Self::LEN];
        for (slot, pair) in bytes.iter_mut().zip(value.as_bytes().chunks_exact(2)) {
            let pair = std::str::from_utf8(pair).map_err(|_| invalid())?;
            *slot = u8::from_str_radix(pair, 16).map_err(|_| invalid())?;
        }
        Ok(Self(bytes))
    }
}

impl Serialize for BookId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BookId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// A persisted book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Book {
    /// Full replacement of the user-editable fields.
    ///
    /// `title` and `author` are overwritten even when the new author is
    /// absent. `updated_at` never moves backwards, so `created_at <=
    /// updated_at` survives clock skew.
    pub fn replace_fields(&mut self, fields: NewBook, now: OffsetDateTime) {
        self.title = fields.title;
        self.author = fields.author;
        self.updated_at = now.max(self.updated_at);
    }
}

/// Validated book fields, used to insert a book or replace one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub title: String,
    pub author: Option<String>,
}

/// Create/update request body.
///
/// Every field is optional at the decoding stage so a missing title is
/// reported by [`BookPayload::validate`] rather than by the body extractor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
}

/// A payload field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub error: &'static str,
}

impl BookPayload {
    pub fn validate(self) -> Result<NewBook, FieldError> {
        match self.title {
            Some(title) if !title.is_empty() => Ok(NewBook {
                title,
                author: self.author,
            }),
            Some(_) => Err(FieldError {
                field: "title",
                error: "must not be empty",
            }),
            None => Err(FieldError {
                field: "title",
                error: "required",
            }),
        }
    }
}

/// Full representation returned by create, read, and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookResponse {
    pub id: BookId,
    pub title: String,
    pub author: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
            author: book.author,
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}

/// Reduced projection returned by list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookListItem {
    pub id: BookId,
    pub title: String,
}

impl From<Book> for BookListItem {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
        }
    }
}
