//! # Core Types
//!
//! The engine speaks one language: ordered byte keys mapped to byte values.
//! A zero-length value is the tombstone; callers that need a legitimate
//! "empty" must encode a sentinel of their own.

use bytes::Bytes;

/// Ordered sequence of bytes. Ordering is unsigned-byte lexicographic,
/// which is exactly the `Ord` impl of `[u8]`.
pub type Key = Bytes;

/// Byte value. Empty means tombstone.
pub type Value = Bytes;

/// A single key-value mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Key,
    pub value: Value,
}

impl Record {
    /// Build a put record.
    pub fn put(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Build a deletion record (empty value).
    pub fn tombstone(key: impl Into<Key>) -> Self {
        Self {
            key: key.into(),
            value: Bytes::new(),
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.value.is_empty()
    }
}

/// Non-empty ordered list of records applied atomically.
pub type Batch = Vec<Record>;

/// A scored vector search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub key: Key,
    pub score: f32,
}
