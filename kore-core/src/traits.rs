//! # Engine Boundary Traits
//!
//! The three capabilities collaborators rely on: serialized batch writing,
//! point/prefix reading, and top-K vector scanning. The LSM engine implements
//! all three; façades that only need one can take the narrower bound.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::types::{Record, SearchHit};

/// Single-writer batch application. Writes are totally ordered by their WAL
/// position; a call returns once the writer-serialized region completes.
#[async_trait]
pub trait BatchWriter: Send + Sync {
    /// Apply a non-empty batch atomically. `urgent` forces the WAL to the
    /// device before returning.
    async fn write_batch(&self, batch: &[Record], urgent: bool) -> Result<()>;

    async fn put(&self, key: Bytes, value: Bytes) -> Result<()> {
        self.write_batch(&[Record::put(key, value)], false).await
    }

    async fn delete(&self, key: Bytes) -> Result<()> {
        self.write_batch(&[Record::tombstone(key)], false).await
    }
}

/// Point and prefix access with newest-wins resolution. Tombstoned keys read
/// as absent.
pub trait PointReader: Send + Sync {
    fn get(&self, key: &[u8]) -> Option<Bytes>;

    /// Live values for every key sharing `prefix`, ascending by key.
    fn scan_prefix(&self, prefix: &[u8]) -> Vec<Bytes>;

    /// Keys only, same contract as [`PointReader::scan_prefix`].
    fn scan_prefix_keys(&self, prefix: &[u8]) -> Vec<Bytes>;
}

/// Brute-force top-K similarity over encoded vector values under a prefix.
pub trait VectorScanner: Send + Sync {
    fn search_vectors(&self, prefix: &[u8], query: &[f32], k: usize) -> Vec<SearchHit>;
}
