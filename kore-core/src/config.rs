//! # Configuration
//!
//! Tunables for the storage engine and the vector index, with defaults sized
//! for an embedded single-process deployment.

use serde::{Deserialize, Serialize};

/// Storage engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// MemTable size at which the engine flushes to a new segment.
    pub memtable_flush_bytes: usize,
    /// Segment count at which background compaction starts.
    pub compaction_trigger: usize,
    /// Sample every Nth key into a segment's sparse in-memory index.
    pub sparse_index_interval: usize,
    /// Bloom filter bits allocated per key.
    pub bloom_bits_per_key: usize,
    /// Force every WAL batch to the device, not only urgent ones.
    pub wal_sync_on_write: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memtable_flush_bytes: 4 * 1024 * 1024, // 4MB
            compaction_trigger: 3,
            sparse_index_interval: 256,
            bloom_bits_per_key: 10,
            wal_sync_on_write: false,
        }
    }
}

/// HNSW vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Max neighbors per node per layer (M).
    pub m: usize,
    /// Candidate pool size during insert.
    pub ef_construction: usize,
    /// Candidate pool size during search (raised to `k` when `k` is larger).
    pub ef_search: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 50,
        }
    }
}

impl HnswConfig {
    /// Level sampling multiplier, `1 / ln(M)`.
    pub fn level_mult(&self) -> f64 {
        1.0 / (self.m as f64).ln()
    }
}
