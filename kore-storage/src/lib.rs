//! # KoreDB Storage
//!
//! The LSM substrate: an ordered in-memory MemTable in front of a
//! crash-safe write-ahead log, flushed into immutable bloom-filtered
//! segments that background compaction folds back together.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        LsmEngine                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  Write Path:                                                │
//! │  ┌───────┐    ┌───────┐    ┌──────────┐                     │
//! │  │ Batch │───>│  WAL  │───>│ MemTable │                     │
//! │  └───────┘    └───────┘    └────┬─────┘                     │
//! │                                 │ threshold flush           │
//! │                                 ▼                           │
//! │                           ┌──────────┐   compaction         │
//! │                           │ Segments │──────────────┐       │
//! │                           └──────────┘<─────────────┘       │
//! │                                                             │
//! │  Read Path:  MemTable ──> segments newest-first             │
//! │              (bloom check before each segment scan)         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod compaction;
pub mod engine;
pub mod manifest;
pub mod memtable;
pub mod sstable;
pub mod wal;

pub use engine::{EngineStats, LsmEngine};
pub use kore_core::config::EngineConfig;
