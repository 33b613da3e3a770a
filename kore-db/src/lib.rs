//! # KoreDB
//!
//! An embeddable, single-process database that unifies three workloads over
//! one ordered byte-keyed substrate:
//!
//! - a durable, crash-safe LSM key-value store
//! - HNSW vector similarity search layered on `vec:` key prefixes
//! - a property-graph overlay (nodes, typed edges, secondary indices,
//!   atomic multi-key transactions) expressed as key encodings
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                       Database                        │
//! ├───────────────┬───────────────────┬───────────────────┤
//! │  collections  │    graph overlay  │   vector façade   │
//! │  (documents + │  (nodes, edges,   │  (HNSW + brute    │
//! │   sec. index) │   prop indices)   │   fallback)       │
//! ├───────────────┴───────────────────┴───────────────────┤
//! │                  LsmEngine (kore-storage)             │
//! └───────────────────────────────────────────────────────┘
//! ```

pub mod database;
pub mod documents;
pub mod graph;
pub mod keys;
pub mod transaction;
pub mod vectors;
pub mod watch;

pub use database::Database;
pub use documents::Collection;
pub use graph::{Edge, GraphStore, Node};
pub use kore_core::config::{EngineConfig, HnswConfig};
pub use kore_core::error::{Error, Result};
pub use transaction::Transaction;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
