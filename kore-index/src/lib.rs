//! # KoreDB Index
//!
//! Approximate nearest-neighbor search over the engine's vector key space.
//! The index is advisory: it never holds the sole copy of a vector, and the
//! `vec:` keys in the KV store remain the source of truth.

pub mod hnsw;

pub use hnsw::HnswIndex;
pub use kore_core::config::HnswConfig;
