//! # Database Coordinator
//!
//! The single process-wide owner of one data directory: it opens the
//! engine, hands out collection and graph façades, and funnels every write
//! through the engine's single-writer discipline. No global mutable state
//! exists beyond the instance the caller owns.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::info;

use kore_core::config::{EngineConfig, HnswConfig};
use kore_core::error::Result;
use kore_core::types::{Record, SearchHit};
use kore_storage::{EngineStats, LsmEngine};

use crate::documents::Collection;
use crate::graph::GraphStore;
use crate::transaction::Transaction;
use crate::vectors::VectorStore;
use crate::watch::ChangeHub;

struct DbInner {
    engine: LsmEngine,
    vectors: VectorStore,
    graph: GraphStore,
    hub: Arc<ChangeHub>,
    collections: RwLock<HashMap<String, Arc<Collection>>>,
}

/// Handle to one open database. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DbInner>,
}

impl Database {
    /// Open (or create) a database at `dir` with default configuration.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(dir, EngineConfig::default(), HnswConfig::default()).await
    }

    pub async fn open_with_config(
        dir: impl AsRef<Path>,
        engine_config: EngineConfig,
        hnsw_config: HnswConfig,
    ) -> Result<Self> {
        let engine = LsmEngine::open(dir.as_ref(), engine_config).await?;
        let vectors = VectorStore::new(engine.clone(), hnsw_config);
        let graph = GraphStore::new(engine.clone());

        info!(dir = ?dir.as_ref(), "opened database");
        Ok(Self {
            inner: Arc::new(DbInner {
                engine,
                vectors,
                graph,
                hub: Arc::new(ChangeHub::new()),
                collections: RwLock::new(HashMap::new()),
            }),
        })
    }

    /// Stop accepting writes and force the WAL down.
    pub async fn close(&self) -> Result<()> {
        self.inner.engine.close().await
    }

    /// Testing hook: drop all data and restart empty.
    pub async fn wipe(&self) -> Result<()> {
        self.inner.engine.wipe().await?;
        self.inner.vectors.reset();
        Ok(())
    }

    /// The underlying engine, for callers that want raw KV access.
    pub fn engine(&self) -> &LsmEngine {
        &self.inner.engine
    }

    pub fn stats(&self) -> EngineStats {
        self.inner.engine.stats()
    }

    // ------------------------------------------------------------------
    // Raw KV surface
    // ------------------------------------------------------------------

    pub async fn put(&self, key: Bytes, value: Bytes) -> Result<()> {
        self.inner.engine.put(key, value).await
    }

    pub async fn delete(&self, key: Bytes) -> Result<()> {
        self.inner.engine.delete(key).await
    }

    pub async fn write_batch(&self, batch: &[Record], urgent: bool) -> Result<()> {
        self.inner.engine.write_batch(batch, urgent).await
    }

    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.inner.engine.get(key)
    }

    pub fn scan_prefix(&self, prefix: &[u8]) -> Vec<Bytes> {
        self.inner.engine.scan_prefix(prefix)
    }

    pub fn scan_prefix_keys(&self, prefix: &[u8]) -> Vec<Bytes> {
        self.inner.engine.scan_prefix_keys(prefix)
    }

    pub fn search_vectors(&self, prefix: &[u8], query: &[f32], k: usize) -> Vec<SearchHit> {
        self.inner.engine.search_vectors(prefix, query, k)
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Get or create the named document collection façade.
    pub fn collection(&self, name: &str) -> Arc<Collection> {
        if let Some(coll) = self.inner.collections.read().get(name) {
            return Arc::clone(coll);
        }

        let mut map = self.inner.collections.write();
        if let Some(coll) = map.get(name) {
            return Arc::clone(coll);
        }
        let coll = Arc::new(Collection::new(
            name.to_string(),
            self.inner.engine.clone(),
            Arc::clone(&self.inner.hub),
        ));
        map.insert(name.to_string(), Arc::clone(&coll));
        coll
    }

    // ------------------------------------------------------------------
    // Graph
    // ------------------------------------------------------------------

    pub fn graph(&self) -> &GraphStore {
        &self.inner.graph
    }

    /// Run `block` against a buffered transaction: commit on `Ok`, discard
    /// on `Err`. The batch becomes visible atomically or not at all.
    pub async fn transaction<F>(&self, block: F) -> Result<()>
    where
        F: FnOnce(&mut Transaction) -> Result<()>,
    {
        let mut tx = self.begin_transaction();
        match block(&mut tx) {
            Ok(()) => tx.commit(false).await,
            Err(e) => {
                tx.rollback()?;
                Err(e)
            }
        }
    }

    /// A transaction the caller commits or rolls back explicitly.
    pub fn begin_transaction(&self) -> Transaction {
        Transaction::new(self.inner.engine.clone())
    }

    // ------------------------------------------------------------------
    // Vectors
    // ------------------------------------------------------------------

    pub async fn vector_insert(&self, coll: &str, id: &str, vector: &[f32]) -> Result<()> {
        self.inner.vectors.insert(coll, id, vector).await
    }

    pub async fn vector_insert_batch(
        &self,
        coll: &str,
        pairs: &[(String, Vec<f32>)],
    ) -> Result<()> {
        self.inner.vectors.insert_batch(coll, pairs).await
    }

    pub async fn vector_search(
        &self,
        coll: &str,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<(String, f32)>> {
        self.inner.vectors.search(coll, query, k).await
    }

    /// Await vector-indexer quiescence for a collection.
    pub async fn vector_drain(&self, coll: &str) -> Result<()> {
        self.inner.vectors.drain(coll).await
    }
}
