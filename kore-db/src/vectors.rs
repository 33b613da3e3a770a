//! # Vector Façade
//!
//! Vectors live at `vec:<coll>:<id>` as `{magnitude, components}` payloads;
//! the KV store is always the source of truth. Each collection gets one
//! background indexer task that first hydrates the HNSW graph from a prefix
//! scan (yielding periodically), then consumes a channel fed by the write
//! path.
//!
//! Searches use the HNSW graph once it is warm and fall back to the brute
//! scan over MemTable + segments while it is cold. Recently written vectors
//! may trail the KV store by the channel backlog; that lag is bounded and
//! `drain` waits it out.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use kore_core::codec;
use kore_core::config::HnswConfig;
use kore_core::error::Result;
use kore_core::types::Record;
use kore_index::HnswIndex;
use kore_storage::LsmEngine;

use crate::keys;

/// Hydration yields to the runtime after this many inserts.
const HYDRATION_YIELD_EVERY: usize = 64;

enum IndexerMsg {
    Insert { id: String, vector: Vec<f32> },
    Drain(oneshot::Sender<()>),
}

struct CollectionIndex {
    index: Arc<HnswIndex>,
    tx: mpsc::UnboundedSender<IndexerMsg>,
}

pub struct VectorStore {
    engine: LsmEngine,
    config: HnswConfig,
    collections: RwLock<HashMap<String, Arc<CollectionIndex>>>,
}

impl VectorStore {
    pub(crate) fn new(engine: LsmEngine, config: HnswConfig) -> Self {
        Self {
            engine,
            config,
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Encode and persist one vector, then hand it to the indexer.
    pub async fn insert(&self, coll: &str, id: &str, vector: &[f32]) -> Result<()> {
        let key = keys::vec_key(coll, id)?;
        let value = codec::encode_vector(vector);
        let collection = self.collection(coll);

        self.engine.put(key, value).await?;
        let _ = collection.tx.send(IndexerMsg::Insert {
            id: id.to_string(),
            vector: vector.to_vec(),
        });
        Ok(())
    }

    /// Persist many vectors in one atomic batch, then feed the indexer.
    pub async fn insert_batch(&self, coll: &str, pairs: &[(String, Vec<f32>)]) -> Result<()> {
        if pairs.is_empty() {
            return Ok(());
        }
        let mut batch = Vec::with_capacity(pairs.len());
        for (id, vector) in pairs {
            batch.push(Record::put(
                keys::vec_key(coll, id)?,
                codec::encode_vector(vector),
            ));
        }
        let collection = self.collection(coll);

        self.engine.write_batch(&batch, false).await?;
        for (id, vector) in pairs {
            let _ = collection.tx.send(IndexerMsg::Insert {
                id: id.clone(),
                vector: vector.clone(),
            });
        }
        Ok(())
    }

    /// Top-K similarity search: HNSW when warm, brute KV scan when cold.
    pub async fn search(&self, coll: &str, query: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
        keys::check_component(coll)?;
        let collection = self.collection(coll);

        if !collection.index.is_empty() {
            return Ok(collection.index.search(query, k));
        }

        let prefix = keys::vec_prefix(coll);
        Ok(self
            .engine
            .search_vectors(&prefix, query, k)
            .into_iter()
            .filter_map(|hit| keys::last_component(&hit.key).map(|id| (id, hit.score)))
            .collect())
    }

    /// Wait until the collection's indexer has finished hydration and
    /// worked through everything queued before this call.
    pub async fn drain(&self, coll: &str) -> Result<()> {
        keys::check_component(coll)?;
        let collection = self.collection(coll);

        let (ack_tx, ack_rx) = oneshot::channel();
        if collection.tx.send(IndexerMsg::Drain(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
        Ok(())
    }

    /// Drop every per-collection index and indexer. Used by wipe; the next
    /// touch of a collection re-hydrates from the (now empty) KV store.
    pub(crate) fn reset(&self) {
        self.collections.write().clear();
    }

    /// Get or lazily create the collection's index and its indexer task.
    fn collection(&self, coll: &str) -> Arc<CollectionIndex> {
        if let Some(collection) = self.collections.read().get(coll) {
            return Arc::clone(collection);
        }

        let mut map = self.collections.write();
        if let Some(collection) = map.get(coll) {
            return Arc::clone(collection);
        }

        let index = Arc::new(HnswIndex::new(self.config.clone()));
        let (tx, rx) = mpsc::unbounded_channel();
        let collection = Arc::new(CollectionIndex {
            index: Arc::clone(&index),
            tx,
        });
        map.insert(coll.to_string(), Arc::clone(&collection));

        tokio::spawn(run_indexer(
            self.engine.clone(),
            coll.to_string(),
            index,
            rx,
        ));
        collection
    }
}

/// The single writer to one collection's HNSW graph: hydrate from the KV
/// store, then consume the live-insert channel until every sender is gone.
async fn run_indexer(
    engine: LsmEngine,
    coll: String,
    index: Arc<HnswIndex>,
    mut rx: mpsc::UnboundedReceiver<IndexerMsg>,
) {
    let prefix = keys::vec_prefix(&coll);
    let entries = engine.scan_prefix_entries(&prefix);
    let mut hydrated = 0usize;
    for (i, (key, value)) in entries.iter().enumerate() {
        if let Some(id) = keys::last_component(key) {
            if let Some((_, vector)) = codec::decode_vector(value) {
                index.insert(&id, vector);
                hydrated += 1;
            }
        }
        if (i + 1) % HYDRATION_YIELD_EVERY == 0 {
            tokio::task::yield_now().await;
        }
    }
    if hydrated > 0 {
        info!(collection = %coll, hydrated, "HNSW hydration complete");
    }

    while let Some(msg) = rx.recv().await {
        match msg {
            IndexerMsg::Insert { id, vector } => index.insert(&id, vector),
            IndexerMsg::Drain(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!(collection = %coll, "vector indexer stopped");
}
