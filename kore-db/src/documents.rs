//! # Document Collections
//!
//! Documents are opaque byte values at `doc:<coll>:<id>`; serialization is
//! the caller's concern. Secondary equality indices are maintained by
//! registered extractors: on every put, each extractor's string lands the
//! document id in the comma-joined list at `idx:<coll>:<name>:<value>`.
//!
//! Index entries are advisory. An update that changes an extracted value
//! leaves the old entry behind, so lookups resolve ids through `get` and
//! callers filter on the current document.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::debug;

use kore_core::error::Result;
use kore_core::types::Record;
use kore_storage::LsmEngine;

use crate::keys;
use crate::watch::ChangeHub;

/// Pulls an indexable string out of a document body; `None` skips the
/// document for that index.
pub type Extractor = Arc<dyn Fn(&[u8]) -> Option<String> + Send + Sync>;

pub struct Collection {
    name: String,
    engine: LsmEngine,
    hub: Arc<ChangeHub>,
    indexes: RwLock<HashMap<String, Extractor>>,
}

impl Collection {
    pub(crate) fn new(name: String, engine: LsmEngine, hub: Arc<ChangeHub>) -> Self {
        Self {
            name,
            engine,
            hub,
            indexes: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a secondary equality index. Only documents written after
    /// registration are indexed.
    pub fn register_index(
        &self,
        name: impl Into<String>,
        extractor: impl Fn(&[u8]) -> Option<String> + Send + Sync + 'static,
    ) {
        let name = name.into();
        debug!(collection = %self.name, index = %name, "registered secondary index");
        self.indexes.write().insert(name, Arc::new(extractor));
    }

    /// Write a document and its index entries in one atomic batch, then
    /// notify subscribers.
    pub async fn put(&self, id: &str, body: Bytes) -> Result<()> {
        let mut batch = vec![Record::put(keys::doc_key(&self.name, id)?, body.clone())];

        let extractors: Vec<(String, Extractor)> = self
            .indexes
            .read()
            .iter()
            .map(|(name, f)| (name.clone(), Arc::clone(f)))
            .collect();

        for (index_name, extract) in extractors {
            if let Some(value) = extract(&body) {
                let key = keys::doc_index_key(&self.name, &index_name, &value)?;
                let list = append_id(self.engine.get(&key), id);
                batch.push(Record::put(key, list));
            }
        }

        self.engine.write_batch(&batch, false).await?;
        self.hub.publish(&self.name, id);
        Ok(())
    }

    /// Delete the document body. Index entries stay behind as stale
    /// markers; lookups skip ids whose document is gone.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.engine.delete(keys::doc_key(&self.name, id)?).await?;
        self.hub.publish(&self.name, id);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<Bytes>> {
        Ok(self.engine.get(&keys::doc_key(&self.name, id)?))
    }

    /// `(id, body)` pairs for every live document whose id starts with
    /// `id_prefix`, ascending by id.
    pub fn scan(&self, id_prefix: &str) -> Vec<(String, Bytes)> {
        let prefix = keys::doc_prefix(&self.name, id_prefix);
        self.engine
            .scan_prefix_entries(&prefix)
            .into_iter()
            .filter_map(|(key, value)| keys::last_component(&key).map(|id| (id, value)))
            .collect()
    }

    /// Resolve a secondary index entry to live documents. Stale ids (doc
    /// deleted, or extracted value moved on) resolve to nothing or to a
    /// document the caller must re-check.
    pub fn find_by_index(&self, index_name: &str, value: &str) -> Result<Vec<(String, Bytes)>> {
        let key = keys::doc_index_key(&self.name, index_name, value)?;
        let Some(list) = self.engine.get(&key) else {
            return Ok(Vec::new());
        };

        let list = String::from_utf8_lossy(&list).into_owned();
        let mut out = Vec::new();
        for id in list.split(',').filter(|id| !id.is_empty()) {
            if let Some(body) = self.engine.get(&keys::doc_key(&self.name, id)?) {
                out.push((id.to_string(), body));
            }
        }
        Ok(out)
    }

    /// Subscribe to change signals for one document id, or `"*"` for the
    /// whole collection.
    pub fn watch(&self, id: &str) -> tokio::sync::mpsc::UnboundedReceiver<String> {
        self.hub.subscribe(&self.name, id)
    }
}

/// Append `id` to a comma-joined id list unless already present.
fn append_id(existing: Option<Bytes>, id: &str) -> Bytes {
    match existing {
        None => Bytes::from(id.to_string()),
        Some(list) => {
            let text = String::from_utf8_lossy(&list).into_owned();
            if text.split(',').any(|entry| entry == id) {
                list
            } else {
                Bytes::from(format!("{text},{id}"))
            }
        }
    }
}
