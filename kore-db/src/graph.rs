//! # Property-Graph Overlay
//!
//! Nodes and typed edges are key encodings over the substrate. Every edge
//! is dual-written (outbound and inbound) so traversals in either direction
//! are O(results) prefix scans over keys alone, never touching edge bodies.
//!
//! Label and property index keys are presence markers. Removal leaves
//! markers behind as stale entries; lookups that matter resolve the node or
//! edge body and filter on current state.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use kore_core::error::{Error, Result};
use kore_core::types::Record;
use kore_storage::LsmEngine;

use crate::keys;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Node {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            labels: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub src: String,
    pub dst: String,
    pub edge_type: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Edge {
    pub fn new(
        src: impl Into<String>,
        edge_type: impl Into<String>,
        dst: impl Into<String>,
    ) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            edge_type: edge_type.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Records for one node: the body plus label and property markers.
pub(crate) fn node_records(node: &Node) -> Result<Vec<Record>> {
    let body = encode(node)?;
    let mut records = vec![Record::put(keys::node_key(&node.id)?, body)];

    for label in &node.labels {
        records.push(Record::put(
            keys::node_label_key(label, &node.id)?,
            Bytes::from_static(keys::PRESENCE),
        ));
        for (key, value) in &node.properties {
            records.push(Record::put(
                keys::node_prop_key(label, key, value, &node.id)?,
                Bytes::from_static(keys::PRESENCE),
            ));
        }
    }
    Ok(records)
}

/// Records for one edge: the dual bodies plus property markers.
pub(crate) fn edge_records(edge: &Edge) -> Result<Vec<Record>> {
    let body = encode(edge)?;
    let mut records = vec![
        Record::put(
            keys::edge_out_key(&edge.src, &edge.edge_type, &edge.dst)?,
            body.clone(),
        ),
        Record::put(
            keys::edge_in_key(&edge.src, &edge.edge_type, &edge.dst)?,
            body,
        ),
    ];

    for (key, value) in &edge.properties {
        records.push(Record::put(
            keys::edge_prop_key(&edge.edge_type, key, value, &edge.src, &edge.dst)?,
            Bytes::from_static(keys::PRESENCE),
        ));
    }
    Ok(records)
}

fn encode<T: Serialize>(value: &T) -> Result<Bytes> {
    let body = serde_json::to_vec(value).map_err(|e| Error::Codec {
        message: format!("graph encode failed: {e}"),
    })?;
    Ok(Bytes::from(body))
}

fn decode<T: for<'de> Deserialize<'de>>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| Error::Codec {
        message: format!("graph decode failed: {e}"),
    })
}

#[derive(Clone)]
pub struct GraphStore {
    engine: LsmEngine,
}

impl GraphStore {
    pub(crate) fn new(engine: LsmEngine) -> Self {
        Self { engine }
    }

    /// Write a node, its label markers and its property markers atomically.
    pub async fn put_node(&self, node: &Node) -> Result<()> {
        let records = node_records(node)?;
        self.engine.write_batch(&records, false).await
    }

    pub fn get_node(&self, id: &str) -> Result<Option<Node>> {
        match self.engine.get(&keys::node_key(id)?) {
            Some(body) => Ok(Some(decode(&body)?)),
            None => Ok(None),
        }
    }

    /// Write both directions of an edge and its property markers atomically.
    pub async fn put_edge(&self, edge: &Edge) -> Result<()> {
        let records = edge_records(edge)?;
        self.engine.write_batch(&records, false).await
    }

    pub fn get_edge(&self, src: &str, edge_type: &str, dst: &str) -> Result<Option<Edge>> {
        match self.engine.get(&keys::edge_out_key(src, edge_type, dst)?) {
            Some(body) => Ok(Some(decode(&body)?)),
            None => Ok(None),
        }
    }

    /// Tombstone both directions. Property markers stay as stale entries.
    pub async fn remove_edge(&self, src: &str, edge_type: &str, dst: &str) -> Result<()> {
        let records = vec![
            Record::tombstone(keys::edge_out_key(src, edge_type, dst)?),
            Record::tombstone(keys::edge_in_key(src, edge_type, dst)?),
        ];
        self.engine.write_batch(&records, false).await
    }

    /// Target ids of `src`'s outbound `edge_type` edges, by key scan alone.
    pub fn outbound_target_ids(&self, src: &str, edge_type: &str) -> Result<Vec<String>> {
        let prefix = keys::edge_out_prefix(src, edge_type)?;
        Ok(self
            .engine
            .scan_prefix_keys(&prefix)
            .iter()
            .filter_map(|key| keys::last_component(key))
            .collect())
    }

    /// Source ids of `dst`'s inbound `edge_type` edges.
    pub fn inbound_source_ids(&self, dst: &str, edge_type: &str) -> Result<Vec<String>> {
        let prefix = keys::edge_in_prefix(dst, edge_type)?;
        Ok(self
            .engine
            .scan_prefix_keys(&prefix)
            .iter()
            .filter_map(|key| keys::last_component(key))
            .collect())
    }

    /// Ids carrying `label`, from the label marker space.
    pub fn node_ids_by_label(&self, label: &str) -> Result<Vec<String>> {
        let prefix = keys::node_label_prefix(label)?;
        Ok(self
            .engine
            .scan_prefix_keys(&prefix)
            .iter()
            .filter_map(|key| keys::last_component(key))
            .collect())
    }

    /// Nodes whose `key` property currently equals `value` under `label`.
    /// The marker space may hold stale entries, so every candidate is
    /// resolved and re-checked against its current properties.
    pub fn get_nodes_by_property(
        &self,
        label: &str,
        key: &str,
        value: &str,
    ) -> Result<Vec<Node>> {
        let prefix = keys::node_prop_prefix(label, key, value)?;
        let mut nodes = Vec::new();
        for marker in self.engine.scan_prefix_keys(&prefix) {
            let Some(id) = keys::last_component(&marker) else {
                continue;
            };
            if let Some(node) = self.get_node(&id)? {
                if node.properties.get(key).map(String::as_str) == Some(value) {
                    nodes.push(node);
                }
            }
        }
        Ok(nodes)
    }
}
