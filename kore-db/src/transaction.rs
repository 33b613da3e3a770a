//! # Transactions
//!
//! A transaction buffers records in memory and commits them as one WAL
//! frame, so everything inside it becomes visible atomically or not at all.
//! Rollback discards the buffer. A spent transaction (committed, rolled
//! back, or consumed by a failed block) rejects further use.

use bytes::Bytes;

use kore_core::error::{Error, Result};
use kore_core::types::Record;
use kore_storage::LsmEngine;

use crate::graph::{self, Edge, Node};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Open,
    Committed,
    RolledBack,
}

pub struct Transaction {
    engine: LsmEngine,
    buffer: Vec<Record>,
    state: TxState,
}

impl Transaction {
    pub(crate) fn new(engine: LsmEngine) -> Self {
        Self {
            engine,
            buffer: Vec::new(),
            state: TxState::Open,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Buffer an arbitrary put.
    pub fn put(&mut self, key: Bytes, value: Bytes) -> Result<()> {
        self.ensure_open()?;
        self.buffer.push(Record::put(key, value));
        Ok(())
    }

    /// Buffer a deletion.
    pub fn delete(&mut self, key: Bytes) -> Result<()> {
        self.ensure_open()?;
        self.buffer.push(Record::tombstone(key));
        Ok(())
    }

    /// Buffer a node with its label and property markers.
    pub fn put_node(&mut self, node: &Node) -> Result<()> {
        self.ensure_open()?;
        self.buffer.extend(graph::node_records(node)?);
        Ok(())
    }

    /// Buffer both directions of an edge with its property markers.
    pub fn put_edge(&mut self, edge: &Edge) -> Result<()> {
        self.ensure_open()?;
        self.buffer.extend(graph::edge_records(edge)?);
        Ok(())
    }

    /// Commit the buffer as a single atomic batch. `urgent` forces the WAL
    /// to the device before returning.
    pub async fn commit(&mut self, urgent: bool) -> Result<()> {
        self.ensure_open()?;
        self.state = TxState::Committed;
        if self.buffer.is_empty() {
            return Ok(());
        }
        let buffer = std::mem::take(&mut self.buffer);
        self.engine.write_batch(&buffer, urgent).await
    }

    /// Discard the buffer.
    pub fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.state = TxState::RolledBack;
        self.buffer.clear();
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            TxState::Open => Ok(()),
            TxState::Committed => Err(Error::InvalidState {
                message: "transaction already committed".to_string(),
            }),
            TxState::RolledBack => Err(Error::InvalidState {
                message: "transaction already rolled back".to_string(),
            }),
        }
    }
}
