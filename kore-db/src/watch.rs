//! # Change Notification
//!
//! Per-collection publish channels keyed by document id, plus a `"*"`
//! wildcard. Writers publish after their batch commits; subscribers receive
//! the changed id and re-read through `get`, so the hub never carries
//! values, only signals.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Subscribe to every change in a collection.
pub const WILDCARD: &str = "*";

#[derive(Default)]
pub struct ChangeHub {
    subscribers: Mutex<HashMap<String, HashMap<String, Vec<UnboundedSender<String>>>>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to changes of `id` in `coll` (or [`WILDCARD`] for all).
    /// The returned receiver yields the changed document id.
    pub fn subscribe(&self, coll: &str, id: &str) -> UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .entry(coll.to_string())
            .or_default()
            .entry(id.to_string())
            .or_default()
            .push(tx);
        rx
    }

    /// Notify subscribers of `id` and wildcard subscribers of the
    /// collection. Dropped receivers are pruned on the way through.
    pub fn publish(&self, coll: &str, id: &str) {
        let mut subscribers = self.subscribers.lock();
        let Some(by_id) = subscribers.get_mut(coll) else {
            return;
        };
        for target in [id, WILDCARD] {
            if let Some(senders) = by_id.get_mut(target) {
                senders.retain(|tx| tx.send(id.to_string()).is_ok());
            }
        }
    }
}
