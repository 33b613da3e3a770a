//! # MemTable
//!
//! Ordered in-memory buffer holding the most recent writes. Backed by a
//! lock-free skip list so arbitrary readers run concurrently with the single
//! writer; the byte-size counter tracks resident `|key| + |value|` exactly.
//!
//! Tombstones (empty values) are stored like any other entry; resolution to
//! "absent" happens in the engine's read path.

use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use crossbeam_skiplist::SkipMap;

pub struct MemTable {
    data: SkipMap<Bytes, Bytes>,
    size_bytes: AtomicUsize,
}

impl MemTable {
    pub fn new() -> Self {
        Self {
            data: SkipMap::new(),
            size_bytes: AtomicUsize::new(0),
        }
    }

    /// Insert or overwrite. The size counter moves by
    /// `|key| + |value| - |previous value|`; the key's size is only charged
    /// once. Callers serialize writes; readers may run concurrently.
    pub fn put(&self, key: Bytes, value: Bytes) {
        let prev_value_len = self.data.get(key.as_ref() as &[u8]).map(|e| e.value().len());

        match prev_value_len {
            Some(prev) => {
                self.data.insert(key, value.clone());
                if value.len() >= prev {
                    self.size_bytes.fetch_add(value.len() - prev, Ordering::Relaxed);
                } else {
                    self.size_bytes.fetch_sub(prev - value.len(), Ordering::Relaxed);
                }
            }
            None => {
                let added = key.len() + value.len();
                self.data.insert(key, value);
                self.size_bytes.fetch_add(added, Ordering::Relaxed);
            }
        }
    }

    /// Exact-match lookup. Returns the stored value including tombstones.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.data.get(key).map(|e| e.value().clone())
    }

    /// Tracked resident size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Ascending iteration starting at the first key >= `from`. Callers stop
    /// once yielded keys no longer carry their prefix.
    pub fn iter_from<'a>(&'a self, from: &'a [u8]) -> impl Iterator<Item = (Bytes, Bytes)> + 'a {
        self.data
            .range::<[u8], _>((Bound::Included(from), Bound::Unbounded))
            .map(|e| (e.key().clone(), e.value().clone()))
    }

    /// Ascending iteration over every entry.
    pub fn iter_all(&self) -> impl Iterator<Item = (Bytes, Bytes)> + '_ {
        self.data.iter().map(|e| (e.key().clone(), e.value().clone()))
    }

    /// Drop every entry and reset the size counter. Called after a
    /// successful flush, under the writer lock.
    pub fn clear(&self) {
        while self.data.pop_front().is_some() {}
        self.size_bytes.store(0, Ordering::Relaxed);
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
