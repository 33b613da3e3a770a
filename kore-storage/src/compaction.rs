//! # Compaction
//!
//! K-way merge of a segment snapshot into one new segment. The priority
//! queue orders by `(key ascending, source position descending)`, so the
//! first occurrence of each key is its newest version; stale versions and
//! tombstones are dropped on the floor.
//!
//! Point-query results are unchanged for every live key, which is the whole
//! contract: compaction reclaims space, never meaning.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use tracing::info;

use kore_core::error::Result;

use crate::sstable::{SegmentIter, SegmentReader, SstWriter};

struct MergeEntry {
    key: Bytes,
    value: Bytes,
    /// Index into the input list; higher means newer.
    source: usize,
}

impl PartialEq for MergeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.source == other.source
    }
}

impl Eq for MergeEntry {}

impl PartialOrd for MergeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Key ascending, then source descending, so that inside a
        // min-heap the newest version of a key pops first.
        self.key
            .cmp(&other.key)
            .then_with(|| other.source.cmp(&self.source))
    }
}

/// Merge `readers` (ordered oldest to newest) into a fresh segment at
/// `dest`. Returns the number of live records written.
pub fn merge_segments(
    readers: &[Arc<SegmentReader>],
    dest: &Path,
    bits_per_key: usize,
) -> Result<u64> {
    let expected: usize = readers.iter().map(|r| r.entry_count() as usize).sum();
    let mut writer = SstWriter::create(dest, expected, bits_per_key)?;

    let mut iters: Vec<SegmentIter<'_>> = readers.iter().map(|r| r.iter()).collect();
    let mut heap: BinaryHeap<Reverse<MergeEntry>> = BinaryHeap::new();

    for (source, iter) in iters.iter_mut().enumerate() {
        if let Some((key, value)) = iter.next() {
            heap.push(Reverse(MergeEntry { key, value, source }));
        }
    }

    let mut last_key: Option<Bytes> = None;
    let mut written = 0u64;
    let mut dropped = 0u64;

    while let Some(Reverse(entry)) = heap.pop() {
        if let Some((key, value)) = iters[entry.source].next() {
            heap.push(Reverse(MergeEntry {
                key,
                value,
                source: entry.source,
            }));
        }

        if last_key.as_deref() == Some(entry.key.as_ref()) {
            dropped += 1;
            continue;
        }
        last_key = Some(entry.key.clone());

        if entry.value.is_empty() {
            dropped += 1;
            continue;
        }
        writer.add(&entry.key, &entry.value)?;
        written += 1;
    }

    writer.finish()?;
    info!(
        inputs = readers.len(),
        written, dropped, dest = ?dest, "compaction merge complete"
    );
    Ok(written)
}
