//! Segment reader
//!
//! Memory-mapped view over an immutable segment. On open the footer is
//! verified, the bloom filter loaded, and a sparse index built by sampling
//! every Nth key; lookups binary-search the samples and scan forward from
//! the nearest one.
//!
//! Every operation works from local cursor state only, so arbitrary callers
//! may share one reader. The map stays valid after the file is unlinked,
//! which is what lets compaction delete superseded segments while readers
//! still hold them.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fs::File;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use memmap2::{Mmap, MmapOptions};

use kore_core::codec;
use kore_core::error::{Error, Result};

use super::bloom::BloomFilter;
use super::types::{FOOTER_SIZE, RECORD_HEADER_SIZE, SEGMENT_MAGIC, SEGMENT_VERSION};

#[derive(Debug)]
pub struct SegmentReader {
    path: PathBuf,
    mmap: Mmap,
    bloom: BloomFilter,
    /// `(sample_key, byte_offset)` pairs in ascending key order.
    sparse: Vec<(Bytes, usize)>,
    data_end: usize,
    entry_count: u64,
}

impl SegmentReader {
    /// Map the file, verify the footer, load the bloom filter and build the
    /// sparse index.
    pub fn open(path: impl AsRef<Path>, sparse_interval: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let file_len = file.metadata()?.len() as usize;

        if file_len < FOOTER_SIZE {
            return Err(Error::CorruptSegment {
                path,
                reason: format!("file too small: {file_len} bytes"),
            });
        }

        let mmap = unsafe { MmapOptions::new().map(&file) }.map_err(|e| Error::Io {
            message: format!("failed to map segment {path:?}"),
            source: e,
        })?;

        let footer = &mmap[file_len - FOOTER_SIZE..];
        let bloom_offset = u64::from_le_bytes(footer[0..8].try_into().map_err(|_| {
            corrupt(&path, "unreadable footer")
        })?) as usize;
        let version = u32::from_le_bytes(footer[8..12].try_into().map_err(|_| {
            corrupt(&path, "unreadable footer")
        })?);
        let magic = u32::from_le_bytes(footer[12..16].try_into().map_err(|_| {
            corrupt(&path, "unreadable footer")
        })?);

        if magic != SEGMENT_MAGIC {
            return Err(corrupt(&path, "bad magic"));
        }
        if version != SEGMENT_VERSION {
            return Err(Error::UnsupportedVersion {
                path,
                found: version,
            });
        }
        if bloom_offset > file_len - FOOTER_SIZE {
            return Err(corrupt(&path, "bloom offset beyond footer"));
        }

        let bloom = BloomFilter::decode(&mmap[bloom_offset..file_len - FOOTER_SIZE])
            .map_err(|e| corrupt(&path, &format!("bloom section: {e}")))?;

        let (sparse, entry_count) =
            build_sparse_index(&mmap, bloom_offset, sparse_interval.max(1), &path)?;

        Ok(Self {
            path,
            mmap,
            bloom,
            sparse,
            data_end: bloom_offset,
            entry_count,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The segment's file name component.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn file_len(&self) -> usize {
        self.mmap.len()
    }

    /// Point lookup. Returns the stored value (tombstones included); the
    /// engine decides what absence means.
    pub fn find(&self, target: &[u8]) -> Option<Bytes> {
        if !self.bloom.maybe_contains(target) {
            return None;
        }

        let mut offset = self.seek_offset(target);
        while let Some((key, value, next)) = self.record_at(offset) {
            match key.cmp(target) {
                Ordering::Equal => return Some(Bytes::copy_from_slice(value)),
                Ordering::Greater => return None,
                Ordering::Less => offset = next,
            }
        }
        None
    }

    /// Visit every record whose key starts with `prefix`, ascending.
    /// Allocation happens only for matching records.
    pub fn scan_by_prefix(&self, prefix: &[u8], mut sink: impl FnMut(Bytes, Bytes)) {
        let mut offset = self.seek_offset(prefix);
        while let Some((key, value, next)) = self.record_at(offset) {
            if key.starts_with(prefix) {
                sink(Bytes::copy_from_slice(key), Bytes::copy_from_slice(value));
            } else if key > prefix {
                break;
            }
            offset = next;
        }
    }

    /// Top-K cosine scan over vector values under `prefix`. Tombstones and
    /// dimension mismatches are skipped; results are `(key, score)` sorted
    /// by score descending.
    pub fn find_top_vectors(&self, prefix: &[u8], query: &[f32], k: usize) -> Vec<(Bytes, f32)> {
        if k == 0 {
            return Vec::new();
        }
        let query_mag = codec::magnitude(query);
        let mut heap: BinaryHeap<Reverse<ScoredOffset>> = BinaryHeap::with_capacity(k + 1);

        let mut offset = self.seek_offset(prefix);
        while let Some((key, value, next)) = self.record_at(offset) {
            if key.starts_with(prefix) {
                if !value.is_empty() {
                    let score = codec::score_encoded(value, query, query_mag);
                    if score > codec::SCORE_FILTER {
                        let under_capacity = heap.len() < k;
                        let beats_worst = heap
                            .peek()
                            .map(|Reverse(worst)| score > worst.score)
                            .unwrap_or(true);
                        if under_capacity || beats_worst {
                            heap.push(Reverse(ScoredOffset { score, offset }));
                            if heap.len() > k {
                                heap.pop();
                            }
                        }
                    }
                }
            } else if key > prefix {
                break;
            }
            offset = next;
        }

        let mut hits: Vec<(Bytes, f32)> = heap
            .into_iter()
            .filter_map(|Reverse(s)| {
                self.record_at(s.offset)
                    .map(|(key, _, _)| (Bytes::copy_from_slice(key), s.score))
            })
            .collect();
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        hits
    }

    /// Sequential iteration over every record, ascending.
    pub fn iter(&self) -> SegmentIter<'_> {
        SegmentIter {
            reader: self,
            offset: 0,
        }
    }

    /// Greatest sparse-index offset whose sample key is <= `target`, or the
    /// data start when every sample is greater.
    fn seek_offset(&self, target: &[u8]) -> usize {
        let idx = self.sparse.partition_point(|(key, _)| key.as_ref() <= target);
        if idx == 0 {
            0
        } else {
            self.sparse[idx - 1].1
        }
    }

    /// Borrow the record at `offset` as `(key, value, next_offset)` without
    /// allocating. `None` at the end of the data section or on any overrun.
    fn record_at(&self, offset: usize) -> Option<(&[u8], &[u8], usize)> {
        if offset + RECORD_HEADER_SIZE > self.data_end {
            return None;
        }
        let key_size =
            u32::from_le_bytes(self.mmap[offset..offset + 4].try_into().ok()?) as usize;
        let value_size =
            u32::from_le_bytes(self.mmap[offset + 4..offset + 8].try_into().ok()?) as usize;

        let key_start = offset + RECORD_HEADER_SIZE;
        let value_start = key_start.checked_add(key_size)?;
        let end = value_start.checked_add(value_size)?;
        if end > self.data_end {
            return None;
        }
        Some((
            &self.mmap[key_start..value_start],
            &self.mmap[value_start..end],
            end,
        ))
    }
}

pub struct SegmentIter<'a> {
    reader: &'a SegmentReader,
    offset: usize,
}

impl<'a> Iterator for SegmentIter<'a> {
    type Item = (Bytes, Bytes);

    fn next(&mut self) -> Option<Self::Item> {
        let (key, value, next) = self.reader.record_at(self.offset)?;
        self.offset = next;
        Some((Bytes::copy_from_slice(key), Bytes::copy_from_slice(value)))
    }
}

struct ScoredOffset {
    score: f32,
    offset: usize,
}

impl PartialEq for ScoredOffset {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.offset == other.offset
    }
}

impl Eq for ScoredOffset {}

impl PartialOrd for ScoredOffset {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredOffset {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .partial_cmp(&other.score)
            .unwrap_or(Ordering::Equal)
            .then(self.offset.cmp(&other.offset))
    }
}

fn corrupt(path: &Path, reason: &str) -> Error {
    Error::CorruptSegment {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// One pass over the data section: count records and sample every
/// `interval`th key into the sparse index.
fn build_sparse_index(
    mmap: &Mmap,
    data_end: usize,
    interval: usize,
    path: &Path,
) -> Result<(Vec<(Bytes, usize)>, u64)> {
    let mut sparse = Vec::new();
    let mut offset = 0usize;
    let mut count = 0u64;

    while offset < data_end {
        if offset + RECORD_HEADER_SIZE > data_end {
            return Err(corrupt(path, "record header overruns data section"));
        }
        let key_size = u32::from_le_bytes(
            mmap[offset..offset + 4]
                .try_into()
                .map_err(|_| corrupt(path, "unreadable record header"))?,
        ) as usize;
        let value_size = u32::from_le_bytes(
            mmap[offset + 4..offset + 8]
                .try_into()
                .map_err(|_| corrupt(path, "unreadable record header"))?,
        ) as usize;

        let key_start = offset + RECORD_HEADER_SIZE;
        let end = key_start
            .checked_add(key_size)
            .and_then(|v| v.checked_add(value_size))
            .ok_or_else(|| corrupt(path, "record size overflow"))?;
        if end > data_end {
            return Err(corrupt(path, "record body overruns data section"));
        }

        if count % interval as u64 == 0 {
            sparse.push((
                Bytes::copy_from_slice(&mmap[key_start..key_start + key_size]),
                offset,
            ));
        }
        count += 1;
        offset = end;
    }

    Ok((sparse, count))
}
