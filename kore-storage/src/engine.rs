//! # LSM Engine
//!
//! Coordinates the WAL, MemTable and segment set behind a single-writer
//! discipline: at any instant at most one call sits between "about to append
//! to the WAL" and "finished applying to the MemTable" (including a
//! triggered flush). Readers never block the writer and always observe every
//! write whose serialized region completed before they began.
//!
//! Recovery is MANIFEST ∪ WAL: the segments the manifest lists, plus a
//! replay of every fully committed WAL frame, reproduce the state at the
//! last acknowledged write.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use kore_core::codec;
use kore_core::config::EngineConfig;
use kore_core::error::{Error, Result};
use kore_core::traits::{BatchWriter, PointReader, VectorScanner};
use kore_core::types::{Record, SearchHit};

use crate::compaction::merge_segments;
use crate::manifest;
use crate::memtable::MemTable;
use crate::sstable::SegmentReader;
use crate::sstable::SstWriter;
use crate::wal::{self, Wal, WAL_BACKUP_FILE};

/// Point-in-time counters for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStats {
    pub memtable_bytes: usize,
    pub memtable_entries: usize,
    pub segment_count: usize,
    pub segment_bytes: usize,
}

struct EngineInner {
    dir: PathBuf,
    config: EngineConfig,
    memtable: MemTable,
    /// The writer lock. Held across WAL append, MemTable apply and any
    /// triggered flush; compaction takes it only for the segment-set swap.
    wal: Mutex<Wal>,
    segments: RwLock<Arc<Vec<Arc<SegmentReader>>>>,
    next_segment_id: AtomicU64,
    compaction_busy: AtomicBool,
    closed: AtomicBool,
}

/// Handle to one open data directory. Cheap to clone; all clones share the
/// same engine state.
#[derive(Clone)]
pub struct LsmEngine {
    inner: Arc<EngineInner>,
}

impl LsmEngine {
    /// Open (or create) the engine at `dir`: load the manifest, open every
    /// verifiable segment, replay the WAL into a fresh MemTable.
    pub async fn open(dir: impl AsRef<Path>, config: EngineConfig) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        // A leftover rotation backup means the crash happened after the
        // flushed state became durable; its contents are already in a
        // segment.
        let backup = dir.join(WAL_BACKUP_FILE);
        if backup.exists() {
            warn!(path = ?backup, "removing stale WAL backup from interrupted rotation");
            std::fs::remove_file(&backup)?;
        }

        let names = match manifest::load(&dir)? {
            Some(names) => names,
            None => scan_segment_files(&dir)?,
        };

        let mut readers = Vec::new();
        for name in &names {
            let path = dir.join(name);
            if !path.exists() {
                warn!(segment = %name, "manifest lists missing segment, skipping");
                continue;
            }
            match SegmentReader::open(&path, config.sparse_index_interval) {
                Ok(reader) => readers.push(Arc::new(reader)),
                Err(e) => warn!(segment = %name, error = %e, "excluding unverifiable segment"),
            }
        }

        let next_segment_id = 1 + max_segment_index(&dir)?;

        let memtable = MemTable::new();
        let replayed = wal::replay(&dir, |records| {
            for record in records {
                memtable.put(record.key, record.value);
            }
        })?;

        let wal = Wal::open(&dir)?;

        info!(
            dir = ?dir,
            segments = readers.len(),
            wal_batches = replayed,
            "opened engine"
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                dir,
                config,
                memtable,
                wal: Mutex::new(wal),
                segments: RwLock::new(Arc::new(readers)),
                next_segment_id: AtomicU64::new(next_segment_id),
                compaction_busy: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Durably apply a non-empty batch: WAL append, MemTable apply, and a
    /// flush when the MemTable crosses its threshold. `urgent` forces the
    /// WAL to the device before returning.
    pub async fn write_batch(&self, batch: &[Record], urgent: bool) -> Result<()> {
        if batch.is_empty() {
            return Err(Error::InvalidState {
                message: "empty batch".to_string(),
            });
        }
        for record in batch {
            if record.key.is_empty() {
                return Err(Error::InvalidKey {
                    reason: "empty keys are disallowed".to_string(),
                });
            }
        }

        let mut wal = self.inner.wal.lock().await;
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(Error::InvalidState {
                message: "engine is closed".to_string(),
            });
        }

        wal.append_batch(batch, urgent || self.inner.config.wal_sync_on_write)?;
        for record in batch {
            self.inner
                .memtable
                .put(record.key.clone(), record.value.clone());
        }

        if self.inner.memtable.size_bytes() >= self.inner.config.memtable_flush_bytes {
            self.flush_locked(&mut wal)?;
        }
        Ok(())
    }

    pub async fn put(&self, key: Bytes, value: Bytes) -> Result<()> {
        self.write_batch(&[Record::put(key, value)], false).await
    }

    pub async fn delete(&self, key: Bytes) -> Result<()> {
        self.write_batch(&[Record::tombstone(key)], false).await
    }

    /// Newest-wins point lookup across MemTable and segments. Tombstones
    /// read as absent.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        if let Some(value) = self.inner.memtable.get(key) {
            return live(value);
        }

        let segments = self.segment_snapshot();
        for segment in segments.iter().rev() {
            if let Some(value) = segment.find(key) {
                return live(value);
            }
        }
        None
    }

    /// Live `(key, value)` pairs under `prefix`, ascending by key, merged
    /// newest-wins across every source.
    pub fn scan_prefix_entries(&self, prefix: &[u8]) -> Vec<(Bytes, Bytes)> {
        let mut merged: BTreeMap<Bytes, Bytes> = BTreeMap::new();

        let segments = self.segment_snapshot();
        for segment in segments.iter() {
            segment.scan_by_prefix(prefix, |key, value| {
                if value.is_empty() {
                    merged.remove(&key);
                } else {
                    merged.insert(key, value);
                }
            });
        }

        for (key, value) in self.inner.memtable.iter_from(prefix) {
            if !key.starts_with(prefix) {
                break;
            }
            if value.is_empty() {
                merged.remove(&key);
            } else {
                merged.insert(key, value);
            }
        }

        merged.into_iter().collect()
    }

    pub fn scan_prefix(&self, prefix: &[u8]) -> Vec<Bytes> {
        self.scan_prefix_entries(prefix)
            .into_iter()
            .map(|(_, value)| value)
            .collect()
    }

    pub fn scan_prefix_keys(&self, prefix: &[u8]) -> Vec<Bytes> {
        self.scan_prefix_entries(prefix)
            .into_iter()
            .map(|(key, _)| key)
            .collect()
    }

    /// Brute-force top-K cosine search over encoded vector values under
    /// `prefix`, folding segment scans and the MemTable tail into one
    /// ranking. Per-key, the best-scoring version wins.
    pub fn search_vectors(&self, prefix: &[u8], query: &[f32], k: usize) -> Vec<SearchHit> {
        if k == 0 {
            return Vec::new();
        }

        let mut best: HashMap<Bytes, f32> = HashMap::new();
        let segments = self.segment_snapshot();
        for segment in segments.iter() {
            for (key, score) in segment.find_top_vectors(prefix, query, k) {
                best.entry(key)
                    .and_modify(|s| *s = s.max(score))
                    .or_insert(score);
            }
        }

        let query_mag = codec::magnitude(query);
        for (key, value) in self.inner.memtable.iter_from(prefix) {
            if !key.starts_with(prefix) {
                break;
            }
            if value.is_empty() {
                continue;
            }
            let score = codec::score_encoded(&value, query, query_mag);
            if score > codec::SCORE_FILTER {
                best.entry(key)
                    .and_modify(|s| *s = s.max(score))
                    .or_insert(score);
            }
        }

        let mut hits: Vec<SearchHit> = best
            .into_iter()
            .map(|(key, score)| SearchHit { key, score })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        hits
    }

    /// Force the MemTable out to a segment regardless of size.
    pub async fn flush_now(&self) -> Result<()> {
        let mut wal = self.inner.wal.lock().await;
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(Error::InvalidState {
                message: "engine is closed".to_string(),
            });
        }
        self.flush_locked(&mut wal)
    }

    /// Run one compaction cycle to completion, waiting out any background
    /// cycle already in flight.
    pub async fn compact_now(&self) -> Result<()> {
        while self
            .inner
            .compaction_busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tokio::task::yield_now().await;
        }
        let result = compact(&self.inner).await;
        self.inner.compaction_busy.store(false, Ordering::SeqCst);
        result
    }

    /// Reject further writes and force the WAL down. Readers holding the
    /// handle may continue; segment maps are released when the last clone
    /// drops.
    pub async fn close(&self) -> Result<()> {
        let mut wal = self.inner.wal.lock().await;
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        wal.sync()?;
        info!(dir = ?self.inner.dir, "closed engine");
        Ok(())
    }

    /// Testing hook: delete every file in the data directory and restart
    /// from an empty state with a fresh WAL.
    pub async fn wipe(&self) -> Result<()> {
        let mut wal = self.inner.wal.lock().await;

        *self.inner.segments.write() = Arc::new(Vec::new());
        self.inner.memtable.clear();

        for entry in std::fs::read_dir(&self.inner.dir)? {
            let path = entry?.path();
            if path.is_file() {
                std::fs::remove_file(&path)?;
            }
        }

        self.inner.next_segment_id.store(1, Ordering::SeqCst);
        *wal = Wal::open(&self.inner.dir)?;
        self.inner.closed.store(false, Ordering::SeqCst);

        info!(dir = ?self.inner.dir, "wiped engine");
        Ok(())
    }

    pub fn stats(&self) -> EngineStats {
        let segments = self.segment_snapshot();
        EngineStats {
            memtable_bytes: self.inner.memtable.size_bytes(),
            memtable_entries: self.inner.memtable.len(),
            segment_count: segments.len(),
            segment_bytes: segments.iter().map(|s| s.file_len()).sum(),
        }
    }

    pub fn segment_count(&self) -> usize {
        self.inner.segments.read().len()
    }

    pub fn data_dir(&self) -> &Path {
        &self.inner.dir
    }

    fn segment_snapshot(&self) -> Arc<Vec<Arc<SegmentReader>>> {
        self.inner.segments.read().clone()
    }

    /// Flush under the writer lock: write the segment, publish it, advance
    /// the MANIFEST, rotate the WAL, clear the MemTable, maybe kick off
    /// compaction.
    fn flush_locked(&self, wal: &mut Wal) -> Result<()> {
        let inner = &self.inner;
        if inner.memtable.is_empty() {
            return Ok(());
        }

        let id = inner.next_segment_id.fetch_add(1, Ordering::SeqCst);
        let path = inner.dir.join(format!("segment_{id}.sst"));

        let mut writer = SstWriter::create(
            &path,
            inner.memtable.len(),
            inner.config.bloom_bits_per_key,
        )?;
        for (key, value) in inner.memtable.iter_all() {
            writer.add(&key, &value)?;
        }
        let entries = writer.finish()?;

        let reader = Arc::new(SegmentReader::open(
            &path,
            inner.config.sparse_index_interval,
        )?);
        {
            let mut segments = inner.segments.write();
            let mut next = (**segments).clone();
            next.push(reader);
            *segments = Arc::new(next);
        }

        manifest::save(&inner.dir, &self.segment_names())?;
        wal.rotate()?;
        inner.memtable.clear();

        debug!(segment = id, entries, "flushed MemTable");

        let count = inner.segments.read().len();
        if count >= inner.config.compaction_trigger
            && !inner.closed.load(Ordering::SeqCst)
            && inner
                .compaction_busy
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            let task_inner = Arc::clone(inner);
            tokio::spawn(async move {
                let result = compact(&task_inner).await;
                task_inner.compaction_busy.store(false, Ordering::SeqCst);
                if let Err(e) = result {
                    warn!(error = %e, "background compaction failed; segments left intact");
                }
            });
        }
        Ok(())
    }

    fn segment_names(&self) -> Vec<String> {
        self.inner
            .segments
            .read()
            .iter()
            .map(|s| s.file_name())
            .collect()
    }
}

#[async_trait]
impl BatchWriter for LsmEngine {
    async fn write_batch(&self, batch: &[Record], urgent: bool) -> Result<()> {
        LsmEngine::write_batch(self, batch, urgent).await
    }
}

impl PointReader for LsmEngine {
    fn get(&self, key: &[u8]) -> Option<Bytes> {
        LsmEngine::get(self, key)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Vec<Bytes> {
        LsmEngine::scan_prefix(self, prefix)
    }

    fn scan_prefix_keys(&self, prefix: &[u8]) -> Vec<Bytes> {
        LsmEngine::scan_prefix_keys(self, prefix)
    }
}

impl VectorScanner for LsmEngine {
    fn search_vectors(&self, prefix: &[u8], query: &[f32], k: usize) -> Vec<SearchHit> {
        LsmEngine::search_vectors(self, prefix, query, k)
    }
}

fn live(value: Bytes) -> Option<Bytes> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Merge the current segment snapshot into one file and swap it in under
/// the writer lock. Failure leaves the old segments untouched.
async fn compact(inner: &Arc<EngineInner>) -> Result<()> {
    let snapshot = inner.segments.read().clone();
    if snapshot.len() < 2 {
        return Ok(());
    }

    let dest = compacted_path(&inner.dir);
    merge_segments(&snapshot, &dest, inner.config.bloom_bits_per_key)?;
    let reader = Arc::new(SegmentReader::open(
        &dest,
        inner.config.sparse_index_interval,
    )?);

    {
        let _writer = inner.wal.lock().await;
        if inner.closed.load(Ordering::SeqCst) {
            drop(_writer);
            let _ = std::fs::remove_file(&dest);
            return Ok(());
        }

        {
            let mut segments = inner.segments.write();
            // Segments flushed while the merge ran stay, and stay newer
            // than the compacted output.
            let retained: Vec<Arc<SegmentReader>> = segments
                .iter()
                .filter(|s| !snapshot.iter().any(|old| Arc::ptr_eq(old, s)))
                .cloned()
                .collect();
            let mut next = Vec::with_capacity(1 + retained.len());
            next.push(reader);
            next.extend(retained);
            *segments = Arc::new(next);
        }

        let names: Vec<String> = inner
            .segments
            .read()
            .iter()
            .map(|s| s.file_name())
            .collect();
        manifest::save(&inner.dir, &names)?;
    }

    // Readers that captured the old snapshot still hold live maps; on POSIX
    // the mappings survive the unlink.
    for old in snapshot.iter() {
        if let Err(e) = std::fs::remove_file(old.path()) {
            warn!(path = ?old.path(), error = %e, "failed to remove compacted-away segment");
        }
    }

    info!(merged = snapshot.len(), dest = ?dest, "compaction complete");
    Ok(())
}

fn compacted_path(dir: &Path) -> PathBuf {
    let mut millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    loop {
        let candidate = dir.join(format!("compacted_{millis}.sst"));
        if !candidate.exists() {
            return candidate;
        }
        millis += 1;
    }
}

/// Fallback discovery when no MANIFEST exists: compacted outputs first (they
/// hold the oldest data), then flush segments in counter order.
fn scan_segment_files(dir: &Path) -> Result<Vec<String>> {
    let mut compacted = Vec::new();
    let mut flushed: Vec<(u64, String)> = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if name.starts_with("compacted_") && name.ends_with(".sst") {
            compacted.push(name);
        } else if let Some(index) = parse_segment_index(&name) {
            flushed.push((index, name));
        }
    }

    compacted.sort();
    flushed.sort_by_key(|(index, _)| *index);

    let mut names = compacted;
    names.extend(flushed.into_iter().map(|(_, name)| name));
    if !names.is_empty() {
        warn!(found = names.len(), "no MANIFEST; recovered segment list from directory scan");
    }
    Ok(names)
}

fn max_segment_index(dir: &Path) -> Result<u64> {
    let mut max = 0u64;
    for entry in std::fs::read_dir(dir)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if let Some(index) = parse_segment_index(&name) {
            max = max.max(index);
        }
    }
    Ok(max)
}

fn parse_segment_index(name: &str) -> Option<u64> {
    name.strip_prefix("segment_")?
        .strip_suffix(".sst")?
        .parse()
        .ok()
}
