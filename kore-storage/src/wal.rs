//! # Write-Ahead Log
//!
//! Append-only, batch-framed, CRC-protected record log. Every batch is
//! serialized into one contiguous buffer and written with a single call, so a
//! crash can only ever truncate the tail of the newest frame.
//!
//! ```text
//! Frame layout (all little-endian):
//! ┌──────────────────────────────────────────────────────┐
//! │ RECORD_BEGIN  (u32 = 1)                              │
//! │ per record:                                          │
//! │   RECORD_PUT  (u32 = 2)                              │
//! │   key_size    (u32)                                  │
//! │   value_size  (u32)                                  │
//! │   crc32       (u64, CRC32 of key‖value zero-extended)│
//! │   key, value  (raw bytes)                            │
//! │ RECORD_COMMIT (u32 = 3)                              │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Replay hands only COMMIT-framed, CRC-clean batches to the sink; any
//! framing failure, oversized field, truncation or unknown tag stops replay
//! before the incomplete batch.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, warn};

use kore_core::error::{Error, Result};
use kore_core::types::Record;

pub const RECORD_BEGIN: u32 = 1;
pub const RECORD_PUT: u32 = 2;
pub const RECORD_COMMIT: u32 = 3;

/// Per-field safety bound during replay; a size at or above this is treated
/// as corruption.
pub const MAX_FIELD_BYTES: u32 = 50 * 1024 * 1024;

/// Active WAL file name within a data directory.
pub const WAL_FILE: &str = "kore.wal";

/// Transient backup name used while rotating.
pub const WAL_BACKUP_FILE: &str = "kore.wal.old";

pub struct Wal {
    dir: PathBuf,
    writer: BufWriter<File>,
}

impl Wal {
    /// Open (or create) the active log for append.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(WAL_FILE))?;
        Ok(Self {
            dir,
            writer: BufWriter::new(file),
        })
    }

    /// Serialize `batch` into one frame and write it with a single call.
    /// The frame always reaches the file before returning; `urgent`
    /// additionally forces it to the device.
    pub fn append_batch(&mut self, batch: &[Record], urgent: bool) -> Result<()> {
        let frame = encode_frame(batch);
        self.writer.write_all(&frame)?;
        if urgent {
            self.sync()?;
        } else {
            self.writer.flush()?;
        }
        Ok(())
    }

    /// Force buffered frames to the device.
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Supersede the current log with a fresh empty one. Called after a
    /// flush has made the logged state durable elsewhere: the old file is
    /// renamed aside, a new log is created and synced, then the backup is
    /// removed.
    pub fn rotate(&mut self) -> Result<()> {
        self.sync()?;

        let active = self.dir.join(WAL_FILE);
        let backup = self.dir.join(WAL_BACKUP_FILE);
        std::fs::rename(&active, &backup)?;
        sync_dir(&self.dir)?;

        let file = OpenOptions::new().create(true).append(true).open(&active)?;
        file.sync_all()?;
        sync_dir(&self.dir)?;
        self.writer = BufWriter::new(file);

        std::fs::remove_file(&backup)?;
        debug!("rotated WAL");
        Ok(())
    }
}

/// Replay the log at `dir`, invoking `sink` once per fully committed batch in
/// log order. Stops quietly at the first sign of damage; returns the number
/// of batches handed to the sink.
pub fn replay(dir: impl AsRef<Path>, mut sink: impl FnMut(Vec<Record>)) -> Result<usize> {
    let path = dir.as_ref().join(WAL_FILE);
    let buf = match std::fs::read(&path) {
        Ok(buf) => buf,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut cursor = Cursor { buf: &buf, pos: 0 };
    let mut batches = 0usize;

    loop {
        if cursor.at_end() {
            break;
        }
        match read_frame(&mut cursor) {
            Ok(records) => {
                sink(records);
                batches += 1;
            }
            Err(e) => {
                warn!(error = %e, offset = cursor.pos, "WAL replay stopped, discarding tail");
                break;
            }
        }
    }

    debug!(batches, "WAL replay complete");
    Ok(batches)
}

fn encode_frame(batch: &[Record]) -> Bytes {
    let payload: usize = batch.iter().map(|r| 20 + r.key.len() + r.value.len()).sum();
    let mut buf = BytesMut::with_capacity(8 + payload);

    buf.put_u32_le(RECORD_BEGIN);
    for record in batch {
        buf.put_u32_le(RECORD_PUT);
        buf.put_u32_le(record.key.len() as u32);
        buf.put_u32_le(record.value.len() as u32);
        buf.put_u64_le(record_crc(&record.key, &record.value));
        buf.put_slice(&record.key);
        buf.put_slice(&record.value);
    }
    buf.put_u32_le(RECORD_COMMIT);
    buf.freeze()
}

/// CRC32 of key‖value, zero-extended to 64 bits.
fn record_crc(key: &[u8], value: &[u8]) -> u64 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(key);
    hasher.update(value);
    hasher.finalize() as u64
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn read_u32(&mut self) -> Result<u32> {
        let bytes: [u8; 4] = self
            .take(4)?
            .try_into()
            .map_err(|_| truncated())?;
        Ok(u32::from_le_bytes(bytes))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let bytes: [u8; 8] = self
            .take(8)?
            .try_into()
            .map_err(|_| truncated())?;
        Ok(u64::from_le_bytes(bytes))
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or_else(truncated)?;
        if end > self.buf.len() {
            return Err(truncated());
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

fn truncated() -> Error {
    Error::CorruptWal {
        reason: "truncated frame".to_string(),
    }
}

fn read_frame(cursor: &mut Cursor<'_>) -> Result<Vec<Record>> {
    let begin = cursor.read_u32()?;
    if begin != RECORD_BEGIN {
        return Err(Error::CorruptWal {
            reason: format!("expected frame begin, found tag {begin}"),
        });
    }

    let mut pending = Vec::new();
    loop {
        match cursor.read_u32()? {
            RECORD_PUT => {
                let key_size = cursor.read_u32()?;
                let value_size = cursor.read_u32()?;
                if key_size >= MAX_FIELD_BYTES || value_size >= MAX_FIELD_BYTES {
                    return Err(Error::CorruptWal {
                        reason: format!("field size {key_size}/{value_size} exceeds safety bound"),
                    });
                }
                let crc = cursor.read_u64()?;
                let key = cursor.take(key_size as usize)?;
                let value = cursor.take(value_size as usize)?;
                if record_crc(key, value) != crc {
                    return Err(Error::CorruptWal {
                        reason: "record checksum mismatch".to_string(),
                    });
                }
                pending.push(Record {
                    key: Bytes::copy_from_slice(key),
                    value: Bytes::copy_from_slice(value),
                });
            }
            RECORD_COMMIT => return Ok(pending),
            tag => {
                return Err(Error::CorruptWal {
                    reason: format!("unknown record tag {tag}"),
                })
            }
        }
    }
}

fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_encoding_shape() {
        let batch = vec![Record::put(&b"k"[..], &b"vv"[..])];
        let frame = encode_frame(&batch);
        // begin + (tag + sizes + crc + payload) + commit
        assert_eq!(frame.len(), 4 + (4 + 4 + 4 + 8 + 1 + 2) + 4);
        assert_eq!(u32::from_le_bytes(frame[0..4].try_into().unwrap()), RECORD_BEGIN);
        assert_eq!(
            u32::from_le_bytes(frame[frame.len() - 4..].try_into().unwrap()),
            RECORD_COMMIT
        );
    }

    #[test]
    fn crc_is_zero_extended_crc32() {
        let crc = record_crc(b"key", b"value");
        assert!(crc <= u32::MAX as u64);
        assert_ne!(crc, record_crc(b"key", b"valuf"));
    }
}
