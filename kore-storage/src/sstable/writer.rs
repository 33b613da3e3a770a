//! Segment writer
//!
//! Streams records in ascending key order, feeding the bloom filter as it
//! goes, then appends the filter and footer and forces the file to the
//! device. The resulting file is immutable and self-describing.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use tracing::debug;

use kore_core::error::Result;

use super::bloom::BloomFilter;
use super::types::{SEGMENT_MAGIC, SEGMENT_VERSION};

pub struct SstWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    bloom: BloomFilter,
    offset: u64,
    entry_count: u64,
}

impl SstWriter {
    /// Start a new segment. `expected_keys` sizes the bloom filter; an
    /// over-estimate only costs bits.
    pub fn create(path: impl AsRef<Path>, expected_keys: usize, bits_per_key: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            bloom: BloomFilter::new(expected_keys, bits_per_key),
            offset: 0,
            entry_count: 0,
        })
    }

    /// Append one record. Keys must arrive in ascending order; the writer
    /// trusts its caller (a MemTable snapshot or a merge) for that.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.writer.write_u32::<LittleEndian>(key.len() as u32)?;
        self.writer.write_u32::<LittleEndian>(value.len() as u32)?;
        self.writer.write_all(key)?;
        self.writer.write_all(value)?;

        self.bloom.add(key);
        self.offset += 8 + key.len() as u64 + value.len() as u64;
        self.entry_count += 1;
        Ok(())
    }

    /// Write the bloom section and footer, then force everything to the
    /// device. Returns the number of records written.
    pub fn finish(mut self) -> Result<u64> {
        let bloom_offset = self.offset;
        let mut bloom_buf = Vec::with_capacity(self.bloom.encoded_len());
        self.bloom.encode_into(&mut bloom_buf);
        self.writer.write_all(&bloom_buf)?;

        self.writer.write_u64::<LittleEndian>(bloom_offset)?;
        self.writer.write_u32::<LittleEndian>(SEGMENT_VERSION)?;
        self.writer.write_u32::<LittleEndian>(SEGMENT_MAGIC)?;

        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;

        debug!(path = ?self.path, entries = self.entry_count, "finished segment");
        Ok(self.entry_count)
    }
}
