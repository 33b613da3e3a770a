//! # SSTable
//!
//! Immutable on-disk segments: a stream of length-prefixed records in
//! ascending key order, a serialized bloom filter, and a fixed footer that
//! makes each file self-describing.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ <Data>   { key_size:u32, value_size:u32, key, value }*│
//! │ <Filter> { m:u32, k:u32, bits: ⌈m/8⌉ bytes }          │
//! │ <Footer> { bloom_offset:u64, version:u32, magic:u32 } │
//! └──────────────────────────────────────────────────────┘
//! ```

mod bloom;
mod reader;
mod types;
mod writer;

pub use bloom::BloomFilter;
pub use reader::{SegmentIter, SegmentReader};
pub use types::{FOOTER_SIZE, SEGMENT_MAGIC, SEGMENT_VERSION};
pub use writer::SstWriter;
