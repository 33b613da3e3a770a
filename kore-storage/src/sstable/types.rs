//! Segment format constants

/// "KORE" interpreted as a little-endian u32 in the footer.
pub const SEGMENT_MAGIC: u32 = 0x4B4F5245;

pub const SEGMENT_VERSION: u32 = 1;

/// `{bloom_offset: u64, version: u32, magic: u32}`, always the last 16
/// bytes of the file. The minimum legal segment length.
pub const FOOTER_SIZE: usize = 16;

/// Per-record header: key_size + value_size.
pub const RECORD_HEADER_SIZE: usize = 8;
