//! # Error Handling
//!
//! Error types for KoreDB operations.
//!
//! ## Design Principles
//!
//! 1. **Contextual**: errors carry the path or reason that produced them
//! 2. **Recoverable vs fatal**: corruption during `open` excludes the
//!    offending file and proceeds; corruption anywhere else surfaces
//! 3. **Propagated**: fallible operations return [`Result`] and use `?`

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for KoreDB operations
pub type Result<T> = std::result::Result<T, Error>;

/// Primary error type for KoreDB
#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Segment footer, magic or internal framing failed verification.
    #[error("corrupt segment {path:?}: {reason}")]
    CorruptSegment { path: PathBuf, reason: String },

    /// Segment carries a format version this build does not understand.
    #[error("unsupported segment version {found} in {path:?}")]
    UnsupportedVersion { path: PathBuf, found: u32 },

    /// WAL framing, size bound or CRC failure. Replay stops at the failure;
    /// batches yielded before the stop remain applied.
    #[error("corrupt wal: {reason}")]
    CorruptWal { reason: String },

    /// A key or key-schema component violated its encoding rules.
    #[error("invalid key: {reason}")]
    InvalidKey { reason: String },

    /// Operation attempted against a closed engine or a spent transaction.
    #[error("invalid state: {message}")]
    InvalidState { message: String },

    /// Value failed to encode or decode.
    #[error("codec error: {message}")]
    Codec { message: String },
}

impl Error {
    /// Whether this error indicates on-disk corruption.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::CorruptSegment { .. } | Error::CorruptWal { .. } | Error::UnsupportedVersion { .. }
        )
    }

    /// Short stable code for log correlation.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Io { .. } => "IO",
            Error::CorruptSegment { .. } => "CORRUPT_SEGMENT",
            Error::UnsupportedVersion { .. } => "UNSUPPORTED_VERSION",
            Error::CorruptWal { .. } => "CORRUPT_WAL",
            Error::InvalidKey { .. } => "INVALID_KEY",
            Error::InvalidState { .. } => "INVALID_STATE",
            Error::Codec { .. } => "CODEC",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            message: err.to_string(),
            source: err,
        }
    }
}
