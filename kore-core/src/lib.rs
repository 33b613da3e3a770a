//! # KoreDB Core
//!
//! Fundamental building blocks shared by every KoreDB crate:
//! - Core data types (keys, values, records, batches)
//! - Error taxonomy
//! - Byte-key ordering and on-disk codecs
//! - Engine-boundary traits
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                    kore-core                    │
//! ├─────────────────────────────────────────────────┤
//! │  • types      - keys, values, records, batches  │
//! │  • error      - error handling                  │
//! │  • codec      - byte order & vector payloads    │
//! │  • config     - engine / index configuration    │
//! │  • traits     - engine boundary interfaces      │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::{Batch, Key, Record, Value};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
