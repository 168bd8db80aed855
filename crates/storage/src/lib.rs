//! # Headchain Storage
//!
//! On-disk persistence for the header chain.
//!
//! Two artifacts live under the storage directory, per network:
//! - **Binary header files** - `<network>Net_<k>.headers`, fixed 80-byte
//!   records, file `k` spanning heights `[k*100000, (k+1)*100000)`. Updates
//!   seek to `(height % 100000) * 80` and overwrite in place.
//! - **Manifest** - `<network>NetBlockHeaders.json`, a JSON side-car
//!   describing each file and the current tip. Its `count` fields are
//!   authoritative: bytes past `count * 80` in a file are stale.
//!
//! The layer trusts its own data: load performs no structural validation
//! beyond decoding, and chain work is recomputed incrementally while
//! reading.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod files;
pub mod manifest;

pub use files::{HeaderFileStore, FILE_SPAN};
pub use manifest::{FileEntry, Manifest};

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur in the persistence layer
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Filesystem I/O failure
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest JSON could not be parsed or written
    #[error("manifest error: {0}")]
    Json(#[from] serde_json::Error),

    /// A persisted header or chain-work field failed to decode
    #[error("persisted data error: {0}")]
    Header(#[from] headchain_types::Error),
}
