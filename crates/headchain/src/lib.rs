//! # Headchain
//!
//! A verified view of a proof-of-work header chain for a single named
//! network.
//!
//! The engine absorbs block announcements from a gossip bus, reconciles
//! forks by cumulative proof-of-work, backfills gaps from a peer's HTTP
//! lookup endpoint, and persists the best chain as fixed-record binary
//! files so a restart resumes instantly.
//!
//! ## Components
//!
//! - [`HeaderStore`] - the in-memory index: a dense by-height vector for
//!   the best chain and a by-hash map for every known header, guarded by a
//!   single reader-writer lock
//! - [`ChainManager`] - admission, fork choice, reorg application, orphan
//!   pruning, tip-change notifications, and the start/stop lifecycle
//!
//! ## Example
//!
//! ```rust,no_run
//! use headchain::ChainManager;
//! use headchain_p2p::ChannelSource;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), headchain::ChainError> {
//! let manager = Arc::new(ChainManager::new("main", Some("~/.chaintracks"), None).await?);
//!
//! let bus = Arc::new(ChannelSource::new());
//! let cancel = CancellationToken::new();
//! let mut tips = manager.start(bus, cancel.clone()).await?;
//!
//! while let Some(tip) = tips.recv().await {
//!     println!("new tip at height {}", tip.height);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod manager;
pub mod store;

pub use manager::{resolve_storage_path, ChainManager};
pub use store::{HeaderStore, ORPHAN_RETENTION};

// Re-export the record types callers handle
pub use headchain_types::{AnnotatedHeader, Hash256, RawHeader};

use headchain_sync::SyncError;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, ChainError>;

/// Errors surfaced at the engine boundary
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// A lookup missed: the height or hash is unknown
    #[error("header not found")]
    HeaderNotFound,

    /// The header is already known (handled internally, never surfaced by
    /// admission)
    #[error("duplicate header")]
    DuplicateHeader,

    /// The header failed structural checks: bad length, unparsable bytes,
    /// degenerate difficulty, or a height that contradicts its parent
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Reserved for a strict mode verifying work against the target
    #[error("insufficient proof of work")]
    InsufficientPoW,

    /// The header does not link to the known chain and backfill could not
    /// close the gap
    #[error("broken chain linkage: {0}")]
    BrokenChain(String),

    /// Reserved for future median-time-past enforcement
    #[error("invalid timestamp")]
    InvalidTimestamp,

    /// Merkle-root validation was asked for before the chain caught up to
    /// the network
    #[error("chain is not synced yet")]
    NotSynced,

    /// The gossip lifecycle was started twice
    #[error("gossip listener already started")]
    AlreadyStarted,

    /// The storage path could not be resolved
    #[error("configuration error: {0}")]
    Config(String),

    /// Persistence failed; in-memory state is already committed
    #[error(transparent)]
    Storage(#[from] headchain_storage::StorageError),

    /// The gossip interface failed
    #[error(transparent)]
    Gossip(#[from] headchain_p2p::Error),
}

impl From<headchain_types::Error> for ChainError {
    fn from(e: headchain_types::Error) -> Self {
        ChainError::InvalidHeader(e.to_string())
    }
}

impl From<SyncError> for ChainError {
    fn from(e: SyncError) -> Self {
        let message = e.to_string();
        match e {
            SyncError::Header(_) | SyncError::HeaderHex(_) | SyncError::HeightMismatch { .. } => {
                ChainError::InvalidHeader(message)
            }
            SyncError::Http(_) | SyncError::Status { .. } | SyncError::DepthExceeded { .. } => {
                ChainError::BrokenChain(message)
            }
        }
    }
}
