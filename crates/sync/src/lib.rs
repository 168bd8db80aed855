//! # Headchain Sync
//!
//! Remote backfill for the header chain engine.
//!
//! When a gossiped header's parent is unknown, the engine walks parent
//! pointers backwards over a peer's HTTP block-lookup endpoint until it
//! reaches a header it already knows, then hands the gathered branch back
//! for fork choice. The same client powers the optional startup bootstrap
//! from a remote tip.
//!
//! The walk is bounded at [`MAX_BACKFILL_HOPS`] (one difficulty period) to
//! keep a hostile or confused peer from dragging the engine through an
//! unbounded ancestry.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod backfill;
pub mod client;

pub use backfill::{backfill_branch, ChainAnchor, MAX_BACKFILL_HOPS};
pub use client::{BlockRecord, BlockSource, PeerClient};

use headchain_types::Hash256;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur while backfilling from a remote peer
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Transport-level HTTP failure
    #[error("peer request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Peer answered with a non-success status
    #[error("peer returned status {status}")]
    Status {
        /// The HTTP status code
        status: u16,
    },

    /// A fetched header failed to decode
    #[error("fetched header is malformed: {0}")]
    Header(#[from] headchain_types::Error),

    /// Header hex in the peer response was malformed
    #[error("invalid header hex: {0}")]
    HeaderHex(#[from] hex::FromHexError),

    /// The walk never reached a known header within the hop bound
    #[error("backfill exceeded {hops} hops without reaching the known chain")]
    DepthExceeded {
        /// The configured hop bound
        hops: usize,
    },

    /// A peer-claimed height disagrees with the height computed from the
    /// anchor
    #[error("peer claims height {claimed} for {hash}, ancestry says {computed}")]
    HeightMismatch {
        /// Hash of the offending record
        hash: Hash256,
        /// Height the peer claimed
        claimed: u32,
        /// Height computed from the known parent
        computed: u32,
    },
}
