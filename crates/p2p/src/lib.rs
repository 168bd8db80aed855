//! # Headchain P2P
//!
//! The gossip-bus interface of the header chain engine.
//!
//! The swarm itself - peer discovery, topic routing, transport security -
//! is an external collaborator. This crate defines the seam the engine
//! consumes it through:
//! - [`BlockAnnouncement`] - the JSON payload announcing a new block
//! - [`block_topic`] - the per-network gossip topic name
//! - [`AnnouncementSource`] - the subscription trait a transport implements
//! - [`identity`] - the persisted node keypair (written once, read once)
//!
//! [`ChannelSource`] is an in-process implementation of the seam used by
//! tests and embedded setups.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod identity;
pub mod message;
pub mod source;

pub use message::{block_topic, BlockAnnouncement};
pub use source::{AnnouncementSource, ChannelSource};

/// Result type alias for gossip-interface operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur at the gossip interface
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A gossip payload was not valid announcement JSON
    #[error("invalid announcement payload: {0}")]
    InvalidMessage(#[from] serde_json::Error),

    /// The announcement's header hex was malformed
    #[error("invalid header hex in announcement: {0}")]
    HeaderHex(#[from] hex::FromHexError),

    /// The announcement's header had the wrong size
    #[error("bad announcement header: {0}")]
    Header(#[from] headchain_types::Error),

    /// The node keypair could not be loaded or persisted
    #[error("identity error: {0}")]
    Identity(String),

    /// Key file I/O failure
    #[error("identity I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport could not deliver a subscription
    #[error("subscribe failed: {0}")]
    Subscribe(String),
}
