//! # Headchain Types
//!
//! Core type definitions for the headchain header chain engine.
//!
//! This crate provides the fundamental types shared by every other crate:
//! - [`Hash256`] - 32-byte double-SHA-256 hashes with reversed-hex display
//! - [`RawHeader`] - the fixed 80-byte proof-of-work block header
//! - [`AnnotatedHeader`] - a header plus its height and cumulative chain work
//! - [`chainwork`] - compact-bits decoding and chain-work arithmetic
//! - [`network`] - network tags and embedded genesis headers
//!
//! ## Example
//!
//! ```rust
//! use headchain_types::{network, Hash256, RawHeader};
//!
//! let genesis = network::genesis_header("main").unwrap();
//! assert_eq!(
//!     genesis.hash().to_string(),
//!     "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
//! );
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod chainwork;
pub mod hash;
pub mod header;
pub mod network;

// Re-export main types at crate root
pub use hash::Hash256;
pub use header::{AnnotatedHeader, RawHeader, HEADER_SIZE};

/// Result type alias for headchain type operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when working with headchain types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid hex string
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Invalid length for a fixed-size type
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Compact difficulty bits decode to a zero target
    #[error("compact bits {bits:#010x} decode to a zero target")]
    ZeroTarget {
        /// The offending compact value
        bits: u32,
    },

    /// Chain-work hex string is malformed or too long
    #[error("invalid chain work hex: {0}")]
    InvalidChainWork(String),
}
