//! The 80-byte proof-of-work block header and its annotated form.
//!
//! [`RawHeader`] mirrors the wire layout exactly; [`AnnotatedHeader`] is what
//! the chain engine stores: the parsed header plus the height it sits at and
//! the cumulative work of its ancestry.

use crate::{Error, Hash256, Result};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Serialized size of a block header in bytes
pub const HEADER_SIZE: usize = 80;

/// A parsed proof-of-work block header.
///
/// Field order matches the serialized little-endian layout: version,
/// prev_hash, merkle_root, timestamp, bits, nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawHeader {
    /// Block version
    pub version: i32,
    /// Hash of the parent block (zero for genesis)
    pub prev_hash: Hash256,
    /// Merkle root of the block's transactions
    pub merkle_root: Hash256,
    /// Block timestamp (Unix seconds)
    pub timestamp: u32,
    /// Compact difficulty target encoding
    pub bits: u32,
    /// Proof-of-work nonce
    pub nonce: u32,
}

impl RawHeader {
    /// Decodes a header from its 80-byte serialized form.
    ///
    /// Any other input length is rejected.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() != HEADER_SIZE {
            return Err(Error::InvalidLength {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }

        let version = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let prev_hash = Hash256::from_slice(&data[4..36])?;
        let merkle_root = Hash256::from_slice(&data[36..68])?;
        let timestamp = u32::from_le_bytes([data[68], data[69], data[70], data[71]]);
        let bits = u32::from_le_bytes([data[72], data[73], data[74], data[75]]);
        let nonce = u32::from_le_bytes([data[76], data[77], data[78], data[79]]);

        Ok(Self {
            version,
            prev_hash,
            merkle_root,
            timestamp,
            bits,
            nonce,
        })
    }

    /// Decodes a header from an 80-byte hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)?;
        Self::from_bytes(&bytes)
    }

    /// Serializes the header into its 80-byte wire form.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.version.to_le_bytes());
        out[4..36].copy_from_slice(self.prev_hash.as_bytes());
        out[36..68].copy_from_slice(self.merkle_root.as_bytes());
        out[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        out[72..76].copy_from_slice(&self.bits.to_le_bytes());
        out[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }

    /// Computes the block hash: double SHA-256 of the serialized header.
    pub fn hash(&self) -> Hash256 {
        Hash256::sha256d(&self.to_bytes())
    }
}

impl fmt::Display for RawHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "header {} (parent {})", self.hash(), self.prev_hash)
    }
}

/// A block header annotated with its position and cumulative work.
///
/// Records are immutable once created: a reorg produces new records for the
/// winning branch instead of mutating existing ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedHeader {
    /// The parsed header
    #[serde(flatten)]
    pub header: RawHeader,
    /// Height of this header on the branch it belongs to
    pub height: u32,
    /// Cumulative work from genesis up to and including this header
    #[serde(with = "chain_work_hex")]
    pub chain_work: U256,
}

impl AnnotatedHeader {
    /// Creates an annotated record for a header at the given position.
    pub fn new(header: RawHeader, height: u32, chain_work: U256) -> Self {
        Self {
            header,
            height,
            chain_work,
        }
    }

    /// Returns the block hash of the underlying header.
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    /// Returns the parent hash of the underlying header.
    pub fn prev_hash(&self) -> Hash256 {
        self.header.prev_hash
    }
}

impl fmt::Display for AnnotatedHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block #{} ({})", self.height, self.hash())
    }
}

/// Serde helper serializing chain work as the padded 64-hex form.
mod chain_work_hex {
    use crate::chainwork;
    use alloy_primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(work: &U256, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&chainwork::to_hex(*work))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        chainwork::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
