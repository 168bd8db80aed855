//! 32-byte hash type with double-SHA-256 support.
//!
//! Block hashes are the double SHA-256 of the 80-byte header, stored in
//! digest (little-endian) byte order. The conventional textual form reverses
//! the bytes, so [`Hash256`] displays and parses hex in that reversed order.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Size of a hash in bytes
pub const HASH_SIZE: usize = 32;

/// A 32-byte hash value in digest byte order.
///
/// # Example
///
/// ```rust
/// use headchain_types::Hash256;
///
/// let hash = Hash256::sha256d(b"hello world");
///
/// // Textual form is the byte-reversed hex used by block explorers
/// let parsed: Hash256 =
///     "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f".parse().unwrap();
/// assert_ne!(hash, parsed);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash256([u8; HASH_SIZE]);

impl Hash256 {
    /// The all-zero hash, used as the previous-hash of genesis.
    pub const ZERO: Self = Self([0u8; HASH_SIZE]);

    /// Creates a new hash from a 32-byte array in digest order.
    #[inline]
    pub const fn new(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    /// Creates a hash from a slice in digest order.
    ///
    /// Returns an error if the slice length is not exactly 32 bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != HASH_SIZE {
            return Err(Error::InvalidLength {
                expected: HASH_SIZE,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; HASH_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Computes the double SHA-256 of the given data.
    pub fn sha256d(data: &[u8]) -> Self {
        let first = Sha256::digest(data);
        let second = Sha256::digest(first);
        let mut bytes = [0u8; HASH_SIZE];
        bytes.copy_from_slice(&second);
        Self(bytes)
    }

    /// Returns the hash as a byte slice in digest order.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the hash as a fixed-size byte array in digest order.
    #[inline]
    pub const fn as_fixed_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Checks if this is the all-zero hash.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self == &Self::ZERO
    }

    /// Parses a hash from its conventional byte-reversed hex form.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != HASH_SIZE * 2 {
            return Err(Error::InvalidLength {
                expected: HASH_SIZE * 2,
                actual: s.len(),
            });
        }
        let mut bytes = hex::decode(s)?;
        bytes.reverse();
        Self::from_slice(&bytes)
    }

    /// Returns the conventional byte-reversed hex form.
    pub fn to_hex(&self) -> String {
        let mut bytes = self.0;
        bytes.reverse();
        hex::encode(bytes)
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter().rev() {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl FromStr for Hash256 {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl From<[u8; HASH_SIZE]> for Hash256 {
    fn from(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }
}

impl From<Hash256> for [u8; HASH_SIZE] {
    fn from(hash: Hash256) -> Self {
        hash.0
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Hash256 {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
