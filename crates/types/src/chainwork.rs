//! Difficulty and chain-work arithmetic.
//!
//! Converts the compact 32-bit difficulty encoding into a 256-bit target,
//! derives the work contributed by one block, and round-trips cumulative
//! chain work through its padded 64-hex persisted form.

use crate::{Error, Result};
use alloy_primitives::U256;
use std::cmp::Ordering;

/// Decodes the compact difficulty encoding into a 256-bit target.
///
/// The high byte is an exponent, the low 24 bits a mantissa:
/// `target = mantissa << 8*(exponent-3)` for exponent ≥ 3, otherwise the
/// mantissa is shifted right. Targets that would not fit 256 bits clamp to
/// the maximum.
pub fn compact_to_target(bits: u32) -> U256 {
    let exponent = bits >> 24;
    let mantissa = U256::from(bits & 0x00ff_ffff);

    if exponent <= 3 {
        mantissa >> (8 * (3 - exponent) as usize)
    } else {
        mantissa
            .checked_shl(8 * (exponent - 3) as usize)
            .unwrap_or(U256::MAX)
    }
}

/// Encodes a target back into the compact form.
///
/// The encoding is lossy (24 significant bits); decoding the result yields
/// a truncated target, not necessarily the input. A mantissa that would set
/// the sign bit is shifted down one byte, as the wire format requires.
pub fn target_to_compact(target: U256) -> u32 {
    if target.is_zero() {
        return 0;
    }

    let mut exponent = (target.bit_len() + 7) / 8;
    let mut mantissa = if exponent <= 3 {
        (target.to::<u64>() as u32) << (8 * (3 - exponent))
    } else {
        (target >> (8 * (exponent - 3))).to::<u64>() as u32
    };

    if mantissa & 0x0080_0000 != 0 {
        mantissa >>= 8;
        exponent += 1;
    }

    ((exponent as u32) << 24) | (mantissa & 0x007f_ffff)
}

/// Computes the work contributed by one block of the given difficulty.
///
/// Work is `floor(2^256 / (target + 1))`, evaluated without leaving 256-bit
/// arithmetic as `(!target / (target + 1)) + 1`.
///
/// Compact values that decode to a zero target (exponent byte 0, or a zero
/// mantissa) have no defined work and are rejected.
pub fn work_from_bits(bits: u32) -> Result<U256> {
    let target = compact_to_target(bits);
    if target.is_zero() {
        return Err(Error::ZeroTarget { bits });
    }

    let denom = target
        .checked_add(U256::from(1u64))
        .unwrap_or(U256::MAX);
    Ok((!target / denom) + U256::from(1u64))
}

/// Adds one block's work to a cumulative total.
pub fn add_work(total: U256, bits: u32) -> Result<U256> {
    Ok(total.saturating_add(work_from_bits(bits)?))
}

/// Strict arithmetic ordering of two cumulative-work values.
///
/// Fork choice uses strictly-greater: equal work keeps the current tip.
pub fn compare(a: U256, b: U256) -> Ordering {
    a.cmp(&b)
}

/// Formats chain work as the persisted 64-character zero-padded hex form.
pub fn to_hex(work: U256) -> String {
    hex::encode(work.to_be_bytes::<32>())
}

/// Parses chain work from hex of any length up to 64 digits.
pub fn from_hex(s: &str) -> Result<U256> {
    if s.is_empty() || s.len() > 64 {
        return Err(Error::InvalidChainWork(s.to_string()));
    }
    U256::from_str_radix(s, 16).map_err(|_| Error::InvalidChainWork(s.to_string()))
}
