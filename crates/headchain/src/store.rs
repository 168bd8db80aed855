//! The in-memory header index.
//!
//! The store is the single source of truth for in-memory chain state. A
//! dense vector maps heights to best-chain hashes; a map holds every header
//! ever admitted, best-chain and side-branch alike. One reader-writer lock
//! guards both; writes never perform I/O.

use crate::{ChainError, Result};
use alloy_primitives::U256;
use headchain_sync::ChainAnchor;
use headchain_types::{chainwork, AnnotatedHeader, Hash256};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// How many blocks below the tip side-branch headers are retained.
pub const ORPHAN_RETENTION: u32 = 100;

#[derive(Default)]
struct StoreInner {
    /// Best-chain hashes, index = height
    by_height: Vec<Hash256>,
    /// Every admitted header: best chain and side branches
    by_hash: HashMap<Hash256, Arc<AnnotatedHeader>>,
    /// The current best header
    tip: Option<Arc<AnnotatedHeader>>,
}

/// In-memory index of the header chain for one network.
pub struct HeaderStore {
    network: String,
    inner: RwLock<StoreInner>,
}

impl HeaderStore {
    /// Creates an empty store for a network.
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            inner: RwLock::new(StoreInner::default()),
        }
    }

    /// The network tag this store serves.
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Returns the best-chain header at a height.
    pub fn get_by_height(&self, height: u32) -> Result<Arc<AnnotatedHeader>> {
        let inner = self.inner.read();
        let hash = inner
            .by_height
            .get(height as usize)
            .ok_or(ChainError::HeaderNotFound)?;
        inner
            .by_hash
            .get(hash)
            .cloned()
            .ok_or(ChainError::HeaderNotFound)
    }

    /// Returns any known header by hash, side branches included.
    pub fn get_by_hash(&self, hash: &Hash256) -> Result<Arc<AnnotatedHeader>> {
        self.inner
            .read()
            .by_hash
            .get(hash)
            .cloned()
            .ok_or(ChainError::HeaderNotFound)
    }

    /// Whether a header with this hash is known.
    pub fn has(&self, hash: &Hash256) -> bool {
        self.inner.read().by_hash.contains_key(hash)
    }

    /// Whether this hash is the best-chain member at its height.
    pub fn is_on_best(&self, hash: &Hash256) -> bool {
        let inner = self.inner.read();
        inner
            .by_hash
            .get(hash)
            .is_some_and(|record| inner.by_height.get(record.height as usize) == Some(hash))
    }

    /// The current best header, if the store is initialized.
    pub fn tip(&self) -> Option<Arc<AnnotatedHeader>> {
        self.inner.read().tip.clone()
    }

    /// The current best height (0 when uninitialized).
    pub fn height(&self) -> u32 {
        self.inner.read().tip.as_ref().map_or(0, |tip| tip.height)
    }

    /// Number of headers on the best chain.
    pub fn count_best(&self) -> usize {
        self.inner.read().by_height.len()
    }

    /// Number of known side-branch headers.
    pub fn count_side(&self) -> usize {
        let inner = self.inner.read();
        inner.by_hash.len().saturating_sub(inner.by_height.len())
    }

    /// Returns up to `count` consecutive best-chain headers starting at
    /// `start`, truncated at the tip.
    pub fn get_range(&self, start: u32, count: u32) -> Vec<Arc<AnnotatedHeader>> {
        let inner = self.inner.read();
        let mut out = Vec::new();
        for height in start..start.saturating_add(count) {
            let Some(hash) = inner.by_height.get(height as usize) else {
                break;
            };
            let Some(record) = inner.by_hash.get(hash) else {
                break;
            };
            out.push(record.clone());
        }
        out
    }

    /// Records a header off the best chain.
    ///
    /// Only `by_hash` is touched; re-adding a known hash is a no-op.
    pub fn add_side(&self, record: AnnotatedHeader) {
        let hash = record.hash();
        let mut inner = self.inner.write();
        if inner.by_hash.contains_key(&hash) {
            return;
        }
        trace!(%hash, height = record.height, "recorded side-branch header");
        inner.by_hash.insert(hash, Arc::new(record));
    }

    /// Installs a branch as the new best chain.
    ///
    /// `branch` must be contiguous, oldest to newest, and its first element
    /// must attach at or below the current best-chain length - the dense
    /// index never grows gaps. Displaced best-chain entries stay in
    /// `by_hash` as side headers until pruning catches up with them. The
    /// tip moves to the branch's last element and old side headers beyond
    /// [`ORPHAN_RETENTION`] are dropped, all under one write lock.
    pub fn apply_branch(&self, branch: &[AnnotatedHeader]) -> Result<()> {
        let Some((first, last)) = branch.first().zip(branch.last()) else {
            return Ok(());
        };

        for (offset, record) in branch.iter().enumerate() {
            if record.height != first.height + offset as u32 {
                return Err(ChainError::BrokenChain(format!(
                    "branch is not contiguous at height {}",
                    record.height
                )));
            }
        }

        let mut inner = self.inner.write();

        if first.height as usize > inner.by_height.len() {
            return Err(ChainError::BrokenChain(format!(
                "branch starts at height {} but chain length is {}",
                first.height,
                inner.by_height.len()
            )));
        }

        let mut tip = None;
        for record in branch {
            let hash = record.hash();
            let index = record.height as usize;
            if index == inner.by_height.len() {
                inner.by_height.push(hash);
            } else {
                inner.by_height[index] = hash;
            }
            let record = Arc::new(record.clone());
            inner.by_hash.insert(hash, record.clone());
            tip = Some(record);
        }

        // A heavier-but-shorter winner leaves stale entries above it.
        let new_len = last.height as usize + 1;
        if inner.by_height.len() > new_len {
            inner.by_height.truncate(new_len);
        }

        inner.tip = tip;
        debug!(
            height = last.height,
            hash = %last.hash(),
            "advanced best chain"
        );

        Self::prune_side_locked(&mut inner, ORPHAN_RETENTION);
        Ok(())
    }

    /// Drops side-branch headers more than `max_depth` below the tip.
    pub fn prune_side(&self, max_depth: u32) {
        let mut inner = self.inner.write();
        Self::prune_side_locked(&mut inner, max_depth);
    }

    fn prune_side_locked(inner: &mut StoreInner, max_depth: u32) {
        let Some(tip) = inner.tip.as_ref() else {
            return;
        };
        let prune_below = tip.height.saturating_sub(max_depth);
        if prune_below == 0 {
            return;
        }

        let by_height = &inner.by_height;
        let before = inner.by_hash.len();
        inner.by_hash.retain(|hash, record| {
            let on_best = by_height
                .get(record.height as usize)
                .is_some_and(|best| best == hash);
            on_best || record.height >= prune_below
        });

        let removed = before - inner.by_hash.len();
        if removed > 0 {
            debug!(removed, prune_below, "pruned stale side-branch headers");
        }
    }

    /// Verifies the store's structural invariants.
    ///
    /// Walks the whole index: density of the by-height vector, parent
    /// linkage, per-block work accumulation, tip maximality, and the
    /// side-header retention bound. Intended for tests and diagnostics.
    pub fn self_check(&self) -> Result<()> {
        let inner = self.inner.read();

        let Some(tip) = inner.tip.as_ref() else {
            if inner.by_height.is_empty() {
                return Ok(());
            }
            return Err(ChainError::BrokenChain(
                "headers indexed but no tip".to_string(),
            ));
        };

        // Density: the dense index ends exactly at the tip.
        if inner.by_height.len() != tip.height as usize + 1 {
            return Err(ChainError::BrokenChain(format!(
                "index length {} does not match tip height {}",
                inner.by_height.len(),
                tip.height
            )));
        }
        if inner.by_height[tip.height as usize] != tip.hash() {
            return Err(ChainError::BrokenChain(
                "tip is not the last indexed header".to_string(),
            ));
        }

        // Linkage and work accumulation along the best chain.
        let mut prev: Option<&Arc<AnnotatedHeader>> = None;
        for (height, hash) in inner.by_height.iter().enumerate() {
            let record = inner.by_hash.get(hash).ok_or_else(|| {
                ChainError::BrokenChain(format!("height {height} missing from by_hash"))
            })?;
            if record.height as usize != height {
                return Err(ChainError::BrokenChain(format!(
                    "record at height {height} claims height {}",
                    record.height
                )));
            }
            if let Some(parent) = prev {
                if record.prev_hash() != parent.hash() {
                    return Err(ChainError::BrokenChain(format!(
                        "linkage broken at height {height}"
                    )));
                }
                let expected =
                    chainwork::add_work(parent.chain_work, record.header.bits)?;
                if record.chain_work != expected {
                    return Err(ChainError::BrokenChain(format!(
                        "work accumulation wrong at height {height}"
                    )));
                }
            }
            prev = Some(record);
        }

        // No known header outweighs the tip, and old side headers are gone.
        let prune_below = tip.height.saturating_sub(ORPHAN_RETENTION);
        for (hash, record) in &inner.by_hash {
            if record.chain_work > tip.chain_work {
                return Err(ChainError::BrokenChain(format!(
                    "header {hash} outweighs the tip"
                )));
            }
            let on_best = inner
                .by_height
                .get(record.height as usize)
                .is_some_and(|best| best == hash);
            if !on_best && record.height < prune_below {
                return Err(ChainError::BrokenChain(format!(
                    "stale side header {hash} at height {}",
                    record.height
                )));
            }
        }

        Ok(())
    }
}

impl ChainAnchor for HeaderStore {
    fn lookup(&self, hash: &Hash256) -> Option<(u32, U256)> {
        self.inner
            .read()
            .by_hash
            .get(hash)
            .map(|record| (record.height, record.chain_work))
    }
}
