//! The bounded backward crawl that stitches a remote tip to the known chain.

use crate::client::BlockSource;
use crate::{Result, SyncError};
use alloy_primitives::U256;
use headchain_types::{chainwork, AnnotatedHeader, Hash256, RawHeader};
use std::collections::VecDeque;
use tracing::{debug, info};

/// Maximum parent hops per backfill walk (one difficulty period).
pub const MAX_BACKFILL_HOPS: usize = 2016;

/// Read-only view of the known chain, implemented by the header store.
///
/// Lookups are expected to take a short-lived read lock; no lock is held
/// across the HTTP requests of a walk.
pub trait ChainAnchor: Send + Sync {
    /// Returns the height and cumulative work of a known header.
    fn lookup(&self, hash: &Hash256) -> Option<(u32, U256)>;

    /// Whether the hash is known at all.
    fn contains(&self, hash: &Hash256) -> bool {
        self.lookup(hash).is_some()
    }
}

/// Walks parent pointers from `target` until the known chain is reached and
/// returns the gathered branch, oldest first, annotated with heights and
/// cumulative work seeded from the known parent.
///
/// The first element's parent is guaranteed to satisfy `anchor.lookup`; the
/// last element is the record for `target` itself. The caller decides via
/// fork choice whether the branch is worth applying.
pub async fn backfill_branch(
    source: &dyn BlockSource,
    anchor: &dyn ChainAnchor,
    target: Hash256,
) -> Result<Vec<AnnotatedHeader>> {
    let mut gathered: VecDeque<(RawHeader, u32)> = VecDeque::new();
    let mut cursor = target;
    let mut anchor_info = None;

    for hop in 0..MAX_BACKFILL_HOPS {
        let record = source.block_by_hash(&cursor).await?;
        let header = RawHeader::from_hex(&record.header)?;
        gathered.push_front((header, record.height));

        let prev = header.prev_hash;
        if let Some(found) = anchor.lookup(&prev) {
            debug!(hops = hop + 1, parent = %prev, "backfill reached known chain");
            anchor_info = Some(found);
            break;
        }
        cursor = prev;
    }

    let (parent_height, parent_work) = anchor_info.ok_or(SyncError::DepthExceeded {
        hops: MAX_BACKFILL_HOPS,
    })?;

    let mut branch = Vec::with_capacity(gathered.len());
    let mut work = parent_work;
    for (i, (header, claimed_height)) in gathered.into_iter().enumerate() {
        let height = parent_height + 1 + i as u32;
        if claimed_height != height {
            return Err(SyncError::HeightMismatch {
                hash: header.hash(),
                claimed: claimed_height,
                computed: height,
            });
        }
        work = chainwork::add_work(work, header.bits)?;
        branch.push(AnnotatedHeader::new(header, height, work));
    }

    info!(
        len = branch.len(),
        tip = %target,
        "backfill assembled branch"
    );
    Ok(branch)
}
