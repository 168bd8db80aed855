//! The admission coordinator.
//!
//! [`ChainManager`] owns the header store and the persistence layer, absorbs
//! block announcements, runs fork choice by cumulative work, backfills gaps
//! from the announcing peer, and publishes tip changes on a single-slot
//! channel. Store mutations happen under the store's write lock; persistence
//! and backfill I/O always run outside it.

use crate::store::HeaderStore;
use crate::{ChainError, Result};
use alloy_primitives::U256;
use headchain_p2p::{block_topic, identity, AnnouncementSource, BlockAnnouncement};
use headchain_storage::HeaderFileStore;
use headchain_sync::{backfill_branch, BlockSource, PeerClient};
use headchain_types::{network, AnnotatedHeader, Hash256, RawHeader, HEADER_SIZE};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Resolves a configured storage path.
///
/// `None` (or blank) defaults to `<home>/.chaintracks`; a leading `~` is
/// expanded to the home directory.
pub fn resolve_storage_path(path: Option<&str>) -> Result<PathBuf> {
    let home = || {
        dirs::home_dir()
            .ok_or_else(|| ChainError::Config("could not determine home directory".to_string()))
    };

    match path {
        None | Some("") => Ok(home()?.join(".chaintracks")),
        Some("~") => home(),
        Some(p) if p.starts_with("~/") => Ok(home()?.join(&p[2..])),
        Some(p) => Ok(PathBuf::from(p)),
    }
}

/// Orchestrates header admission, fork choice, persistence, and the gossip
/// lifecycle for one network.
pub struct ChainManager {
    store: Arc<HeaderStore>,
    files: HeaderFileStore,
    network: String,
    storage_path: PathBuf,
    bootstrap_url: Option<String>,
    synced: AtomicBool,
    tip_tx: Mutex<Option<mpsc::Sender<Arc<AnnotatedHeader>>>>,
    last_published: Mutex<Option<Hash256>>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl ChainManager {
    /// Creates a manager, restoring the best chain from local files.
    ///
    /// An empty store on a known network seeds the embedded genesis header.
    /// When a bootstrap endpoint is given, the manager syncs to that peer's
    /// tip before returning; bootstrap failures are logged and degrade to
    /// gossip-only operation.
    pub async fn new(
        network: &str,
        storage_path: Option<&str>,
        bootstrap_url: Option<&str>,
    ) -> Result<Self> {
        let path = resolve_storage_path(storage_path)?;
        info!(network, path = %path.display(), "chain manager initializing");

        let store = Arc::new(HeaderStore::new(network));
        let files = HeaderFileStore::new(&path, network);

        let restored = files.load()?;
        if !restored.is_empty() {
            store.apply_branch(&restored)?;
            info!(height = store.height(), "restored best chain from disk");
        } else if let Some(genesis) = network::genesis_header(network) {
            let record = AnnotatedHeader::new(genesis, 0, U256::ZERO);
            store.apply_branch(std::slice::from_ref(&record))?;
            files.persist_branch(std::slice::from_ref(&record), None)?;
            info!(hash = %record.hash(), "seeded genesis header");
        } else {
            warn!(network, "no embedded genesis for this network, starting empty");
        }

        let manager = Self {
            store,
            files,
            network: network.to_string(),
            storage_path: path,
            bootstrap_url: bootstrap_url.map(String::from),
            synced: AtomicBool::new(false),
            tip_tx: Mutex::new(None),
            last_published: Mutex::new(None),
            cancel: Mutex::new(None),
        };

        if let Some(url) = manager.bootstrap_url.clone() {
            info!(%url, "bootstrap endpoint configured");
            match manager.bootstrap(&url).await {
                Ok(()) => {
                    manager.mark_synced();
                    if let Some(tip) = manager.store.tip() {
                        info!(height = tip.height, hash = %tip.hash(), "chain tip after bootstrap");
                    }
                }
                Err(error) => {
                    warn!(%error, "bootstrap sync failed, continuing with gossip only");
                }
            }
        }

        Ok(manager)
    }

    /// The network tag this manager serves.
    pub fn get_network(&self) -> &str {
        &self.network
    }

    /// The resolved storage directory.
    pub fn storage_path(&self) -> &std::path::Path {
        &self.storage_path
    }

    /// The current best header, if any.
    pub fn get_tip(&self) -> Option<Arc<AnnotatedHeader>> {
        self.store.tip()
    }

    /// The current best height (0 when uninitialized).
    pub fn get_height(&self) -> u32 {
        self.store.height()
    }

    /// Returns the best-chain header at a height.
    pub fn get_by_height(&self, height: u32) -> Result<Arc<AnnotatedHeader>> {
        self.store.get_by_height(height)
    }

    /// Returns any known header by hash, side branches included.
    pub fn get_by_hash(&self, hash: &Hash256) -> Result<Arc<AnnotatedHeader>> {
        self.store.get_by_hash(hash)
    }

    /// Returns up to `count` consecutive best-chain headers for bulk export.
    pub fn get_headers_range(&self, start: u32, count: u32) -> Vec<Arc<AnnotatedHeader>> {
        self.store.get_range(start, count)
    }

    /// Number of headers on the best chain.
    pub fn count_best(&self) -> usize {
        self.store.count_best()
    }

    /// Number of known side-branch headers.
    pub fn count_side(&self) -> usize {
        self.store.count_side()
    }

    /// Whether the engine considers itself caught up to the network.
    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    /// Validates a merkle root against the best-chain header at a height.
    ///
    /// Only answered once the chain is synced.
    pub fn is_valid_root_for_height(&self, root: &Hash256, height: u32) -> Result<bool> {
        if !self.is_synced() {
            return Err(ChainError::NotSynced);
        }
        let record = self.store.get_by_height(height)?;
        Ok(record.header.merkle_root == *root)
    }

    /// The current best height, gated on sync like merkle validation.
    pub fn current_height(&self) -> Result<u32> {
        if !self.is_synced() {
            return Err(ChainError::NotSynced);
        }
        Ok(self.store.height())
    }

    /// Verifies the store's structural invariants (tests and diagnostics).
    pub fn self_check(&self) -> Result<()> {
        self.store.self_check()
    }

    /// Admits one announced header.
    ///
    /// Duplicates return silently. A known parent yields a single-record
    /// branch; an unknown parent triggers a backward crawl against the
    /// announcing peer. Either way the branch is applied only if it
    /// outweighs the current tip, and persisted and published when it does.
    pub async fn process_announcement(
        &self,
        raw_header: &[u8],
        claimed_height: u32,
        peer_endpoint: Option<&str>,
    ) -> Result<()> {
        let header = RawHeader::from_bytes(raw_header)?;
        let hash = header.hash();

        if self.store.has(&hash) {
            trace!(%hash, "duplicate announcement ignored");
            if self.store.tip().is_some_and(|tip| tip.hash() == hash) {
                self.mark_synced();
            }
            return Ok(());
        }

        match self.store.get_by_hash(&header.prev_hash) {
            Ok(parent) => {
                let height = parent.height + 1;
                if claimed_height != height {
                    return Err(ChainError::InvalidHeader(format!(
                        "announced height {claimed_height} but parent is at {}",
                        parent.height
                    )));
                }
                let work = headchain_types::chainwork::add_work(parent.chain_work, header.bits)?;
                let record = AnnotatedHeader::new(header, height, work);
                self.adopt_branch(vec![record])?;
            }
            Err(_) => {
                let Some(peer) = peer_endpoint else {
                    return Err(ChainError::BrokenChain(format!(
                        "parent {} unknown and no peer endpoint to crawl",
                        header.prev_hash
                    )));
                };
                debug!(%hash, peer, "parent unknown, crawling back");
                let client = PeerClient::new(peer);
                let branch = backfill_branch(&client, self.store.as_ref(), hash).await?;
                self.adopt_branch(branch)?;
            }
        }

        self.mark_synced();
        Ok(())
    }

    /// Interprets a raw gossip payload and feeds it into admission.
    pub async fn handle_announcement(&self, payload: &[u8]) -> Result<()> {
        let message = BlockAnnouncement::from_payload(payload).map_err(ChainError::Gossip)?;
        debug!(
            height = message.height,
            hash = %message.hash,
            peer = %message.peer_id,
            "received block announcement"
        );

        let raw = hex::decode(&message.header)
            .map_err(|e| ChainError::InvalidHeader(format!("header hex: {e}")))?;
        if raw.len() != HEADER_SIZE {
            return Err(ChainError::InvalidHeader(format!(
                "announced header is {} bytes",
                raw.len()
            )));
        }

        let peer = (!message.data_hub_url.is_empty()).then_some(message.data_hub_url.as_str());
        self.process_announcement(&raw, message.height, peer).await
    }

    /// Starts consuming block announcements from the gossip bus.
    ///
    /// Ensures a persisted node identity exists for the transport,
    /// subscribes to the network's block topic, and spawns the ingestion
    /// loop. Returns the tip-change channel: capacity one, newest update
    /// dropped when the consumer lags, closed when the loop exits.
    pub async fn start(
        self: &Arc<Self>,
        source: Arc<dyn AnnouncementSource>,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<Arc<AnnotatedHeader>>> {
        if self.cancel.lock().is_some() {
            return Err(ChainError::AlreadyStarted);
        }

        identity::load_or_generate_keypair(&self.storage_path)?;

        let topic = block_topic(&self.network);
        info!(%topic, "subscribing to block announcements");
        let mut announcements = source.subscribe(&topic).await?;

        let (tip_tx, tip_rx) = mpsc::channel(1);
        *self.tip_tx.lock() = Some(tip_tx);
        *self.cancel.lock() = Some(cancel.clone());

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    payload = announcements.recv() => {
                        match payload {
                            Some(payload) => {
                                if let Err(error) = manager.handle_announcement(&payload).await {
                                    warn!(%error, "failed to handle block announcement");
                                }
                            }
                            None => break,
                        }
                    }
                }
            }
            // Dropping the sender closes the tip channel for consumers.
            manager.tip_tx.lock().take();
            info!("gossip listener stopped");
        });

        Ok(tip_rx)
    }

    /// Stops the gossip listener, if running.
    pub fn stop(&self) {
        if let Some(cancel) = self.cancel.lock().take() {
            info!("stopping gossip listener");
            cancel.cancel();
        }
    }

    /// Syncs to the bootstrap peer's current tip.
    async fn bootstrap(&self, url: &str) -> Result<()> {
        let client = PeerClient::new(url);
        let latest = client.latest_block().await?;
        let remote_tip = latest.hash;
        info!(tip = %remote_tip, height = latest.height, "bootstrap peer tip");

        if self.store.has(&remote_tip) {
            debug!("bootstrap tip already known");
            return Ok(());
        }

        let branch = backfill_branch(&client, self.store.as_ref(), remote_tip).await?;
        self.adopt_branch(branch)
    }

    /// Runs fork choice on a connected branch and commits the outcome.
    ///
    /// A branch that does not strictly outweigh the current tip is kept as
    /// side headers only (ties preserve the tip). A winning branch is
    /// applied under the store lock, then persisted and published outside
    /// it.
    fn adopt_branch(&self, branch: Vec<AnnotatedHeader>) -> Result<()> {
        let Some(candidate) = branch.last() else {
            return Ok(());
        };

        let heavier = self
            .store
            .tip()
            .map_or(true, |tip| candidate.chain_work > tip.chain_work);
        if !heavier {
            debug!(
                height = candidate.height,
                hash = %candidate.hash(),
                "branch does not outweigh tip, keeping as side headers"
            );
            for record in branch {
                self.store.add_side(record);
            }
            return Ok(());
        }

        info!(
            height = candidate.height,
            hash = %candidate.hash(),
            len = branch.len(),
            "new best tip"
        );
        let branch = self.complete_to_fork_point(branch)?;
        self.store.apply_branch(&branch)?;

        let Some(tip) = self.store.tip() else {
            return Ok(());
        };
        let prev_of_tip = tip
            .height
            .checked_sub(1)
            .and_then(|h| self.store.get_by_height(h).ok());

        if let Err(e) = self
            .files
            .persist_branch(&branch, prev_of_tip.as_deref())
        {
            error!(error = %e, "failed to persist branch; in-memory state already advanced");
            return Err(e.into());
        }

        self.publish_tip(tip);
        Ok(())
    }

    /// Extends a winning branch backwards through stored side headers until
    /// its first element attaches to the best chain.
    ///
    /// The dense index is rewritten from the fork point, so a branch whose
    /// parent is itself a side header must carry that ancestry with it.
    /// A missing (already pruned) ancestor aborts the reorg.
    fn complete_to_fork_point(&self, branch: Vec<AnnotatedHeader>) -> Result<Vec<AnnotatedHeader>> {
        let Some(first) = branch.first() else {
            return Ok(branch);
        };

        let mut prefix = Vec::new();
        let mut cursor = first.prev_hash();
        while !cursor.is_zero() && !self.store.is_on_best(&cursor) {
            let record = self.store.get_by_hash(&cursor).map_err(|_| {
                ChainError::BrokenChain(format!("reorg ancestor {cursor} is not known"))
            })?;
            cursor = record.prev_hash();
            prefix.push((*record).clone());
        }

        if prefix.is_empty() {
            return Ok(branch);
        }

        prefix.reverse();
        debug!(
            fork_height = prefix[0].height,
            carried = prefix.len(),
            "reorg branches below the tip"
        );
        prefix.extend(branch);
        Ok(prefix)
    }

    /// Publishes a tip change without ever blocking the writer.
    ///
    /// Consecutive duplicates are suppressed; a full channel drops the
    /// update.
    fn publish_tip(&self, tip: Arc<AnnotatedHeader>) {
        let hash = tip.hash();
        let mut last = self.last_published.lock();
        if *last == Some(hash) {
            return;
        }

        let guard = self.tip_tx.lock();
        if let Some(tx) = guard.as_ref() {
            match tx.try_send(tip) {
                Ok(()) => *last = Some(hash),
                Err(TrySendError::Full(_)) => {
                    trace!(%hash, "tip consumer lagging, update dropped");
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }
    }

    fn mark_synced(&self) {
        if !self.synced.swap(true, Ordering::AcqRel) {
            info!(network = %self.network, "chain considered synced");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_storage_path_is_used_verbatim() {
        let path = resolve_storage_path(Some("/tmp/headers")).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/headers"));
    }

    #[test]
    fn default_storage_path_is_under_home() {
        let path = resolve_storage_path(None).unwrap();
        assert!(path.ends_with(".chaintracks"));
    }

    #[test]
    fn tilde_is_expanded() {
        let path = resolve_storage_path(Some("~/headers")).unwrap();
        assert!(path.ends_with("headers"));
        assert!(!path.to_string_lossy().contains('~'));
    }
}
