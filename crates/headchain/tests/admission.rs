//! Admission and fork-choice tests against the manager API

use alloy_primitives::U256;
use headchain::{ChainError, ChainManager};
use headchain_types::{chainwork, network, Hash256, RawHeader};
use tempfile::TempDir;

const EASY_BITS: u32 = 0x1d00ffff;
const EASIER_BITS: u32 = 0x1e00ffff;

const GENESIS_HASH: &str = "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";

fn child_of(parent: &RawHeader, bits: u32, nonce: u32) -> RawHeader {
    RawHeader {
        version: 1,
        prev_hash: parent.hash(),
        merkle_root: Hash256::sha256d(&nonce.to_le_bytes()),
        timestamp: parent.timestamp + 600,
        bits,
        nonce,
    }
}

async fn manager_at(dir: &TempDir) -> ChainManager {
    ChainManager::new("main", dir.path().to_str(), None)
        .await
        .unwrap()
}

/// Extends the manager's best chain by `n` headers via admission.
async fn extend(manager: &ChainManager, n: u32) -> Vec<RawHeader> {
    let mut headers = Vec::new();
    for i in 0..n {
        let tip = manager.get_tip().unwrap();
        let header = child_of(&tip.header, EASY_BITS, 1000 + i);
        manager
            .process_announcement(&header.to_bytes(), tip.height + 1, None)
            .await
            .unwrap();
        headers.push(header);
    }
    headers
}

#[tokio::test]
async fn fresh_store_seeds_genesis() {
    let dir = TempDir::new().unwrap();
    let manager = manager_at(&dir).await;

    assert_eq!(manager.get_height(), 0);
    assert_eq!(manager.get_by_height(0).unwrap().hash().to_hex(), GENESIS_HASH);
    assert_eq!(manager.get_tip().unwrap().chain_work, U256::ZERO);
    assert_eq!(manager.get_network(), "main");

    // Genesis is persisted immediately
    assert!(dir.path().join("mainNet_0.headers").exists());
    assert!(dir.path().join("mainNetBlockHeaders.json").exists());

    manager.self_check().unwrap();
}

#[tokio::test]
async fn linear_extension_moves_the_tip() {
    let dir = TempDir::new().unwrap();
    let manager = manager_at(&dir).await;

    let headers = extend(&manager, 3).await;

    assert_eq!(manager.get_height(), 3);
    assert_eq!(
        manager.get_by_height(3).unwrap().hash(),
        headers[2].hash()
    );
    let per_block = chainwork::work_from_bits(EASY_BITS).unwrap();
    assert_eq!(
        manager.get_tip().unwrap().chain_work,
        per_block * U256::from(3u64)
    );
    manager.self_check().unwrap();
}

#[tokio::test]
async fn duplicate_announcement_is_silent() {
    let dir = TempDir::new().unwrap();
    let manager = manager_at(&dir).await;

    let tip = manager.get_tip().unwrap();
    let header = child_of(&tip.header, EASY_BITS, 1);
    let raw = header.to_bytes();

    manager.process_announcement(&raw, 1, None).await.unwrap();
    let side_count = manager.count_side();

    // Same bytes again: accepted silently, nothing changes
    manager.process_announcement(&raw, 1, None).await.unwrap();
    assert_eq!(manager.get_height(), 1);
    assert_eq!(manager.count_side(), side_count);
    assert_eq!(manager.count_best(), 2);
    manager.self_check().unwrap();
}

#[tokio::test]
async fn lighter_fork_stays_on_the_side() {
    let dir = TempDir::new().unwrap();
    let manager = manager_at(&dir).await;
    extend(&manager, 2).await;

    let best_at_tip = manager.get_by_height(2).unwrap();
    let parent = manager.get_by_height(1).unwrap();

    // A competing header at the tip height with less work behind it
    let fork = child_of(&parent.header, EASIER_BITS, 9000);
    manager
        .process_announcement(&fork.to_bytes(), 2, None)
        .await
        .unwrap();

    assert_eq!(manager.get_by_height(2).unwrap().hash(), best_at_tip.hash());
    let side = manager.get_by_hash(&fork.hash()).unwrap();
    assert_eq!(side.height, 2);
    assert!(side.chain_work < best_at_tip.chain_work);
    manager.self_check().unwrap();
}

#[tokio::test]
async fn equal_work_keeps_the_first_seen_tip() {
    let dir = TempDir::new().unwrap();
    let manager = manager_at(&dir).await;
    extend(&manager, 1).await;

    let tip = manager.get_tip().unwrap();
    let parent = manager.get_by_height(0).unwrap();

    let rival = child_of(&parent.header, EASY_BITS, 4444);
    manager
        .process_announcement(&rival.to_bytes(), 1, None)
        .await
        .unwrap();

    assert_eq!(manager.get_tip().unwrap().hash(), tip.hash());
    assert!(manager.get_by_hash(&rival.hash()).is_ok());
    manager.self_check().unwrap();
}

#[tokio::test]
async fn heavier_branch_reorgs_the_chain() {
    let dir = TempDir::new().unwrap();
    let manager = manager_at(&dir).await;
    extend(&manager, 2).await;

    let displaced = manager.get_by_height(2).unwrap();
    let parent = manager.get_by_height(1).unwrap();

    // Two headers extending an alternate branch from height 1
    let alt1 = child_of(&parent.header, EASY_BITS, 7000);
    let alt2 = child_of(&alt1, EASY_BITS, 7001);
    manager
        .process_announcement(&alt1.to_bytes(), 2, None)
        .await
        .unwrap();
    manager
        .process_announcement(&alt2.to_bytes(), 3, None)
        .await
        .unwrap();

    assert_eq!(manager.get_height(), 3);
    assert_eq!(manager.get_by_height(2).unwrap().hash(), alt1.hash());
    assert_eq!(manager.get_by_height(3).unwrap().hash(), alt2.hash());
    // The loser survives as a side header
    assert!(manager.get_by_hash(&displaced.hash()).is_ok());
    manager.self_check().unwrap();
}

#[tokio::test]
async fn wrong_length_is_invalid() {
    let dir = TempDir::new().unwrap();
    let manager = manager_at(&dir).await;

    let err = manager
        .process_announcement(&[0u8; 79], 1, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::InvalidHeader(_)));
}

#[tokio::test]
async fn claimed_height_mismatch_is_invalid() {
    let dir = TempDir::new().unwrap();
    let manager = manager_at(&dir).await;

    let tip = manager.get_tip().unwrap();
    let header = child_of(&tip.header, EASY_BITS, 1);
    let err = manager
        .process_announcement(&header.to_bytes(), 5, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::InvalidHeader(_)));
    assert_eq!(manager.get_height(), 0);
}

#[tokio::test]
async fn degenerate_difficulty_is_invalid() {
    let dir = TempDir::new().unwrap();
    let manager = manager_at(&dir).await;

    let tip = manager.get_tip().unwrap();
    let header = child_of(&tip.header, 0x0000_ffff, 1);
    let err = manager
        .process_announcement(&header.to_bytes(), 1, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::InvalidHeader(_)));
}

#[tokio::test]
async fn unknown_parent_without_peer_is_broken_chain() {
    let dir = TempDir::new().unwrap();
    let manager = manager_at(&dir).await;

    let orphan = RawHeader {
        version: 1,
        prev_hash: Hash256::sha256d(b"elsewhere"),
        merkle_root: Hash256::sha256d(b"root"),
        timestamp: 1_300_000_000,
        bits: EASY_BITS,
        nonce: 1,
    };
    let err = manager
        .process_announcement(&orphan.to_bytes(), 10, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::BrokenChain(_)));
    assert!(manager.get_by_hash(&orphan.hash()).is_err());
}

#[tokio::test]
async fn unreachable_peer_is_broken_chain() {
    let dir = TempDir::new().unwrap();
    let manager = manager_at(&dir).await;

    let orphan = RawHeader {
        version: 1,
        prev_hash: Hash256::sha256d(b"elsewhere"),
        merkle_root: Hash256::sha256d(b"root"),
        timestamp: 1_300_000_000,
        bits: EASY_BITS,
        nonce: 2,
    };
    let err = manager
        .process_announcement(&orphan.to_bytes(), 10, Some("http://127.0.0.1:1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::BrokenChain(_)));
}

#[tokio::test]
async fn merkle_validation_is_gated_on_sync() {
    let dir = TempDir::new().unwrap();
    let manager = manager_at(&dir).await;

    let genesis = network::genesis_header("main").unwrap();
    assert!(matches!(
        manager.is_valid_root_for_height(&genesis.merkle_root, 0),
        Err(ChainError::NotSynced)
    ));
    assert!(matches!(manager.current_height(), Err(ChainError::NotSynced)));

    // The first admitted announcement marks the chain synced
    extend(&manager, 1).await;
    assert!(manager.is_synced());
    assert!(manager
        .is_valid_root_for_height(&genesis.merkle_root, 0)
        .unwrap());
    assert!(!manager
        .is_valid_root_for_height(&Hash256::sha256d(b"bogus"), 0)
        .unwrap());
    assert_eq!(manager.current_height().unwrap(), 1);

    // Heights beyond the tip still miss
    assert!(matches!(
        manager.is_valid_root_for_height(&genesis.merkle_root, 9),
        Err(ChainError::HeaderNotFound)
    ));
}

#[tokio::test]
async fn bulk_export_returns_contiguous_run() {
    let dir = TempDir::new().unwrap();
    let manager = manager_at(&dir).await;
    let headers = extend(&manager, 4).await;

    let range = manager.get_headers_range(1, 2);
    assert_eq!(range.len(), 2);
    assert_eq!(range[0].hash(), headers[0].hash());
    assert_eq!(range[1].hash(), headers[1].hash());

    // Clamped at the tip
    assert_eq!(manager.get_headers_range(3, 10).len(), 2);
    assert!(manager.get_headers_range(40, 2).is_empty());
}

#[tokio::test]
async fn failed_bootstrap_degrades_to_gossip_only() {
    let dir = TempDir::new().unwrap();
    let manager = ChainManager::new("main", dir.path().to_str(), Some("http://127.0.0.1:1"))
        .await
        .unwrap();

    assert_eq!(manager.get_height(), 0);
    assert!(!manager.is_synced());
}

#[tokio::test]
async fn unknown_network_starts_empty() {
    let dir = TempDir::new().unwrap();
    let manager = ChainManager::new("stn", dir.path().to_str(), None)
        .await
        .unwrap();

    assert_eq!(manager.get_height(), 0);
    assert!(manager.get_tip().is_none());
    assert!(matches!(
        manager.get_by_height(0),
        Err(ChainError::HeaderNotFound)
    ));
}
