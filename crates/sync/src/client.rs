//! HTTP client for a peer's block-by-hash lookup endpoint.

use crate::{Result, SyncError};
use async_trait::async_trait;
use headchain_types::Hash256;
use serde::Deserialize;
use tracing::trace;

/// One block record as served by a peer's lookup endpoint.
///
/// Unknown fields in the response are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockRecord {
    /// Block hash, reversed hex
    #[serde(rename = "Hash")]
    pub hash: Hash256,
    /// Height the peer places this block at
    #[serde(rename = "Height")]
    pub height: u32,
    /// The 80-byte header as hex
    #[serde(rename = "Header")]
    pub header: String,
    /// Parent block hash, reversed hex
    #[serde(rename = "PrevHash")]
    pub prev_hash: Hash256,
}

/// Something that can serve block records by hash.
///
/// [`PeerClient`] is the HTTP implementation; tests substitute an in-memory
/// source.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Fetches the block record with the given hash.
    async fn block_by_hash(&self, hash: &Hash256) -> Result<BlockRecord>;

    /// Fetches the peer's current best block record.
    async fn latest_block(&self) -> Result<BlockRecord>;
}

/// HTTP client for `GET <base>/block/<hash>` and `GET <base>/block/latest`.
#[derive(Debug, Clone)]
pub struct PeerClient {
    client: reqwest::Client,
    base: String,
}

impl PeerClient {
    /// Creates a client for the given peer base URL.
    ///
    /// A missing scheme defaults to `http://`; trailing slashes are
    /// stripped.
    pub fn new(base: &str) -> Self {
        let mut base = base.to_string();
        if !base.starts_with("http://") && !base.starts_with("https://") {
            base = format!("http://{base}");
        }
        let base = base.trim_end_matches('/').to_string();

        Self {
            client: reqwest::Client::new(),
            base,
        }
    }

    /// The normalized base URL.
    pub fn base(&self) -> &str {
        &self.base
    }

    async fn fetch_record(&self, path: &str) -> Result<BlockRecord> {
        let url = format!("{}/{path}", self.base);
        trace!(%url, "fetching block record");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(SyncError::Status {
                status: response.status().as_u16(),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl BlockSource for PeerClient {
    async fn block_by_hash(&self, hash: &Hash256) -> Result<BlockRecord> {
        self.fetch_record(&format!("block/{hash}")).await
    }

    async fn latest_block(&self) -> Result<BlockRecord> {
        self.fetch_record("block/latest").await
    }
}
