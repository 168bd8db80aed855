//! Block announcement payloads and topic naming.

use crate::Result;
use headchain_types::RawHeader;
use serde::{Deserialize, Serialize};

/// Builds the gossip topic name for a network's block announcements.
///
/// ```rust
/// assert_eq!(
///     headchain_p2p::block_topic("main"),
///     "teranode/bitcoin/1.0.0/mainnet-block"
/// );
/// ```
pub fn block_topic(network: &str) -> String {
    format!("teranode/bitcoin/1.0.0/{network}net-block")
}

/// A block announcement as published on the gossip bus.
///
/// Field names match the wire JSON; unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockAnnouncement {
    /// Identity of the announcing peer
    #[serde(rename = "PeerID", default)]
    pub peer_id: String,
    /// Client software name of the announcer
    #[serde(rename = "ClientName", default)]
    pub client_name: String,
    /// Base URL of the announcer's block lookup service
    #[serde(rename = "DataHubURL", default)]
    pub data_hub_url: String,
    /// Announced block hash, reversed hex
    #[serde(rename = "Hash", default)]
    pub hash: String,
    /// Height the announcer places the block at
    #[serde(rename = "Height")]
    pub height: u32,
    /// The 80-byte header as hex
    #[serde(rename = "Header")]
    pub header: String,
    /// Coinbase transaction hex (unused by the engine)
    #[serde(rename = "Coinbase", default)]
    pub coinbase: String,
}

impl BlockAnnouncement {
    /// Parses an announcement from a raw gossip payload.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Decodes the announced header from its hex field.
    pub fn decode_header(&self) -> Result<RawHeader> {
        let bytes = hex::decode(&self.header)?;
        Ok(RawHeader::from_bytes(&bytes)?)
    }

    /// Serializes the announcement into a gossip payload.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use headchain_types::network;

    #[test]
    fn topics_are_per_network() {
        assert_eq!(block_topic("main"), "teranode/bitcoin/1.0.0/mainnet-block");
        assert_eq!(block_topic("test"), "teranode/bitcoin/1.0.0/testnet-block");
    }

    #[test]
    fn announcement_round_trips() {
        let genesis = network::genesis_header("main").unwrap();
        let announcement = BlockAnnouncement {
            peer_id: "12D3KooW".to_string(),
            client_name: "headchain".to_string(),
            data_hub_url: "http://hub.example".to_string(),
            hash: genesis.hash().to_hex(),
            height: 0,
            header: hex::encode(genesis.to_bytes()),
            coinbase: String::new(),
        };

        let payload = announcement.to_payload().unwrap();
        let parsed = BlockAnnouncement::from_payload(&payload).unwrap();
        assert_eq!(parsed.height, 0);
        assert_eq!(parsed.decode_header().unwrap(), genesis);
    }

    #[test]
    fn wire_field_names_are_pascal_case() {
        let json = r#"{
            "PeerID": "p",
            "ClientName": "c",
            "DataHubURL": "http://hub",
            "Hash": "00",
            "Height": 7,
            "Header": "ff",
            "Coinbase": "",
            "Extra": "ignored"
        }"#;
        let parsed = BlockAnnouncement::from_payload(json.as_bytes()).unwrap();
        assert_eq!(parsed.height, 7);
        assert_eq!(parsed.data_hub_url, "http://hub");
    }

    #[test]
    fn truncated_header_hex_is_rejected() {
        let announcement = BlockAnnouncement {
            peer_id: String::new(),
            client_name: String::new(),
            data_hub_url: String::new(),
            hash: String::new(),
            height: 1,
            header: "deadbeef".to_string(),
            coinbase: String::new(),
        };
        assert!(announcement.decode_header().is_err());
    }
}
