//! Network tags and embedded genesis headers.
//!
//! The network tag ("main", "test", …) selects on-disk file names and the
//! gossip topic. For the known networks the 80-byte genesis header is
//! embedded so an empty store can seed itself without any remote help.

use crate::RawHeader;

/// Mainnet genesis header,
/// hash 000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f
const GENESIS_MAIN: &str = "01000000000000000000000000000000000000000000000000000000000000000000\
                            00003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a\
                            29ab5f49ffff001d1dac2b7c";

/// Testnet genesis header,
/// hash 000000000933ea01ad0ee984209779baaec3ced90fa3f408719526f8d77f4943
const GENESIS_TEST: &str = "01000000000000000000000000000000000000000000000000000000000000000000\
                            00003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a\
                            dae5494dffff001d1aa4ae18";

/// Returns the embedded genesis header for a known network tag.
///
/// Unknown tags return `None`; such chains start empty and rely on restored
/// files or a remote bootstrap to obtain their genesis.
pub fn genesis_header(network: &str) -> Option<RawHeader> {
    let hex = match network {
        "main" => GENESIS_MAIN,
        "test" => GENESIS_TEST,
        _ => return None,
    };
    let header = RawHeader::from_hex(hex).expect("embedded genesis header is valid");
    Some(header)
}
