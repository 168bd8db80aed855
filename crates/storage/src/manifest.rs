//! The JSON manifest describing the binary header files.
//!
//! Field names follow the wire format exactly; consumers of the exported
//! files parse this document verbatim.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Number of header records each binary file spans.
pub const HEADERS_PER_FILE: u32 = 100_000;

const ZERO_HEX: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Top-level manifest document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Root folder the files live under (blank for a flat layout)
    pub root_folder: String,
    /// Name of this manifest file
    pub json_filename: String,
    /// Height span covered by each binary file
    pub headers_per_file: u32,
    /// One entry per binary file, in height order
    pub files: Vec<FileEntry>,
}

/// Description of one binary header file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Network tag the file belongs to
    pub chain: String,
    /// Number of header records actually present in the file
    pub count: u32,
    /// Optional digest of the file contents (may be blank)
    pub file_hash: String,
    /// File name relative to the storage directory
    pub file_name: String,
    /// Height of the first record in the file
    pub first_height: u32,
    /// Cumulative chain work of the last record, padded 64-hex
    pub last_chain_work: String,
    /// Hash of the last record, reversed hex
    pub last_hash: String,
    /// Cumulative chain work of the record before the first one
    pub prev_chain_work: String,
    /// Hash of the record before the first one
    pub prev_hash: String,
    /// Optional origin URL (may be blank)
    pub source_url: String,
}

impl Manifest {
    /// Creates an empty manifest skeleton for a network.
    pub fn skeleton(network: &str) -> Self {
        Self {
            root_folder: String::new(),
            json_filename: format!("{network}NetBlockHeaders.json"),
            headers_per_file: HEADERS_PER_FILE,
            files: Vec::new(),
        }
    }

    /// Reads a manifest from disk. A missing file yields `None`.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let manifest = serde_json::from_slice(&data)?;
        Ok(Some(manifest))
    }

    /// Writes the manifest atomically (temp file + rename).
    pub fn write(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), files = self.files.len(), "wrote manifest");
        Ok(())
    }
}

impl FileEntry {
    /// Creates a placeholder entry for a file that has no recorded tip yet.
    pub fn placeholder(network: &str, file_name: String, first_height: u32) -> Self {
        Self {
            chain: network.to_string(),
            count: 0,
            file_hash: String::new(),
            file_name,
            first_height,
            last_chain_work: ZERO_HEX.to_string(),
            last_hash: ZERO_HEX.to_string(),
            prev_chain_work: ZERO_HEX.to_string(),
            prev_hash: ZERO_HEX.to_string(),
            source_url: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_field_names() {
        let manifest = Manifest {
            root_folder: String::new(),
            json_filename: "mainNetBlockHeaders.json".to_string(),
            headers_per_file: HEADERS_PER_FILE,
            files: vec![FileEntry::placeholder(
                "main",
                "mainNet_0.headers".to_string(),
                0,
            )],
        };

        let json = serde_json::to_string(&manifest).unwrap();
        for key in [
            "rootFolder",
            "jsonFilename",
            "headersPerFile",
            "fileHash",
            "fileName",
            "firstHeight",
            "lastChainWork",
            "lastHash",
            "prevChainWork",
            "prevHash",
            "sourceUrl",
        ] {
            assert!(json.contains(key), "missing key {key}");
        }

        let parsed: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.files[0].file_name, "mainNet_0.headers");
        assert_eq!(parsed.headers_per_file, 100_000);
    }
}
