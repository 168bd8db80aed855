//! Persisted node identity.
//!
//! The keypair handed to the gossip transport lives in a hex-encoded file
//! under the storage directory. It is generated once with restrictive
//! permissions and reused across restarts so the node keeps a stable peer
//! identity.

use crate::{Error, Result};
use libp2p::identity::Keypair;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the persisted keypair, relative to the storage directory.
pub const KEY_FILE: &str = "p2p_key.hex";

/// Path of the key file inside a storage directory.
pub fn key_path(storage: &Path) -> PathBuf {
    storage.join(KEY_FILE)
}

/// Loads the node keypair from the storage directory, generating and
/// persisting a fresh ed25519 key on first use.
///
/// The storage directory is created `0755`, the key file `0600`.
pub fn load_or_generate_keypair(storage: &Path) -> Result<Keypair> {
    let path = key_path(storage);

    if path.exists() {
        let key_hex = fs::read_to_string(&path)?;
        let key_bytes = hex::decode(key_hex.trim())
            .map_err(|e| Error::Identity(format!("key file {} is not hex: {e}", path.display())))?;
        let keypair = Keypair::from_protobuf_encoding(&key_bytes)
            .map_err(|e| Error::Identity(format!("invalid key file {}: {e}", path.display())))?;
        info!(peer_id = %keypair.public().to_peer_id(), path = %path.display(), "loaded node identity");
        return Ok(keypair);
    }

    let keypair = Keypair::generate_ed25519();
    let key_bytes = keypair
        .to_protobuf_encoding()
        .map_err(|e| Error::Identity(format!("failed to encode keypair: {e}")))?;

    fs::create_dir_all(storage)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(storage, fs::Permissions::from_mode(0o755))?;
    }

    fs::write(&path, hex::encode(key_bytes))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
    }

    info!(peer_id = %keypair.public().to_peer_id(), path = %path.display(), "generated node identity");
    Ok(keypair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn generates_then_reloads_same_identity() {
        let dir = TempDir::new().unwrap();

        let first = load_or_generate_keypair(dir.path()).unwrap();
        assert!(key_path(dir.path()).exists());

        let second = load_or_generate_keypair(dir.path()).unwrap();
        assert_eq!(
            first.public().to_peer_id(),
            second.public().to_peer_id()
        );
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        load_or_generate_keypair(dir.path()).unwrap();

        let mode = fs::metadata(key_path(dir.path()))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn corrupt_key_file_errors() {
        let dir = TempDir::new().unwrap();
        fs::write(key_path(dir.path()), "zz-not-hex").unwrap();
        assert!(load_or_generate_keypair(dir.path()).is_err());
    }
}
