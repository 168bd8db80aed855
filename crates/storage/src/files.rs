//! Binary header files and the seek-based update discipline.

use crate::manifest::{FileEntry, Manifest, HEADERS_PER_FILE};
use crate::Result;
use alloy_primitives::U256;
use headchain_types::{chainwork, AnnotatedHeader, RawHeader, HEADER_SIZE};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Height span covered by each binary header file.
pub const FILE_SPAN: u32 = HEADERS_PER_FILE;

/// Persists the best chain as fixed-record binary files plus a manifest.
///
/// A header at height `h` sits at byte offset `(h % FILE_SPAN) * 80` inside
/// file `h / FILE_SPAN`. Files are overwritten in place on new tips and never
/// truncated on reorg; the manifest `count` fields bound the valid records.
#[derive(Debug, Clone)]
pub struct HeaderFileStore {
    root: PathBuf,
    network: String,
}

impl HeaderFileStore {
    /// Creates a file store rooted at the given storage directory.
    pub fn new(root: impl Into<PathBuf>, network: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            network: network.into(),
        }
    }

    /// The storage directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the manifest document.
    pub fn manifest_path(&self) -> PathBuf {
        self.root
            .join(format!("{}NetBlockHeaders.json", self.network))
    }

    fn file_name(&self, index: u32) -> String {
        format!("{}Net_{}.headers", self.network, index)
    }

    fn file_path(&self, index: u32) -> PathBuf {
        self.root.join(self.file_name(index))
    }

    /// Restores the best chain from disk.
    ///
    /// Returns the flat best-chain sequence, oldest first, with chain work
    /// recomputed incrementally while reading. A missing manifest is a
    /// silent genesis-only start and yields an empty sequence. Persisted
    /// data is trusted: no structural validation beyond decoding.
    pub fn load(&self) -> Result<Vec<AnnotatedHeader>> {
        let manifest = match Manifest::read(&self.manifest_path())? {
            Some(manifest) => manifest,
            None => {
                debug!(path = %self.manifest_path().display(), "no manifest, starting empty");
                return Ok(Vec::new());
            }
        };

        let mut chain = Vec::new();
        let mut running_work: Option<U256> = None;

        for entry in &manifest.files {
            let path = self.root.join(&entry.file_name);
            let data = fs::read(&path)?;
            let available = data.len() / HEADER_SIZE;
            let count = entry.count as usize;

            // The manifest count is authoritative; bytes past it are stale.
            let take = if available < count {
                warn!(
                    file = %entry.file_name,
                    count,
                    available,
                    "header file shorter than manifest count"
                );
                available
            } else {
                count
            };

            // Seed from the manifest for the first entry, then carry the
            // running total across files.
            let mut work = match running_work {
                Some(work) => work,
                None => chainwork::from_hex(&entry.prev_chain_work)?,
            };

            for i in 0..take {
                let height = entry.first_height + i as u32;
                let header = RawHeader::from_bytes(&data[i * HEADER_SIZE..(i + 1) * HEADER_SIZE])?;
                work = if height == 0 {
                    U256::ZERO
                } else {
                    chainwork::add_work(work, header.bits)?
                };
                chain.push(AnnotatedHeader::new(header, height, work));
            }

            running_work = Some(work);
        }

        info!(
            network = %self.network,
            headers = chain.len(),
            "restored header chain from disk"
        );
        Ok(chain)
    }

    /// Writes a branch of records into their header files and refreshes the
    /// manifest.
    ///
    /// `records` must be ordered oldest to newest; `prev_of_tip` is the
    /// best-chain header immediately below the new tip, used for the
    /// manifest's `prevChainWork`/`prevHash` fields.
    pub fn persist_branch(
        &self,
        records: &[AnnotatedHeader],
        prev_of_tip: Option<&AnnotatedHeader>,
    ) -> Result<()> {
        let Some(tip) = records.last() else {
            return Ok(());
        };

        self.ensure_root()?;

        // Group by file index so each file is opened once.
        let mut by_file: BTreeMap<u32, Vec<&AnnotatedHeader>> = BTreeMap::new();
        for record in records {
            by_file
                .entry(record.height / FILE_SPAN)
                .or_default()
                .push(record);
        }

        for (index, group) in by_file {
            let path = self.file_path(index);
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(&path)?;

            for record in group {
                let offset = (record.height % FILE_SPAN) as u64 * HEADER_SIZE as u64;
                file.seek(SeekFrom::Start(offset))?;
                file.write_all(&record.header.to_bytes())?;
            }
        }

        self.refresh_manifest(tip, prev_of_tip)
    }

    /// Brings the manifest in line with the given tip.
    ///
    /// Ensures an entry exists for every file index up to the tip's file,
    /// marks intermediate files as full, and rewrites the tip entry's count
    /// and work/hash fields. The write is atomic (temp + rename).
    pub fn refresh_manifest(
        &self,
        tip: &AnnotatedHeader,
        prev_of_tip: Option<&AnnotatedHeader>,
    ) -> Result<()> {
        self.ensure_root()?;

        let mut manifest = Manifest::read(&self.manifest_path())?
            .unwrap_or_else(|| Manifest::skeleton(&self.network));

        let tip_file = tip.height / FILE_SPAN;
        while manifest.files.len() <= tip_file as usize {
            let index = manifest.files.len() as u32;
            manifest.files.push(FileEntry::placeholder(
                &self.network,
                self.file_name(index),
                index * FILE_SPAN,
            ));
        }

        // Every file below the tip's is complete; entries above it describe
        // heights displaced by a reorg and must not survive the next load.
        manifest.files.truncate(tip_file as usize + 1);
        for entry in &mut manifest.files[..tip_file as usize] {
            entry.count = FILE_SPAN;
        }

        let entry = &mut manifest.files[tip_file as usize];
        entry.count = (tip.height % FILE_SPAN) + 1;
        entry.last_chain_work = chainwork::to_hex(tip.chain_work);
        entry.last_hash = tip.hash().to_hex();
        if let Some(prev) = prev_of_tip {
            entry.prev_chain_work = chainwork::to_hex(prev.chain_work);
            entry.prev_hash = prev.hash().to_hex();
        }

        manifest.write(&self.manifest_path())
    }

    fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.root, fs::Permissions::from_mode(0o755))?;
        }
        Ok(())
    }
}
