// src/manifest/store.rs

//! Persisted manifest storage
//!
//! One directory per addon under the store root, holding the
//! gzip-compressed JSON entry list (`files.json.gz`) and the installed
//! release tag as plain text (`version`). Both files are replaced
//! atomically via write-to-temp-then-rename, so a crash mid-save leaves
//! either the old manifest or the new one, never a truncated mix.

use crate::error::{Error, Result};
use crate::manifest::{FileRecord, Manifest};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

const FILES_NAME: &str = "files.json.gz";
const VERSION_NAME: &str = "version";

/// Filesystem-backed store of per-addon manifests.
pub struct ManifestStore {
    root: PathBuf,
}

impl ManifestStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn addon_dir(&self, addon: &str) -> PathBuf {
        self.root.join(addon)
    }

    /// Load the persisted manifest for `addon`.
    ///
    /// Returns `Ok(None)` when no manifest exists (the addon is not
    /// installed). A manifest that exists but cannot be decoded is a
    /// `ManifestCorrupt` error; callers decide whether that forces a
    /// reinstall.
    pub fn load(&self, addon: &str) -> Result<Option<Manifest>> {
        let dir = self.addon_dir(addon);
        let files_path = dir.join(FILES_NAME);

        if !files_path.exists() {
            return Ok(None);
        }

        let corrupt = |reason: String| Error::ManifestCorrupt {
            addon: addon.to_string(),
            reason,
        };

        let file = File::open(&files_path).map_err(|e| corrupt(e.to_string()))?;
        let files: Vec<FileRecord> = serde_json::from_reader(GzDecoder::new(file))
            .map_err(|e| corrupt(format!("undecodable entry list: {}", e)))?;

        let version = fs::read_to_string(dir.join(VERSION_NAME))
            .map_err(|e| corrupt(format!("unreadable version tag: {}", e)))?;

        let manifest = Manifest::new(version, files)
            .map_err(|e| corrupt(format!("invalid entry list: {}", e)))?;

        debug!(
            "Loaded manifest for {}: {} files at version {}",
            addon,
            manifest.len(),
            manifest.version()
        );
        Ok(Some(manifest))
    }

    /// Persist `manifest` for `addon`, replacing any previous manifest.
    ///
    /// The entry list is renamed into place before the version tag. A
    /// crash between the two renames leaves entries that disagree with
    /// the tag, which the next reconciliation resolves by reinstalling
    /// rather than by trusting stale state.
    pub fn save(&self, addon: &str, manifest: &Manifest) -> Result<()> {
        let dir = self.addon_dir(addon);
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        let mut encoder = GzEncoder::new(&mut tmp, Compression::default());
        serde_json::to_writer(&mut encoder, manifest.files()).map_err(io::Error::from)?;
        encoder.finish()?;
        tmp.persist(dir.join(FILES_NAME)).map_err(|e| e.error)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(manifest.version().as_bytes())?;
        tmp.persist(dir.join(VERSION_NAME)).map_err(|e| e.error)?;

        debug!(
            "Saved manifest for {}: {} files at version {}",
            addon,
            manifest.len(),
            manifest.version()
        );
        Ok(())
    }

    /// Delete the persisted manifest for `addon`.
    ///
    /// Deleting an addon that has no manifest is not an error.
    pub fn delete(&self, addon: &str) -> Result<()> {
        match fs::remove_dir_all(self.addon_dir(addon)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
