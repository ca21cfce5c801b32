// src/verify.rs

//! Read-only integrity checking of installed addons
//!
//! Distinguishes "up-to-date and healthy" from "up-to-date tag but
//! corrupted on disk"; the latter forces a reinstall instead of a
//! silent skip.

use crate::error::Result;
use crate::hash;
use crate::manifest::Manifest;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Outcome of checking a manifest against the install root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Health {
    Intact,
    Broken(BrokenReason),
}

/// Why an install failed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokenReason {
    Missing(PathBuf),
    DigestMismatch(PathBuf),
}

impl std::fmt::Display for BrokenReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrokenReason::Missing(path) => write!(f, "missing file {}", path.display()),
            BrokenReason::DigestMismatch(path) => {
                write!(f, "digest mismatch for {}", path.display())
            }
        }
    }
}

/// Check that every file the manifest lists exists under `install_root`
/// with its recorded digest. Short-circuits on the first problem.
///
/// Has no side effects. A listed file that exists but cannot be read
/// propagates as an I/O error rather than a `Broken` verdict.
pub fn verify(manifest: &Manifest, install_root: &Path) -> Result<Health> {
    for record in manifest.files() {
        let path = install_root.join(&record.path);

        let actual = match hash::digest_file(&path) {
            Ok(digest) => digest,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Verification failed: {} is missing", path.display());
                return Ok(Health::Broken(BrokenReason::Missing(path)));
            }
            Err(e) => return Err(e.into()),
        };

        if actual != record.sha256 {
            debug!("Verification failed: {} digest mismatch", path.display());
            return Ok(Health::Broken(BrokenReason::DigestMismatch(path)));
        }
    }

    Ok(Health::Intact)
}
