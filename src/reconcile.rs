// src/reconcile.rs

//! Reconciliation between installed state and the latest release
//!
//! For each addon the reconciler decides, fresh on every invocation,
//! which transition applies: install, no-op, reinstall-if-broken,
//! update, or remove. The persisted manifest is the only state; there
//! is no state machine carried between runs.
//!
//! Ordering within one addon is strictly sequential: resolve → download
//! → remove old files → extract → save manifest. The archive is
//! downloaded before the old files are touched so a network failure
//! cannot destroy a working install. Old-file removal is best-effort;
//! per-file failures are logged and extraction proceeds. There is no
//! transactional rollback: a crash between removal and extraction can
//! leave stray files with no manifest, which a later install pass
//! overwrites.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::extract;
use crate::manifest::{Manifest, ManifestStore};
use crate::remote::PackageSource;
use crate::verify::{self, Health};
use rayon::prelude::*;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Result of reconciling one addon against the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    UpToDate { version: String },
    Installed { version: String },
    Reinstalled { version: String },
    Updated { from: String, to: String },
}

/// Result of a remove request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotInstalled,
}

pub struct Reconciler<S> {
    source: S,
    store: ManifestStore,
    install_root: PathBuf,
}

impl<S: PackageSource> Reconciler<S> {
    pub fn new(source: S, store: ManifestStore, install_root: impl Into<PathBuf>) -> Self {
        Self {
            source,
            store,
            install_root: install_root.into(),
        }
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    /// Bring `addon` to the latest release the source reports.
    ///
    /// Covers install, update, and reinstall-if-broken; which one
    /// happened is reflected in the outcome.
    pub fn sync(&self, addon: &str) -> Result<SyncOutcome> {
        let current = self.load_tolerating_corruption(addon)?;
        let release = self.source.resolve_latest(addon)?;

        let (previous, outcome) = match current {
            Some(manifest) if manifest.version() == release.version => {
                match verify::verify(&manifest, &self.install_root)? {
                    Health::Intact => {
                        info!("{} is already up-to-date", addon);
                        return Ok(SyncOutcome::UpToDate {
                            version: release.version,
                        });
                    }
                    Health::Broken(reason) => {
                        info!("{} seems to be broken ({}), reinstalling", addon, reason);
                        let outcome = SyncOutcome::Reinstalled {
                            version: release.version.clone(),
                        };
                        (Some(manifest), outcome)
                    }
                }
            }
            Some(manifest) => {
                info!(
                    "Updating {} ({} -> {})",
                    addon,
                    manifest.version(),
                    release.version
                );
                let outcome = SyncOutcome::Updated {
                    from: manifest.version().to_string(),
                    to: release.version.clone(),
                };
                (Some(manifest), outcome)
            }
            None => {
                info!("Installing {} ({})", addon, release.version);
                let outcome = SyncOutcome::Installed {
                    version: release.version.clone(),
                };
                (None, outcome)
            }
        };

        let archive = self.source.download(&release)?;

        // Old files must be gone before extraction so a restructured
        // archive layout cannot leave orphans next to the new files.
        if let Some(manifest) = &previous {
            self.remove_files(manifest);
        }

        let files = extract::extract_archive(&archive, &self.install_root)?;
        let manifest = Manifest::new(release.version, files)?;
        self.store.save(addon, &manifest)?;

        info!("Finished installing {}", addon);
        Ok(outcome)
    }

    /// Delete every file the addon's manifest lists, prune directories
    /// the removal emptied, and drop the manifest.
    pub fn remove(&self, addon: &str) -> Result<RemoveOutcome> {
        let outcome = match self.store.load(addon) {
            Ok(Some(manifest)) => {
                self.remove_files(&manifest);
                if let Err(e) = prune_empty_dirs(&self.install_root) {
                    warn!("Failed to prune empty directories: {}", e);
                }
                RemoveOutcome::Removed
            }
            Ok(None) => RemoveOutcome::NotInstalled,
            Err(Error::ManifestCorrupt { .. }) => {
                // The file list is unknown, so files may be left
                // behind, but the record still goes away.
                warn!(
                    "Manifest for {} is unreadable; its files cannot be removed",
                    addon
                );
                RemoveOutcome::Removed
            }
            Err(e) => return Err(e),
        };

        self.store.delete(addon)?;
        Ok(outcome)
    }

    /// Load the addon's manifest, downgrading a corrupt one to "not
    /// installed" (which forces a full reinstall).
    fn load_tolerating_corruption(&self, addon: &str) -> Result<Option<Manifest>> {
        match self.store.load(addon) {
            Ok(manifest) => Ok(manifest),
            Err(e @ Error::ManifestCorrupt { .. }) => {
                warn!("{}; treating {} as not installed", e, addon);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Best-effort removal of every listed file. Missing files are
    /// expected (the user may have deleted some); other failures are
    /// logged per file and do not stop the sweep.
    fn remove_files(&self, manifest: &Manifest) {
        for record in manifest.files() {
            let path = self.install_root.join(&record.path);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }
}

/// Remove directories under `root` that are (or become) empty,
/// bottom-up. `root` itself is never removed. Idempotent.
pub fn prune_empty_dirs(root: &Path) -> io::Result<()> {
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            prune_tree(&entry.path())?;
        }
    }
    Ok(())
}

fn prune_tree(dir: &Path) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            prune_tree(&entry.path())?;
        }
    }
    // Fails while the directory still has contents, which is the filter.
    let _ = fs::remove_dir(dir);
    Ok(())
}

/// What a batch run should do to each addon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Install,
    Update,
    Remove,
}

/// Per-addon result of a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    UpToDate { version: String },
    Installed { version: String },
    Reinstalled { version: String },
    Updated { from: String, to: String },
    Removed,
    Failed { reason: String },
}

impl From<SyncOutcome> for Status {
    fn from(outcome: SyncOutcome) -> Self {
        match outcome {
            SyncOutcome::UpToDate { version } => Status::UpToDate { version },
            SyncOutcome::Installed { version } => Status::Installed { version },
            SyncOutcome::Reinstalled { version } => Status::Reinstalled { version },
            SyncOutcome::Updated { from, to } => Status::Updated { from, to },
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::UpToDate { version } => write!(f, "already up-to-date ({})", version),
            Status::Installed { version } => write!(f, "installed {}", version),
            Status::Reinstalled { version } => write!(f, "reinstalled {}", version),
            Status::Updated { from, to } => write!(f, "updated {} -> {}", from, to),
            Status::Removed => write!(f, "removed"),
            Status::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddonReport {
    pub addon: String,
    pub status: Status,
}

impl AddonReport {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, Status::Failed { .. })
    }
}

/// Run `operation` against every named addon and report per-addon
/// results. One addon's failure never aborts the rest.
///
/// Addons are independent (disjoint manifests, disjoint file subtrees),
/// so reconciliations run in parallel on the rayon pool. The tracked
/// set in `config` is only mutated after the pool joins, by this single
/// writer, so concurrent completions cannot lose updates.
pub fn run_batch<S>(
    reconciler: &Reconciler<S>,
    operation: Operation,
    addons: &[String],
    config: &mut Config,
) -> Vec<AddonReport>
where
    S: PackageSource + Sync,
{
    let reports: Vec<AddonReport> = addons
        .par_iter()
        .map(|addon| {
            let status = match operation {
                Operation::Install | Operation::Update => match reconciler.sync(addon) {
                    Ok(outcome) => Status::from(outcome),
                    Err(e) => Status::Failed {
                        reason: e.to_string(),
                    },
                },
                Operation::Remove => match reconciler.remove(addon) {
                    Ok(RemoveOutcome::Removed) => Status::Removed,
                    Ok(RemoveOutcome::NotInstalled) => Status::Failed {
                        reason: "is not installed".to_string(),
                    },
                    Err(e) => Status::Failed {
                        reason: e.to_string(),
                    },
                },
            };
            AddonReport {
                addon: addon.clone(),
                status,
            }
        })
        .collect();

    for report in &reports {
        match operation {
            // Tracking is independent of install success: a failed
            // install stays tracked and is retried by a later update.
            Operation::Install | Operation::Update => {
                config.track(&report.addon);
            }
            Operation::Remove => {
                config.untrack(&report.addon);
            }
        }
    }

    reports
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_removes_nested_empty_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("Foo/sub/deeper")).unwrap();
        fs::create_dir_all(root.join("Bar")).unwrap();
        fs::write(root.join("Bar/keep.lua"), b"x").unwrap();

        prune_empty_dirs(root).unwrap();

        assert!(!root.join("Foo").exists());
        assert!(root.join("Bar/keep.lua").is_file());
        assert!(root.exists());
    }

    #[test]
    fn test_prune_removes_directories_emptied_by_pruning() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();

        // Foo only contains empty directories, so the bottom-up pass
        // must empty and then remove Foo itself.
        fs::create_dir_all(root.join("Foo/a")).unwrap();
        fs::create_dir_all(root.join("Foo/b/c")).unwrap();

        prune_empty_dirs(root).unwrap();

        assert!(!root.join("Foo").exists());
    }

    #[test]
    fn test_prune_is_idempotent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("Foo/sub")).unwrap();
        prune_empty_dirs(root).unwrap();
        prune_empty_dirs(root).unwrap();

        assert!(!root.join("Foo").exists());
        assert!(root.exists());
    }

    #[test]
    fn test_status_display() {
        let status = Status::Updated {
            from: "Foo-1.0.zip".to_string(),
            to: "Foo-1.1.zip".to_string(),
        };
        assert_eq!(status.to_string(), "updated Foo-1.0.zip -> Foo-1.1.zip");

        let report = AddonReport {
            addon: "foo".to_string(),
            status: Status::Failed {
                reason: "something".to_string(),
            },
        };
        assert!(report.is_failure());
        assert_eq!(report.status.to_string(), "failed: something");
    }
}
