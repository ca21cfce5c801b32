// src/extract.rs

//! Archive extraction into the install root
//!
//! Walks a gzip-compressed tar archive, writes each file entry under
//! the install root while computing its digest in the same pass, and
//! returns the file records that become the addon's new manifest.
//!
//! Entry paths are sanitized before anything touches the disk: an entry
//! that would resolve outside the install root aborts the extraction
//! with `Error::PathTraversal` and writes nothing for that entry.

use crate::error::{Error, Result};
use crate::manifest::FileRecord;
use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use tracing::{debug, warn};

/// Normalize an archive entry path to a safe path relative to the
/// install root.
///
/// Rejects absolute paths and any `..` that would climb out of the
/// root. `.` components are dropped. Returns the normalized relative
/// path and its manifest form (`/`-separated regardless of platform).
fn sanitize_entry_path(raw: &Path) -> Result<(PathBuf, String)> {
    let mut parts: Vec<String> = Vec::new();

    for component in raw.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(Error::PathTraversal(raw.display().to_string()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::PathTraversal(raw.display().to_string()));
            }
        }
    }

    if parts.is_empty() {
        return Err(Error::PathTraversal(raw.display().to_string()));
    }

    let mut rel = PathBuf::new();
    for part in &parts {
        rel.push(part);
    }
    Ok((rel, parts.join("/")))
}

/// Extract a gzip-compressed tar archive under `install_root`.
///
/// Directory entries create directories and produce no record. File
/// entries are streamed to disk with a bounded buffer while their
/// SHA-256 digest is computed. Entry kinds that are neither file nor
/// directory (links, devices) are skipped.
///
/// On failure partway through, files written so far remain on disk; the
/// caller must not persist a manifest for the attempt.
pub fn extract_archive(data: &[u8], install_root: &Path) -> Result<Vec<FileRecord>> {
    let mut archive = Archive::new(GzDecoder::new(data));
    let mut records: Vec<FileRecord> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    let entries = archive
        .entries()
        .map_err(|e| Error::Archive(format!("failed to read archive: {}", e)))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| Error::Archive(format!("failed to read archive entry: {}", e)))?;

        let raw_path = entry
            .path()
            .map_err(|e| Error::Archive(format!("failed to read entry path: {}", e)))?
            .into_owned();

        let (rel, manifest_path) = sanitize_entry_path(&raw_path)?;
        let dest = install_root.join(&rel);

        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            fs::create_dir_all(&dest)?;
            continue;
        }
        if !entry_type.is_file() {
            warn!(
                "Skipping unsupported archive entry {} ({:?})",
                raw_path.display(),
                entry_type
            );
            continue;
        }

        if !seen.insert(manifest_path.clone()) {
            return Err(Error::DuplicateEntry(manifest_path));
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = File::create(&dest)?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = entry.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            out.write_all(&buf[..n])?;
        }

        records.push(FileRecord::new(
            manifest_path,
            format!("{:x}", hasher.finalize()),
        ));
    }

    debug!(
        "Extracted {} files under {}",
        records.len(),
        install_root.display()
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tar::{EntryType, Header};

    enum TestEntry<'a> {
        Dir(&'a str),
        File(&'a str, &'a [u8]),
        /// File whose header name bypasses `set_path` validation, for
        /// crafting hostile archives.
        RawNamedFile(&'a [u8], &'a [u8]),
    }

    fn build_archive(entries: &[TestEntry]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for entry in entries {
            match entry {
                TestEntry::Dir(path) => {
                    let mut header = Header::new_gnu();
                    header.set_entry_type(EntryType::Directory);
                    header.set_size(0);
                    header.set_mode(0o755);
                    header.set_cksum();
                    builder
                        .append_data(&mut header, format!("{}/", path), std::io::empty())
                        .unwrap();
                }
                TestEntry::File(path, content) => {
                    let mut header = Header::new_gnu();
                    header.set_size(content.len() as u64);
                    header.set_mode(0o644);
                    header.set_cksum();
                    builder.append_data(&mut header, path, *content).unwrap();
                }
                TestEntry::RawNamedFile(name, content) => {
                    let mut header = Header::new_gnu();
                    header.as_old_mut().name[..name.len()].copy_from_slice(name);
                    header.set_size(content.len() as u64);
                    header.set_mode(0o644);
                    header.set_cksum();
                    builder.append(&header, *content).unwrap();
                }
            }
        }

        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_extract_writes_files_and_records_digests() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();

        let archive = build_archive(&[
            TestEntry::Dir("Foo"),
            TestEntry::File("Foo/Foo.toc", b"## Title: Foo"),
            TestEntry::File("Foo/core.lua", b"print('hi')"),
        ]);

        let records = extract_archive(&archive, root).unwrap();

        // Enumeration order, directories excluded
        let paths: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["Foo/Foo.toc", "Foo/core.lua"]);

        for record in &records {
            let on_disk = hash::digest_file(&root.join(&record.path)).unwrap();
            assert_eq!(on_disk, record.sha256);
        }
        assert_eq!(
            fs::read(root.join("Foo/core.lua")).unwrap(),
            b"print('hi')"
        );
    }

    #[test]
    fn test_extract_creates_missing_parent_directories() {
        let temp_dir = tempfile::tempdir().unwrap();

        // No directory entry precedes the file
        let archive = build_archive(&[TestEntry::File("Foo/sub/deep.lua", b"x")]);

        let records = extract_archive(&archive, temp_dir.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert!(temp_dir.path().join("Foo/sub/deep.lua").is_file());
    }

    #[test]
    fn test_parent_traversal_is_rejected_without_writing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();

        let archive = build_archive(&[TestEntry::RawNamedFile(b"../evil.lua", b"boom")]);

        let result = extract_archive(&archive, root);
        assert!(matches!(result, Err(Error::PathTraversal(_))));
        assert!(!root.parent().unwrap().join("evil.lua").exists());
        assert_eq!(fs::read_dir(root).unwrap().count(), 0);
    }

    #[test]
    fn test_nested_traversal_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();

        // Normalizes to a path one level above the root
        let archive =
            build_archive(&[TestEntry::RawNamedFile(b"Foo/../../evil.lua", b"boom")]);

        let result = extract_archive(&archive, temp_dir.path());
        assert!(matches!(result, Err(Error::PathTraversal(_))));
    }

    #[test]
    fn test_absolute_entry_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();

        let archive = build_archive(&[TestEntry::RawNamedFile(b"/etc/evil.lua", b"boom")]);

        let result = extract_archive(&archive, temp_dir.path());
        assert!(matches!(result, Err(Error::PathTraversal(_))));
    }

    #[test]
    fn test_interior_dotdot_that_stays_inside_is_allowed() {
        let (rel, manifest_path) = sanitize_entry_path(Path::new("Foo/sub/../core.lua")).unwrap();
        assert_eq!(rel, PathBuf::from("Foo").join("core.lua"));
        assert_eq!(manifest_path, "Foo/core.lua");
    }

    #[test]
    fn test_duplicate_entry_paths_are_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();

        let archive = build_archive(&[
            TestEntry::File("Foo/core.lua", b"one"),
            TestEntry::File("Foo/core.lua", b"two"),
        ]);

        let result = extract_archive(&archive, temp_dir.path());
        assert!(matches!(result, Err(Error::DuplicateEntry(p)) if p == "Foo/core.lua"));
    }
}
