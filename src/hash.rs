// src/hash.rs

//! Streaming SHA-256 digests for file integrity
//!
//! Digests cover file content only; paths, timestamps, and permission
//! bits do not contribute.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Compute the lowercase hex SHA-256 digest of everything `reader` yields.
///
/// Input is consumed incrementally, so arbitrarily large files are fine.
pub fn digest_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Compute the digest of a file on disk.
pub fn digest_file(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    digest_reader(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_of_known_input() {
        // sha256("hello world")
        let digest = digest_reader("hello world".as_bytes()).unwrap();
        assert_eq!(
            digest,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_digest_of_empty_input() {
        let digest = digest_reader(io::empty()).unwrap();
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_digest_is_content_only() {
        let temp_dir = tempfile::tempdir().unwrap();
        let a = temp_dir.path().join("a.txt");
        let b = temp_dir.path().join("deeply").join("nested").join("b.txt");
        std::fs::create_dir_all(b.parent().unwrap()).unwrap();
        std::fs::write(&a, b"same content").unwrap();
        std::fs::write(&b, b"same content").unwrap();

        assert_eq!(digest_file(&a).unwrap(), digest_file(&b).unwrap());
    }

    #[test]
    fn test_digest_missing_file_is_io_error() {
        let result = digest_file(Path::new("/nonexistent/path/file.bin"));
        assert!(result.is_err());
    }
}
