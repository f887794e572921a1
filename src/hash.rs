//! BLAKE3 content hashing for duplicate detection
//!
//! Always hashes the whole file: two files are only duplicates when their
//! bytes are identical.

use crate::error::{Error, Result};
use crate::media::ContentHash;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::trace;

/// Read buffer size for hashing (256KB)
const BUFFER_SIZE: usize = 256 * 1024;

/// Compute the content hash of a file
pub fn compute_file_hash(path: &Path) -> Result<ContentHash> {
    let file = File::open(path).map_err(|e| Error::io_at(path, e))?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);

    let mut hasher = blake3::Hasher::new();
    hasher
        .update_reader(&mut reader)
        .map_err(|e| Error::HashComputation {
            path: path.to_path_buf(),
            message: format!("Failed to read file: {}", e),
        })?;

    let hash = ContentHash(*hasher.finalize().as_bytes());
    trace!(?path, %hash, "Computed file hash");
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_same_content_same_hash() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"test content").unwrap();
        file.flush().unwrap();

        let mut file2 = NamedTempFile::new().unwrap();
        file2.write_all(b"test content").unwrap();
        file2.flush().unwrap();

        let hash = compute_file_hash(file.path()).unwrap();
        let hash2 = compute_file_hash(file2.path()).unwrap();
        assert_eq!(hash, hash2);
        assert_eq!(hash.0, *blake3::hash(b"test content").as_bytes());
    }

    #[test]
    fn test_different_content_different_hash() {
        let mut file1 = NamedTempFile::new().unwrap();
        file1.write_all(b"content 1").unwrap();
        file1.flush().unwrap();

        let mut file2 = NamedTempFile::new().unwrap();
        file2.write_all(b"content 2").unwrap();
        file2.flush().unwrap();

        let hash1 = compute_file_hash(file1.path()).unwrap();
        let hash2 = compute_file_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = compute_file_hash(&dir.path().join("gone.jpg")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
    }
}
