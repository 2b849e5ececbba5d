use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::AppError;

const READ_BUF_SIZE: usize = 64 * 1024;

/// SHA-256 of the file's full byte content as 64 lowercase hex chars.
/// Streams the file, so large inputs never sit in memory whole. Content is
/// the only input: the same bytes under a different name or path hash
/// identically.
pub fn hash_file(path: &Path) -> Result<String, AppError> {
    let mut file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::NotFound(format!("cannot hash missing file: {}", path.display()))
        } else {
            AppError::Io(e)
        }
    })?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_BUF_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_hash_is_64_hex() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, b"hello").unwrap();

        let digest = hash_file(&file).unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(digest, hash_bytes(b"hello"));
    }

    #[test]
    fn test_identical_content_identical_hash() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("first.bin");
        let b = dir.path().join("nested").join("second.dat");
        fs::create_dir_all(b.parent().unwrap()).unwrap();
        fs::write(&a, b"same bytes").unwrap();
        fs::write(&b, b"same bytes").unwrap();

        assert_eq!(hash_file(&a).unwrap(), hash_file(&b).unwrap());
    }

    #[test]
    fn test_different_content_different_hash() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::write(&a, b"one").unwrap();
        fs::write(&b, b"two").unwrap();

        assert_ne!(hash_file(&a).unwrap(), hash_file(&b).unwrap());
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = hash_file(&dir.path().join("ghost")).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_streams_larger_than_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.bin");
        let content = vec![0xabu8; READ_BUF_SIZE * 3 + 17];
        fs::write(&file, &content).unwrap();

        assert_eq!(hash_file(&file).unwrap(), hash_bytes(&content));
    }
}
