//! SHA-256 checksum utilities
//!
//! Canonical checksum format (`sha256:<hex>`) used by the mirror to decide
//! whether a destination file already matches its source.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

const PREFIX: &str = "sha256:";

/// Compute the SHA-256 checksum of a file, streaming its contents.
pub fn compute_file_checksum(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{}{:x}", PREFIX, hasher.finalize()))
}

/// True when both files exist with identical size and content.
pub fn files_identical(a: &Path, b: &Path) -> io::Result<bool> {
    let (meta_a, meta_b) = match (std::fs::metadata(a), std::fs::metadata(b)) {
        (Ok(ma), Ok(mb)) => (ma, mb),
        (Err(e), _) => return Err(e),
        (_, Err(e)) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        (_, Err(e)) => return Err(e),
    };
    if meta_a.len() != meta_b.len() {
        return Ok(false);
    }
    Ok(compute_file_checksum(a)? == compute_file_checksum(b)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_checksum_known_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.txt");
        std::fs::write(&path, "hello world").unwrap();

        assert_eq!(
            compute_file_checksum(&path).unwrap(),
            "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn identical_files_detected() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, "same").unwrap();
        std::fs::write(&b, "same").unwrap();
        assert!(files_identical(&a, &b).unwrap());

        std::fs::write(&b, "diff").unwrap();
        assert!(!files_identical(&a, &b).unwrap());

        assert!(!files_identical(&a, &dir.path().join("missing")).unwrap());
    }
}
