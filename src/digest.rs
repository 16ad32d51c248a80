//! Content comparison for the duplicate check.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Streamed SHA-256 of a file.
pub fn sha256_file(path: &Path) -> io::Result<[u8; 32]> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hasher.finalize().into())
}

/// Size first, then digest. Sizes are passed in because callers already hold
/// fresh metadata for both sides.
pub fn same_content(a: &Path, a_len: u64, b: &Path, b_len: u64) -> io::Result<bool> {
    if a_len != b_len {
        return Ok(false);
    }
    Ok(sha256_file(a)? == sha256_file(b)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn equal_and_different_content() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        let b = td.path().join("b");
        let c = td.path().join("c");
        fs::write(&a, b"same bytes").unwrap();
        fs::write(&b, b"same bytes").unwrap();
        fs::write(&c, b"SAME bytes").unwrap();
        assert!(same_content(&a, 10, &b, 10).unwrap());
        assert!(!same_content(&a, 10, &c, 10).unwrap());
    }

    #[test]
    fn size_mismatch_skips_hashing() {
        // Neither path exists; hashing would fail, so Ok(false) proves it was skipped.
        let r = same_content(Path::new("/nope/a"), 1, Path::new("/nope/b"), 2).unwrap();
        assert!(!r);
    }

    #[test]
    fn known_digest_of_empty_file() {
        let td = tempdir().unwrap();
        let p = td.path().join("empty");
        fs::write(&p, b"").unwrap();
        let d = sha256_file(&p).unwrap();
        assert_eq!(d[0], 0xe3);
        assert_eq!(d[31], 0x55);
    }
}
