//! SHA-1 checksums over original (uncompressed) file content

use crate::error::{CommonError, Result};
use sha1::{Digest, Sha1};
use std::io::Read;
use std::path::Path;

/// Hex encoded SHA-1 of an in-memory buffer
pub fn checksum_bytes(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

/// Compute checksum for any readable source
pub fn compute_checksum<R: Read>(reader: &mut R) -> Result<String> {
    let mut hasher = Sha1::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compute checksum for a file
pub fn compute_file_checksum(path: impl AsRef<Path>) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    compute_checksum(&mut file)
}

/// Verify a buffer against a recorded checksum
pub fn verify_checksum(data: &[u8], expected: &str) -> Result<()> {
    let actual = checksum_bytes(data);
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(CommonError::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}
