//! Integrity verification for downloaded artefacts.
//!
//! A configured checksum is compared against the SHA-256 digest of the
//! downloaded file before the file is published into the cache, and again
//! when a cached file is reused.

use super::sha256_digest::Sha256Digest;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::Path;

/// A downloaded artefact did not match its configured checksum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("checksum mismatch for {url}: expected sha256 {expected}, got {actual}")]
pub struct IntegrityError {
    /// The URL the artefact was downloaded from.
    pub url: String,
    /// The configured digest.
    pub expected: Sha256Digest,
    /// The digest of the downloaded bytes.
    pub actual: Sha256Digest,
}

/// Compute the SHA-256 digest of a file.
///
/// Reads the file at `path` in chunks and returns the lowercase hex
/// digest as a validated [`Sha256Digest`].
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub fn compute_sha256(path: &Path) -> std::io::Result<Sha256Digest> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(buffer.get(..bytes_read).unwrap_or_default());
    }
    let hex = format!("{:x}", hasher.finalize());
    Sha256Digest::try_from(hex).map_err(std::io::Error::other)
}

/// Compare the digest of a downloaded file with the configured checksum.
///
/// # Errors
///
/// Returns [`IntegrityError`] when `actual` differs from `expected`.
pub fn ensure_matches(
    url: &str,
    expected: &Sha256Digest,
    actual: Sha256Digest,
) -> Result<(), IntegrityError> {
    if &actual == expected {
        return Ok(());
    }
    Err(IntegrityError {
        url: url.to_owned(),
        expected: expected.clone(),
        actual,
    })
}
