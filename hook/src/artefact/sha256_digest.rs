//! SHA-256 digest newtype for artefact verification.
//!
//! Validates that the value is a 64-character lowercase hexadecimal string
//! representing a 256-bit hash digest.

use super::error::{ArtefactError, Result};
use std::fmt;

/// Expected length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// Prefix accepted in configured checksums, e.g. `sha256:ab12…`.
const SHA256_PREFIX: &str = "sha256";

/// A validated hex-encoded SHA-256 digest string.
///
/// # Examples
///
/// ```
/// use robotpy_fetch_hook::artefact::sha256_digest::Sha256Digest;
///
/// let hex = "a".repeat(64);
/// let digest: Sha256Digest = hex.as_str().try_into().unwrap();
/// assert_eq!(digest.as_str().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Parse a user-supplied checksum.
    ///
    /// Accepts either a bare hex digest or `sha256:<hex>`. Hex digits are
    /// normalised to lowercase.
    ///
    /// # Errors
    ///
    /// Returns [`ArtefactError::UnsupportedChecksumAlgorithm`] for any other
    /// algorithm prefix and [`ArtefactError::InvalidSha256Digest`] for a
    /// malformed digest.
    ///
    /// # Examples
    ///
    /// ```
    /// use robotpy_fetch_hook::artefact::sha256_digest::Sha256Digest;
    ///
    /// let checksum = format!("sha256:{}", "AB".repeat(32));
    /// let digest = Sha256Digest::parse_checksum(&checksum).unwrap();
    /// assert_eq!(digest.as_str(), "ab".repeat(32));
    /// ```
    pub fn parse_checksum(value: &str) -> Result<Self> {
        let hex = match value.split_once(':') {
            Some((algorithm, hex)) if algorithm.eq_ignore_ascii_case(SHA256_PREFIX) => hex,
            Some((algorithm, _)) => {
                return Err(ArtefactError::UnsupportedChecksumAlgorithm {
                    algorithm: algorithm.to_owned(),
                });
            }
            None => value,
        };
        Self::try_from(hex.trim().to_ascii_lowercase())
    }

    /// Return the digest as a hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<&str> for Sha256Digest {
    type Error = ArtefactError;

    fn try_from(value: &str) -> Result<Self> {
        validate_sha256(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for Sha256Digest {
    type Error = ArtefactError;

    fn try_from(value: String) -> Result<Self> {
        validate_sha256(&value)?;
        Ok(Self(value))
    }
}

impl AsRef<str> for Sha256Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validate that `value` is a well-formed hex-encoded SHA-256 digest.
fn validate_sha256(value: &str) -> Result<()> {
    if value.len() != DIGEST_HEX_LEN {
        return Err(ArtefactError::InvalidSha256Digest {
            reason: format!(
                "expected {DIGEST_HEX_LEN} hex characters, got {}",
                value.len()
            ),
        });
    }
    if let Some(bad) = value.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(ArtefactError::InvalidSha256Digest {
            reason: format!("non-hex character '{bad}'"),
        });
    }
    if value.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(ArtefactError::InvalidSha256Digest {
            reason: "digest must be lowercase".to_owned(),
        });
    }
    Ok(())
}
