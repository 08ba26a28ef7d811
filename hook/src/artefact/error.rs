//! Error types for artefact value validation.
//!
//! Each variant names the invalid input and the constraint that was
//! violated.

use thiserror::Error;

/// Errors arising from invalid artefact-related values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtefactError {
    /// A SHA-256 digest is not a valid 64-character hex string.
    #[error("invalid SHA-256 digest: {reason}")]
    InvalidSha256Digest {
        /// Description of the validation failure.
        reason: String,
    },

    /// A checksum uses an algorithm other than SHA-256.
    #[error("unsupported checksum algorithm \"{algorithm}\"; only sha256 is supported")]
    UnsupportedChecksumAlgorithm {
        /// The rejected algorithm prefix.
        algorithm: String,
    },
}

/// Result type alias using [`ArtefactError`].
pub type Result<T> = std::result::Result<T, ArtefactError>;
