//! Artefact transfer: download, integrity verification, and extraction.
//!
//! # Sub-modules
//!
//! - [`download`] - Artefact download trait and HTTP implementation.
//! - [`error`] - Semantic error types for validation failures.
//! - [`extraction`] - Plan-driven zip extraction with path traversal protection.
//! - [`sha256_digest`] - SHA-256 digest newtype (`Sha256Digest`).
//! - [`verification`] - Checksum computation and comparison.

pub mod download;
pub mod error;
pub mod extraction;
pub mod sha256_digest;
pub mod verification;
