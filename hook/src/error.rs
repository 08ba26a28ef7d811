//! Error types for the build hook.
//!
//! Per-target failures are wrapped in [`HookError::Target`] so the message
//! names the target and the stage it failed in.

use crate::artefact::extraction::ExtractionError;
use crate::cache::CacheError;
use crate::config::ConfigurationError;
use crate::fetch::FetchError;
use crate::strip::StripError;
use camino::Utf8PathBuf;
use robotpy_fetch_common::PlatformError;
use std::fmt;
use thiserror::Error;

/// Lifecycle stage of a single target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStage {
    /// Platform substitution and URL construction.
    Resolve,
    /// Cache lookup and download.
    Fetch,
    /// Zip extraction into the build tree.
    Extract,
    /// Debug symbol stripping.
    Strip,
}

impl fmt::Display for TargetStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resolve => "resolve",
            Self::Fetch => "fetch",
            Self::Extract => "extract",
            Self::Strip => "strip",
        };
        f.write_str(name)
    }
}

/// The underlying cause of a per-target failure.
#[derive(Debug, Error)]
pub enum TargetFailure {
    /// The target could not be resolved for the platform.
    #[error(transparent)]
    Resolve(#[from] ConfigurationError),

    /// Fetching failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Extraction failed.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Stripping failed.
    #[error(transparent)]
    Strip(#[from] StripError),

    /// Clearing an output directory failed.
    #[error("cannot clear {path}: {source}")]
    Io {
        /// The directory being cleared.
        path: Utf8PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
}

/// Errors that can occur while running the hook.
#[derive(Debug, Error)]
pub enum HookError {
    /// The hook configuration is malformed or contradictory.
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    /// A target failed; the build is aborted.
    #[error("target {target} failed to {stage}: {source}")]
    Target {
        /// Name of the failing target.
        target: String,
        /// Stage the target failed in.
        stage: TargetStage,
        /// The underlying failure.
        #[source]
        source: Box<TargetFailure>,
    },

    /// The download cache could not be opened.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The build platform is unknown or unsupported.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// The host's build data could not be read or written.
    #[error("invalid build data: {reason}")]
    BuildData {
        /// Description of the failure.
        reason: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HookError {
    /// Wrap a per-target failure.
    #[must_use]
    pub fn target(name: &str, stage: TargetStage, failure: impl Into<TargetFailure>) -> Self {
        Self::Target {
            target: name.to_owned(),
            stage,
            source: Box::new(failure.into()),
        }
    }
}

/// Result type alias using [`HookError`].
pub type Result<T> = std::result::Result<T, HookError>;
