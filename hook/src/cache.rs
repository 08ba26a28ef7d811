//! Download cache.
//!
//! Cached files live at `<cache root>/<cache key>`. Downloads are staged in
//! a temporary file next to their final location and renamed into place,
//! so a concurrent build sees either no file or a complete one.

use crate::maven::MavenCoordinate;
use camino::{Utf8Path, Utf8PathBuf};
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use tempfile::{NamedTempFile, TempDir};

/// Environment variable naming a persistent cache directory.
pub const CACHE_DIR_ENV: &str = "HATCH_ROBOTPY_CACHE";

/// Number of hex characters of the URL digest used in URL cache keys.
const URL_DIGEST_PREFIX_LEN: usize = 16;

/// Number of hex characters of the repository digest used in Maven keys.
const REPOSITORY_DIGEST_PREFIX_LEN: usize = 8;

/// File name used when a URL has no usable final path segment.
const FALLBACK_FILE_NAME: &str = "artifact";

/// Errors arising from cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A cache path could not be created or read.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path being accessed.
        path: Utf8PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The configured cache directory is not valid UTF-8.
    #[error("cache directory is not valid UTF-8: {}", path.display())]
    NonUtf8 {
        /// The rejected path.
        path: PathBuf,
    },

    /// A staged download could not be renamed into place.
    #[error("cannot publish {path} into the cache: {source}")]
    Publish {
        /// The final cache path.
        path: Utf8PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
}

/// Result type alias using [`CacheError`].
pub type Result<T> = std::result::Result<T, CacheError>;

/// Deterministic relative path of a cached download.
///
/// # Examples
///
/// ```
/// use robotpy_fetch_hook::cache::CacheKey;
///
/// let key = CacheKey::for_url("https://example.com/files/ni-libs.zip?token=1");
/// assert!(key.as_str().starts_with("url/"));
/// assert!(key.as_str().ends_with("/ni-libs.zip"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a Maven artefact: `maven/<repository digest>/<repository path>`.
    ///
    /// Release and development repositories can publish the same coordinate
    /// with different contents, so the repository URL is part of the key. A
    /// trailing slash on the repository URL does not change the key.
    #[must_use]
    pub fn for_maven(repository_url: &str, coordinate: &MavenCoordinate) -> Self {
        let repository = digest_prefix(
            repository_url.trim_end_matches('/'),
            REPOSITORY_DIGEST_PREFIX_LEN,
        );
        Self(format!("maven/{repository}/{}", coordinate.path()))
    }

    /// Key for a direct URL: `url/<digest prefix>/<file name>`.
    ///
    /// The digest prefix keeps URLs that share a file name apart; the file
    /// name keeps the cache readable.
    #[must_use]
    pub fn for_url(url: &str) -> Self {
        let prefix = digest_prefix(url, URL_DIGEST_PREFIX_LEN);
        Self(format!("url/{prefix}/{}", url_file_name(url)))
    }

    /// The key as a relative POSIX path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// First `len` hex characters of the SHA-256 of `value`.
fn digest_prefix(value: &str, len: usize) -> String {
    format!("{:x}", Sha256::digest(value.as_bytes()))
        .chars()
        .take(len)
        .collect()
}

/// Sanitised final path segment of `url`.
fn url_file_name(url: &str) -> String {
    let segment = url::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_owned))
        })
        .unwrap_or_default();
    let sanitised: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitised.trim_matches('.').is_empty() {
        FALLBACK_FILE_NAME.to_owned()
    } else {
        sanitised
    }
}

/// Where the cache lives, decided once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheSettings {
    /// A user-managed directory shared across builds.
    Persistent(Utf8PathBuf),
    /// A temporary directory removed when the build finishes.
    Ephemeral,
}

impl CacheSettings {
    /// Read [`CACHE_DIR_ENV`]. Unset or empty selects an ephemeral cache.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NonUtf8`] if the variable is not valid UTF-8.
    pub fn from_env() -> Result<Self> {
        Self::from_value(std::env::var_os(CACHE_DIR_ENV))
    }

    fn from_value(value: Option<OsString>) -> Result<Self> {
        match value {
            Some(value) if !value.is_empty() => Utf8PathBuf::from_path_buf(PathBuf::from(value))
                .map(Self::Persistent)
                .map_err(|path| CacheError::NonUtf8 { path }),
            _ => Ok(Self::Ephemeral),
        }
    }

    /// Open the cache, creating its directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the directory cannot be created.
    pub fn open(&self) -> Result<CacheStore> {
        match self {
            Self::Persistent(root) => {
                std::fs::create_dir_all(root).map_err(|source| CacheError::Io {
                    path: root.clone(),
                    source,
                })?;
                log::debug!("using download cache {root}");
                Ok(CacheStore {
                    root: root.clone(),
                    ephemeral: None,
                })
            }
            Self::Ephemeral => {
                let dir = tempfile::Builder::new()
                    .prefix("robotpy-fetch-")
                    .tempdir()
                    .map_err(|source| CacheError::Io {
                        path: Utf8PathBuf::from(std::env::temp_dir().to_string_lossy().into_owned()),
                        source,
                    })?;
                let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
                    .map_err(|path| CacheError::NonUtf8 { path })?;
                log::debug!("{CACHE_DIR_ENV} unset; using temporary cache {root}");
                Ok(CacheStore {
                    root,
                    ephemeral: Some(dir),
                })
            }
        }
    }
}

/// A file present in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The key the file is stored under.
    pub key: CacheKey,
    /// Absolute path of the cached file.
    pub path: Utf8PathBuf,
}

/// An open cache directory.
///
/// An ephemeral store deletes its directory when dropped.
#[derive(Debug)]
pub struct CacheStore {
    root: Utf8PathBuf,
    ephemeral: Option<TempDir>,
}

impl CacheStore {
    /// Root directory of the cache.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Whether the store is removed at the end of the build.
    #[must_use]
    pub const fn is_ephemeral(&self) -> bool {
        self.ephemeral.is_some()
    }

    /// Final path for `key`.
    #[must_use]
    pub fn path_for(&self, key: &CacheKey) -> Utf8PathBuf {
        self.root.join(key.as_str())
    }

    /// Return the cached file for `key`, if present.
    #[must_use]
    pub fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        let path = self.path_for(key);
        path.is_file().then(|| CacheEntry {
            key: key.clone(),
            path,
        })
    }

    /// Create a temporary file next to the final location of `key`.
    ///
    /// The file is deleted if it is dropped without being published.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the directory or file cannot be
    /// created.
    pub fn stage(&self, key: &CacheKey) -> Result<NamedTempFile> {
        let path = self.path_for(key);
        let parent = path.parent().unwrap_or(self.root.as_path()).to_owned();
        std::fs::create_dir_all(&parent).map_err(|source| CacheError::Io {
            path: parent.clone(),
            source,
        })?;
        tempfile::Builder::new()
            .prefix(".download-")
            .suffix(".tmp")
            .tempfile_in(&parent)
            .map_err(|source| CacheError::Io {
                path: parent,
                source,
            })
    }

    /// Atomically move a staged download to the final location of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Publish`] if the rename fails.
    pub fn publish(&self, key: &CacheKey, staged: NamedTempFile) -> Result<CacheEntry> {
        let path = self.path_for(key);
        staged.persist(&path).map_err(|e| CacheError::Publish {
            path: path.clone(),
            source: e.error,
        })?;
        log::debug!("cached {key} at {path}");
        Ok(CacheEntry {
            key: key.clone(),
            path,
        })
    }
}
