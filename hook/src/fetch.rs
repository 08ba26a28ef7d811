//! Cache-first artefact retrieval.
//!
//! A resolved source is served from the cache when present. Otherwise it is
//! downloaded into a staged file, verified against its checksum, and only
//! then published under its cache key. A checksum mismatch discards the
//! staged file, so the cache never holds an unverified download.

use crate::artefact::download::{ArtefactDownloader, DownloadError};
use crate::artefact::verification::{IntegrityError, compute_sha256, ensure_matches};
use crate::cache::{CacheEntry, CacheError, CacheStore};
use crate::resolve::ResolvedSource;
use camino::Utf8PathBuf;

/// Errors arising while fetching an artefact.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The download failed.
    #[error(transparent)]
    Network(#[from] DownloadError),

    /// The download did not match its checksum.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// The cache could not be read or written.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A downloaded or cached file could not be hashed.
    #[error("cannot hash {path}: {source}")]
    Io {
        /// The file being hashed.
        path: Utf8PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
}

/// An artefact available on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArtefact {
    /// The cache entry holding the file.
    pub entry: CacheEntry,
    /// Whether the file was already cached.
    pub from_cache: bool,
}

/// Fetches resolved sources through a cache.
pub struct Fetcher<'a> {
    cache: &'a CacheStore,
    downloader: &'a dyn ArtefactDownloader,
}

impl<'a> Fetcher<'a> {
    /// Create a fetcher over `cache` using `downloader` for misses.
    #[must_use]
    pub const fn new(cache: &'a CacheStore, downloader: &'a dyn ArtefactDownloader) -> Self {
        Self { cache, downloader }
    }

    /// Return the artefact for `source`, downloading it on a cache miss.
    ///
    /// A cached file that no longer matches a configured checksum is
    /// treated as stale and downloaded again.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the download fails, the checksum does not
    /// match, or the cache cannot be written.
    pub fn fetch(&self, source: &ResolvedSource) -> Result<FetchedArtefact, FetchError> {
        if let Some(entry) = self.cached(source)? {
            return Ok(FetchedArtefact {
                entry,
                from_cache: true,
            });
        }

        let mut staged = self.cache.stage(&source.cache_key)?;
        let bytes = self.downloader.download(&source.url, staged.as_file_mut())?;
        log::debug!("downloaded {bytes} bytes from {}", source.url);

        if let Some(expected) = &source.checksum {
            let path = staged.path();
            let actual = compute_sha256(path).map_err(|e| FetchError::Io {
                path: Utf8PathBuf::from(path.to_string_lossy().into_owned()),
                source: e,
            })?;
            ensure_matches(&source.url, expected, actual)?;
        }

        let entry = self.cache.publish(&source.cache_key, staged)?;
        Ok(FetchedArtefact {
            entry,
            from_cache: false,
        })
    }

    /// The cached entry for `source`, if present and intact.
    fn cached(&self, source: &ResolvedSource) -> Result<Option<CacheEntry>, FetchError> {
        let Some(entry) = self.cache.lookup(&source.cache_key) else {
            return Ok(None);
        };
        let Some(expected) = &source.checksum else {
            return Ok(Some(entry));
        };

        let actual = compute_sha256(entry.path.as_std_path()).map_err(|e| FetchError::Io {
            path: entry.path.clone(),
            source: e,
        })?;
        match ensure_matches(&source.url, expected, actual) {
            Ok(()) => Ok(Some(entry)),
            Err(mismatch) => {
                log::warn!("discarding stale cache entry {}: {mismatch}", entry.key);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
#[path = "fetch_tests.rs"]
mod tests;
