//! Artefact download over HTTP.
//!
//! Provides a trait-based abstraction for streaming an artefact into a
//! staged cache file, enabling dependency injection for testing.

use std::fs::File;
use std::sync::OnceLock;
use std::time::Duration;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("robotpy-fetch/", env!("CARGO_PKG_VERSION"));

/// Network timeout for a single artefact download.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Trait for downloading artefact files.
///
/// Abstractions allow tests to mock HTTP behaviour without network access.
///
/// # Examples
///
/// ```no_run
/// use robotpy_fetch_hook::artefact::download::{ArtefactDownloader, HttpDownloader};
///
/// let mut file = tempfile::tempfile()?;
/// let bytes = HttpDownloader.download("https://example.com/thing.zip", &mut file)?;
/// assert!(bytes > 0);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArtefactDownloader {
    /// Download `url` and write the body into `dest`.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the server reports an error
    /// status, or the body cannot be written.
    fn download(&self, url: &str, dest: &mut File) -> Result<u64, DownloadError>;
}

/// Errors arising from artefact download operations.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// HTTP request failed.
    #[error("download failed for {url}: {reason}")]
    HttpError {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The requested artefact was not found (HTTP 404).
    #[error("artefact not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// I/O error writing the downloaded file.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP-based downloader using `ureq`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpDownloader;

impl ArtefactDownloader for HttpDownloader {
    fn download(&self, url: &str, dest: &mut File) -> Result<u64, DownloadError> {
        log::debug!("GET {url}");
        let response = http_agent()
            .get(url)
            .header("User-Agent", USER_AGENT)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let written = std::io::copy(&mut response.into_body().as_reader(), dest)?;
        log::debug!("received {written} bytes from {url}");
        Ok(written)
    }
}

/// Shared `ureq` agent with request timeout configuration.
fn http_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(DOWNLOAD_TIMEOUT))
            .build();
        ureq::Agent::new_with_config(config)
    })
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404) => DownloadError::NotFound {
            url: url.to_owned(),
        },
        other => DownloadError::HttpError {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}
