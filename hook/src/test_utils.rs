//! Shared test utilities for the hook crate.

use crate::artefact::download::{ArtefactDownloader, DownloadError};
use camino::Utf8Path;
use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::process::{ExitStatus, Output};

/// Modification time stamped on every entry written by [`zip_bytes`],
/// 2024-01-01T00:00:00Z, in seconds since the Unix epoch.
pub const FIXTURE_MTIME_SECS: u64 = 1_704_067_200;

/// Compute the lowercase hex SHA-256 digest of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Build an in-memory zip archive from `(name, contents)` pairs.
///
/// Every entry is stamped with [`FIXTURE_MTIME_SECS`] so extracted trees
/// are reproducible.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let modified =
        zip::DateTime::from_date_and_time(2024, 1, 1, 0, 0, 0).expect("valid fixture date");
    let options = zip::write::SimpleFileOptions::default()
        .last_modified_time(modified)
        .unix_permissions(0o644);
    for (name, contents) in entries {
        writer.start_file(*name, options).expect("start zip entry");
        writer.write_all(contents).expect("write zip entry");
    }
    writer.finish().expect("finish zip archive").into_inner()
}

/// Write a zip archive built by [`zip_bytes`] to `path`.
pub fn write_zip(path: &Utf8Path, entries: &[(&str, &[u8])]) {
    std::fs::write(path, zip_bytes(entries)).expect("write zip archive");
}

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code.unsigned_abs())
}

/// Creates a command `Output` with the given status and stderr.
pub fn output_with_status(status: ExitStatus, stderr: &str) -> Output {
    Output {
        status,
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// An [`ArtefactDownloader`] serving canned bodies by URL.
///
/// Every requested URL is recorded; unknown URLs answer with
/// [`DownloadError::NotFound`].
#[derive(Debug, Default)]
pub struct StubDownloader {
    bodies: HashMap<String, Vec<u8>>,
    requests: RefCell<Vec<String>>,
}

impl StubDownloader {
    /// Creates a downloader that serves nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`.
    #[must_use]
    pub fn serving(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.to_owned(), body.into());
        self
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl ArtefactDownloader for StubDownloader {
    fn download(&self, url: &str, dest: &mut File) -> Result<u64, DownloadError> {
        self.requests.borrow_mut().push(url.to_owned());
        let body = self.bodies.get(url).ok_or_else(|| DownloadError::NotFound {
            url: url.to_owned(),
        })?;
        dest.write_all(body)?;
        Ok(body.len() as u64)
    }
}
