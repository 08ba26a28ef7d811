//! Zip extraction driven by an [`ExtractionPlan`].
//!
//! Each plan entry names a file or directory inside the archive and the
//! destination it is copied to. An empty source selects the whole archive.
//! Entry paths are validated before anything is written to guard against
//! path traversal (zip-slip).

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use chrono::NaiveDate;
use std::fs;
use std::io::Read;
use std::time::SystemTime;

/// One `(source entry, destination)` pair of an [`ExtractionPlan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    /// Archive entry to copy. Empty selects the whole archive; a directory
    /// name selects everything below it.
    pub source: String,
    /// Destination path on disk.
    pub destination: Utf8PathBuf,
}

/// Ordered list of archive entries and where they are written.
///
/// # Examples
///
/// ```
/// use robotpy_fetch_hook::artefact::extraction::ExtractionPlan;
///
/// let mut plan = ExtractionPlan::default();
/// plan.push("include", "build/native/include");
/// assert_eq!(plan.entries().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionPlan {
    entries: Vec<PlanEntry>,
}

impl ExtractionPlan {
    /// Append an entry to the plan.
    pub fn push(&mut self, source: impl Into<String>, destination: impl Into<Utf8PathBuf>) {
        self.entries.push(PlanEntry {
            source: source.into(),
            destination: destination.into(),
        });
    }

    /// The planned entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }
}

/// A file written by an extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFile {
    /// Name of the entry inside the archive.
    pub source: String,
    /// Path the entry was written to.
    pub destination: Utf8PathBuf,
}

/// Trait for extracting artefact archives, enabling test mocking.
///
/// # Examples
///
/// ```
/// use robotpy_fetch_hook::artefact::extraction::ZipExtractor;
///
/// let extractor = ZipExtractor;
/// // Use extractor.extract(archive_path, &plan) in production
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArtefactExtractor {
    /// Extract the entries selected by `plan` from the archive at `archive`.
    ///
    /// Existing destination files are overwritten, so repeated calls
    /// produce the same tree.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::MissingEntry`] if a planned source matches
    /// nothing, [`ExtractionError::PathTraversal`] if an entry would escape
    /// its destination, [`ExtractionError::EmptyArchive`] if the archive has
    /// no files, and [`ExtractionError::Archive`] or [`ExtractionError::Io`]
    /// on read or write failures.
    fn extract(
        &self,
        archive: &Utf8Path,
        plan: &ExtractionPlan,
    ) -> Result<Vec<ExtractedFile>, ExtractionError>;
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The archive is not a readable zip file.
    #[error("invalid zip archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// A planned source entry does not exist in the archive.
    #[error("{entry} not found in {archive}")]
    MissingEntry {
        /// The planned source entry.
        entry: String,
        /// The archive that was searched.
        archive: Utf8PathBuf,
    },

    /// The archive contains no files.
    #[error("archive contains no files: {archive}")]
    EmptyArchive {
        /// The archive that was searched.
        archive: Utf8PathBuf,
    },
}

/// Default extractor backed by the `zip` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipExtractor;

impl ArtefactExtractor for ZipExtractor {
    fn extract(
        &self,
        archive: &Utf8Path,
        plan: &ExtractionPlan,
    ) -> Result<Vec<ExtractedFile>, ExtractionError> {
        let file = fs::File::open(archive)?;
        let mut zip = zip::ZipArchive::new(file)?;
        let mut extracted = Vec::new();

        for planned in plan.entries() {
            let before = extracted.len();
            let source = planned.source.trim_end_matches('/');

            for index in 0..zip.len() {
                let mut entry = zip.by_index(index)?;
                if entry.is_dir() {
                    continue;
                }
                let name = entry.name().to_owned();
                let Some(relative) = relative_to_source(&name, source) else {
                    continue;
                };
                if entry.enclosed_name().is_none() {
                    return Err(ExtractionError::PathTraversal { path: name });
                }
                validate_entry_path(&name, relative)?;

                let destination = if relative.is_empty() {
                    planned.destination.clone()
                } else {
                    planned.destination.join(relative)
                };
                let modified: Option<zip::DateTime> = entry.last_modified().into();
                let mode = entry.unix_mode();
                write_entry(&mut entry, &destination, mode, modified)?;
                log::trace!("extracted {name} to {destination}");
                extracted.push(ExtractedFile {
                    source: name,
                    destination,
                });
            }

            if extracted.len() == before {
                if source.is_empty() {
                    return Err(ExtractionError::EmptyArchive {
                        archive: archive.to_owned(),
                    });
                }
                return Err(ExtractionError::MissingEntry {
                    entry: planned.source.clone(),
                    archive: archive.to_owned(),
                });
            }
        }

        Ok(extracted)
    }
}

/// Path of `name` relative to the planned `source`.
///
/// Returns an empty string when `name` is the source file itself and
/// `None` when `name` is not selected by `source`.
fn relative_to_source<'a>(name: &'a str, source: &str) -> Option<&'a str> {
    if source.is_empty() {
        return Some(name);
    }
    if name == source {
        return Some("");
    }
    name.strip_prefix(source)?.strip_prefix('/')
}

/// Validate that an entry path does not escape the destination directory
/// via `..` components or absolute paths.
fn validate_entry_path(name: &str, relative: &str) -> Result<(), ExtractionError> {
    let path = Utf8Path::new(relative);
    if path.is_absolute() {
        return Err(ExtractionError::PathTraversal {
            path: name.to_owned(),
        });
    }
    for component in path.components() {
        if !matches!(component, Utf8Component::Normal(_) | Utf8Component::CurDir) {
            return Err(ExtractionError::PathTraversal {
                path: name.to_owned(),
            });
        }
    }
    Ok(())
}

/// Write one archive entry to `destination`, replacing any existing file.
fn write_entry(
    reader: &mut impl Read,
    destination: &Utf8Path,
    mode: Option<u32>,
    modified: Option<zip::DateTime>,
) -> Result<(), ExtractionError> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::remove_file(destination) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let mut output = fs::File::create(destination)?;
    std::io::copy(reader, &mut output)?;
    if let Some(time) = modified.and_then(zip_time_to_system) {
        output.set_modified(time)?;
    }
    drop(output);
    apply_mode(destination, mode)?;
    Ok(())
}

#[cfg(unix)]
fn apply_mode(destination: &Utf8Path, mode: Option<u32>) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if let Some(mode) = mode {
        fs::set_permissions(destination, fs::Permissions::from_mode(mode & 0o777))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_mode(_destination: &Utf8Path, _mode: Option<u32>) -> std::io::Result<()> {
    Ok(())
}

/// Convert a zip timestamp to a [`SystemTime`].
///
/// Zip timestamps carry no zone; they are interpreted as UTC so that the
/// same archive always yields the same modification times.
fn zip_time_to_system(time: zip::DateTime) -> Option<SystemTime> {
    let datetime = NaiveDate::from_ymd_opt(
        i32::from(time.year()),
        u32::from(time.month()),
        u32::from(time.day()),
    )?
    .and_hms_opt(
        u32::from(time.hour()),
        u32::from(time.minute()),
        u32::from(time.second()),
    )?
    .and_utc();
    Some(SystemTime::from(datetime))
}

#[cfg(test)]
#[path = "extraction_tests.rs"]
mod tests;
