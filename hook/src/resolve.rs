//! Target resolution for a concrete platform.
//!
//! Resolution substitutes `${OS}` and `${ARCH}`, evaluates `enable_if`,
//! builds the download URL and cache key, and derives the extraction plan.
//! It performs no I/O, so every target can be resolved before the first
//! download starts.

use crate::artefact::extraction::ExtractionPlan;
use crate::artefact::sha256_digest::Sha256Digest;
use crate::cache::CacheKey;
use crate::config::{ArtifactSource, BuildTargetConfig, ConfigurationError};
use crate::maven::MavenCoordinate;
use camino::{Utf8Path, Utf8PathBuf};
use robotpy_fetch_common::{MarkerEnvironment, Platform};

/// Directory below `extract_to` receiving headers.
pub const INCLUDE_DIR: &str = "include";

/// Directory below `extract_to` receiving libraries.
pub const LIB_DIR: &str = "lib";

/// A concrete download for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    /// Download URL with placeholders substituted.
    pub url: String,
    /// Key the download is cached under.
    pub cache_key: CacheKey,
    /// Expected digest, if configured.
    pub checksum: Option<Sha256Digest>,
}

/// A target ready to be fetched and extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Name of the target table.
    pub name: String,
    /// What to download.
    pub source: ResolvedSource,
    /// What to extract and where.
    pub plan: ExtractionPlan,
    /// Directories cleared before extraction.
    pub clear_dirs: Vec<Utf8PathBuf>,
    /// Extracted library files, candidates for stripping.
    pub lib_files: Vec<Utf8PathBuf>,
    /// Explicit strip setting.
    pub strip: Option<bool>,
}

/// Outcome of resolving one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The target applies to this platform.
    Enabled(ResolvedTarget),
    /// The target's `enable_if` marker did not match.
    Disabled {
        /// Name of the target table.
        name: String,
        /// The marker that evaluated false.
        marker: String,
    },
}

/// Resolve `target` for `platform`, with outputs below `root`.
///
/// # Errors
///
/// Returns [`ConfigurationError::Invalid`] if the substituted Maven
/// coordinate is malformed.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use robotpy_fetch_common::Platform;
/// use robotpy_fetch_hook::config::HookConfig;
/// use robotpy_fetch_hook::resolve::{Resolution, resolve_target};
///
/// let table: toml::Table = r#"
///     [targets.ni]
///     extract_to = "native/ni"
///     url = "https://example.com/ni-${OS}${ARCH}.zip"
/// "#.parse()?;
/// let config = HookConfig::from_table(&table)?;
/// let platform = Platform::by_name("linux-roborio")?;
///
/// let Resolution::Enabled(resolved) =
///     resolve_target(Utf8Path::new("/build"), &config.targets[0], platform)?
/// else {
///     panic!("target is enabled");
/// };
/// assert_eq!(resolved.source.url, "https://example.com/ni-linuxathena.zip");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn resolve_target(
    root: &Utf8Path,
    target: &BuildTargetConfig,
    platform: &Platform,
) -> Result<Resolution, ConfigurationError> {
    if let Some(marker) = &target.enable_if {
        if !marker.evaluate(&MarkerEnvironment::for_platform(platform)) {
            return Ok(Resolution::Disabled {
                name: target.name.clone(),
                marker: marker.to_string(),
            });
        }
    }

    let source = resolve_source(target, platform)?;
    let extract_root = root.join(&target.extract_to);
    let layout = &target.layout;

    let mut plan = ExtractionPlan::default();
    let mut clear_dirs = Vec::new();
    let mut lib_files = Vec::new();

    if let Some(incdir) = &layout.incdir {
        let include = extract_root.join(INCLUDE_DIR);
        plan.push(platform.substitute(incdir), include.clone());
        clear_dirs.push(include);
    }

    if let Some(libdir) = &layout.libdir {
        if !layout.libs.is_empty() || !layout.staticlibs.is_empty() {
            let libdir = platform.substitute(libdir);
            let lib_root = extract_root.join(LIB_DIR);
            for name in library_file_names(layout.libs.as_slice(), layout.staticlibs.as_slice(), platform) {
                let destination = lib_root.join(&name);
                plan.push(posix_join(&libdir, &name), destination.clone());
                lib_files.push(destination);
            }
            clear_dirs.push(lib_root);
        }
    }

    for file in &layout.files {
        plan.push(file.clone(), extract_root.join(file));
    }

    // Whole-archive targets overwrite in place; `extract_to` may hold
    // sources or other targets' output.
    if layout.is_whole_archive() {
        plan.push("", extract_root);
    }

    Ok(Resolution::Enabled(ResolvedTarget {
        name: target.name.clone(),
        source,
        plan,
        clear_dirs,
        lib_files,
        strip: target.strip,
    }))
}

/// Directories `clean` removes for `target`.
///
/// Only the `include` and `lib` directories the target owns are listed.
/// Whole-archive and `files` targets share `extract_to` with other content,
/// so nothing is removed for them.
#[must_use]
pub fn output_dirs(root: &Utf8Path, target: &BuildTargetConfig) -> Vec<Utf8PathBuf> {
    let extract_root = root.join(&target.extract_to);
    let layout = &target.layout;
    let mut dirs = Vec::new();
    if layout.incdir.is_some() {
        dirs.push(extract_root.join(INCLUDE_DIR));
    }
    if !layout.libs.is_empty() || !layout.staticlibs.is_empty() {
        dirs.push(extract_root.join(LIB_DIR));
    }
    dirs
}

fn resolve_source(
    target: &BuildTargetConfig,
    platform: &Platform,
) -> Result<ResolvedSource, ConfigurationError> {
    match &target.source {
        ArtifactSource::Url(source) => {
            let url = platform.substitute(&source.url);
            Ok(ResolvedSource {
                cache_key: CacheKey::for_url(&url),
                url,
                checksum: source.checksum.clone(),
            })
        }
        ArtifactSource::Maven(source) => {
            let classifier = source
                .classifier
                .as_deref()
                .map(|classifier| platform.substitute(classifier));
            let coordinate = MavenCoordinate::new(
                &source.group,
                &source.artifact,
                &source.version,
                classifier.as_deref(),
                &source.extension,
            )
            .map_err(|e| ConfigurationError::Invalid {
                location: format!("targets.{}", target.name),
                reason: e.to_string(),
            })?;
            log::debug!("resolved {} to {coordinate}", target.name);
            Ok(ResolvedSource {
                url: coordinate.url(&source.repository_url),
                cache_key: CacheKey::for_maven(&source.repository_url, &coordinate),
                checksum: None,
            })
        }
    }
}

/// Library file names for `platform`: shared libraries with their link
/// libraries, then static libraries.
fn library_file_names(libs: &[String], staticlibs: &[String], platform: &Platform) -> Vec<String> {
    let mut names = Vec::new();
    for lib in libs {
        names.push(platform.shared_library(lib));
        if let Some(link) = platform.link_library(lib) {
            names.push(link);
        }
    }
    names.extend(staticlibs.iter().map(|lib| platform.static_library(lib)));
    names
}

fn posix_join(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        name.to_owned()
    } else {
        format!("{dir}/{name}")
    }
}
