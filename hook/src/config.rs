//! Hook configuration models.
//!
//! The hook's table in `pyproject.toml` is parsed once into validated
//! [`BuildTargetConfig`] values. Every target declares exactly one
//! [`ArtifactSource`]: a direct URL or a Maven coordinate.
//!
//! ```toml
//! [tool.hatch.build.hooks.robotpy.targets.wpiutil-headers]
//! extract_to = "native/wpiutil"
//! repo = "https://frcmaven.wpi.edu/artifactory/release"
//! group = "edu.wpi.first.wpiutil"
//! artifact = "wpiutil-cpp"
//! version = "2024.1.1"
//! classifier = "headers"
//! incdir = ""
//! ```
//!
//! Entries of the `maven_lib_download` array are shorthand for the usual set
//! of WPILib-style Maven artefacts. Each expands into a headers target, plus
//! shared and static library targets or a sources target:
//!
//! ```toml
//! [[tool.hatch.build.hooks.robotpy.maven_lib_download]]
//! extract_to = "native/wpiutil"
//! repo_url = "https://frcmaven.wpi.edu/artifactory/release"
//! group_id = "edu.wpi.first.wpiutil"
//! artifact_id = "wpiutil-cpp"
//! version = "2024.1.1"
//! libs = ["wpiutil"]
//! ```

use crate::artefact::sha256_digest::Sha256Digest;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use robotpy_fetch_common::Marker;
use serde::Deserialize;

/// Dotted location of the hook table inside `pyproject.toml`.
pub const DEFAULT_TABLE: &str = "tool.hatch.build.hooks.robotpy";

/// Extension used for Maven artefacts when none is configured.
pub const DEFAULT_EXTENSION: &str = "zip";

/// Classifier of the sources artefact when none is configured.
pub const DEFAULT_SOURCES_CLASSIFIER: &str = "sources";

const TARGETS_KEY: &str = "targets";
const MAVEN_LIB_DOWNLOAD_KEY: &str = "maven_lib_download";

const HEADERS_CLASSIFIER: &str = "headers";
const SHARED_CLASSIFIER: &str = "${OS}${ARCH}";
const SHARED_LIBDIR: &str = "${OS}/${ARCH}/shared";
const STATIC_CLASSIFIER: &str = "${OS}${ARCH}static";
const STATIC_LIBDIR: &str = "${OS}/${ARCH}/static";

/// Errors arising from malformed or contradictory configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// The configuration file could not be read or parsed.
    #[error("cannot read configuration {path}: {reason}")]
    Unreadable {
        /// The configuration file.
        path: Utf8PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// A value has the wrong type or violates a constraint.
    #[error("{location}: {reason}")]
    Invalid {
        /// Dotted location of the offending table.
        location: String,
        /// Description of the violation.
        reason: String,
    },

    /// A target declares both a URL and Maven coordinates.
    #[error("{location}: specify either url or a maven coordinate (repo/group/artifact/version), not both")]
    ConflictingSources {
        /// Dotted location of the offending target.
        location: String,
    },

    /// A target declares neither a URL nor Maven coordinates.
    #[error("{location}: no artefact source; specify url or repo/group/artifact/version")]
    MissingSource {
        /// Dotted location of the offending target.
        location: String,
    },

    /// A required field is absent.
    #[error("{location}: missing required field \"{field}\"")]
    MissingField {
        /// Dotted location of the offending target.
        location: String,
        /// The missing field.
        field: &'static str,
    },
}

/// Result type alias using [`ConfigurationError`].
pub type Result<T> = std::result::Result<T, ConfigurationError>;

/// An artefact fetched from a direct URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlSource {
    /// Download URL, possibly containing `${OS}` / `${ARCH}` placeholders.
    pub url: String,
    /// Expected SHA-256 digest of the downloaded file.
    pub checksum: Option<Sha256Digest>,
}

/// An artefact fetched from a Maven repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MavenSource {
    /// Base URL of the repository.
    pub repository_url: String,
    /// Dotted group identifier.
    pub group: String,
    /// Artifact identifier.
    pub artifact: String,
    /// Artifact version.
    pub version: String,
    /// Optional classifier, possibly containing placeholders.
    pub classifier: Option<String>,
    /// File extension, `zip` unless configured.
    pub extension: String,
}

/// Where an artefact comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSource {
    /// Direct download URL.
    Url(UrlSource),
    /// Maven repository coordinate.
    Maven(MavenSource),
}

/// Which parts of an archive are extracted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractLayout {
    /// Archive directory holding headers.
    pub incdir: Option<String>,
    /// Archive directory holding libraries.
    pub libdir: Option<String>,
    /// Individual archive entries to extract.
    pub files: Vec<String>,
    /// Shared libraries to extract from `libdir`.
    pub libs: Vec<String>,
    /// Static libraries to extract from `libdir`.
    pub staticlibs: Vec<String>,
}

impl ExtractLayout {
    /// Whether no selection was configured, meaning the whole archive is
    /// extracted.
    #[must_use]
    pub const fn is_whole_archive(&self) -> bool {
        self.incdir.is_none()
            && self.files.is_empty()
            && self.libs.is_empty()
            && self.staticlibs.is_empty()
    }
}

/// A configured build target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTargetConfig {
    /// Name of the target table.
    pub name: String,
    /// Where the artefact is downloaded from.
    pub source: ArtifactSource,
    /// Destination directory relative to the build root.
    pub extract_to: Utf8PathBuf,
    /// Archive selection.
    pub layout: ExtractLayout,
    /// Explicit strip setting; `None` uses the build-dependent default.
    pub strip: Option<bool>,
    /// Condition under which the target is enabled.
    pub enable_if: Option<Marker>,
}

/// The validated hook configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookConfig {
    /// Targets in table order, followed by the targets expanded from
    /// `maven_lib_download` entries in array order.
    pub targets: Vec<BuildTargetConfig>,
}

impl HookConfig {
    /// Load and validate the hook table at `dotted_table` in `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if the file cannot be read or any
    /// target is invalid.
    pub fn load(path: &Utf8Path, dotted_table: &str) -> Result<Self> {
        let table = load_hook_table(path, dotted_table)?;
        Self::from_table_at(&table, dotted_table)
    }

    /// Validate an already-parsed hook table.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if any target is invalid.
    pub fn from_table(table: &toml::Table) -> Result<Self> {
        Self::from_table_at(table, "")
    }

    /// Validate a hook table, naming errors relative to `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if any target is invalid.
    pub fn from_table_at(table: &toml::Table, prefix: &str) -> Result<Self> {
        for key in table
            .keys()
            .filter(|key| !matches!(key.as_str(), TARGETS_KEY | MAVEN_LIB_DOWNLOAD_KEY))
        {
            log::debug!("ignoring hook option {key}");
        }
        let mut targets = parse_targets(table, prefix)?;
        targets.extend(parse_maven_lib_downloads(table, prefix)?);
        Ok(Self { targets })
    }
}

fn parse_targets(table: &toml::Table, prefix: &str) -> Result<Vec<BuildTargetConfig>> {
    let targets_location = join_location(prefix, TARGETS_KEY);
    let Some(targets) = table.get(TARGETS_KEY) else {
        return Ok(Vec::new());
    };
    let targets = targets
        .as_table()
        .ok_or_else(|| ConfigurationError::Invalid {
            location: targets_location.clone(),
            reason: "targets must be a table".to_owned(),
        })?;

    targets
        .iter()
        .map(|(name, value)| parse_target(name, value, &join_location(&targets_location, name)))
        .collect()
}

fn parse_maven_lib_downloads(table: &toml::Table, prefix: &str) -> Result<Vec<BuildTargetConfig>> {
    let location = join_location(prefix, MAVEN_LIB_DOWNLOAD_KEY);
    let Some(downloads) = table.get(MAVEN_LIB_DOWNLOAD_KEY) else {
        return Ok(Vec::new());
    };
    let downloads = downloads
        .as_array()
        .ok_or_else(|| ConfigurationError::Invalid {
            location: location.clone(),
            reason: "maven_lib_download must be an array of tables".to_owned(),
        })?;

    let mut targets = Vec::new();
    for (index, value) in downloads.iter().enumerate() {
        targets.extend(expand_maven_lib(value, &format!("{location}[{index}]"))?);
    }
    Ok(targets)
}

/// Read `path` and return the table at `dotted_table`.
///
/// A missing table yields an empty table.
///
/// # Errors
///
/// Returns [`ConfigurationError::Unreadable`] if the file cannot be read
/// or is not valid TOML, and [`ConfigurationError::Invalid`] if the dotted
/// location names a non-table value.
pub fn load_hook_table(path: &Utf8Path, dotted_table: &str) -> Result<toml::Table> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigurationError::Unreadable {
        path: path.to_owned(),
        reason: e.to_string(),
    })?;
    let document: toml::Table =
        contents
            .parse()
            .map_err(|e| ConfigurationError::Unreadable {
                path: path.to_owned(),
                reason: format!("TOML parse error: {e}"),
            })?;

    let mut current = &document;
    for segment in dotted_table.split('.').filter(|s| !s.is_empty()) {
        let Some(value) = current.get(segment) else {
            log::debug!("{path} has no [{dotted_table}] table");
            return Ok(toml::Table::new());
        };
        current = value.as_table().ok_or_else(|| ConfigurationError::Invalid {
            location: dotted_table.to_owned(),
            reason: format!("{segment} is not a table"),
        })?;
    }
    Ok(current.clone())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTarget {
    extract_to: Option<String>,
    url: Option<String>,
    checksum: Option<String>,
    #[serde(alias = "repo_url")]
    repo: Option<String>,
    #[serde(alias = "group_id")]
    group: Option<String>,
    #[serde(alias = "artifact_id")]
    artifact: Option<String>,
    version: Option<String>,
    classifier: Option<String>,
    extension: Option<String>,
    incdir: Option<String>,
    libdir: Option<String>,
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    libs: Vec<String>,
    #[serde(default)]
    staticlibs: Vec<String>,
    strip: Option<bool>,
    enable_if: Option<String>,
}

impl RawTarget {
    const fn has_maven_keys(&self) -> bool {
        self.repo.is_some()
            || self.group.is_some()
            || self.artifact.is_some()
            || self.version.is_some()
            || self.classifier.is_some()
            || self.extension.is_some()
    }
}

fn parse_target(name: &str, value: &toml::Value, location: &str) -> Result<BuildTargetConfig> {
    let invalid = |reason: String| ConfigurationError::Invalid {
        location: location.to_owned(),
        reason,
    };
    if !value.is_table() {
        return Err(invalid("target must be a table".to_owned()));
    }
    let raw: RawTarget = value
        .clone()
        .try_into()
        .map_err(|e: toml::de::Error| invalid(e.message().to_owned()))?;
    target_from_raw(name, raw, location)
}

fn target_from_raw(name: &str, raw: RawTarget, location: &str) -> Result<BuildTargetConfig> {
    let invalid = |reason: String| ConfigurationError::Invalid {
        location: location.to_owned(),
        reason,
    };
    let source = parse_source(&raw, location)?;

    let extract_to = raw
        .extract_to
        .as_deref()
        .ok_or_else(|| ConfigurationError::MissingField {
            location: location.to_owned(),
            field: "extract_to",
        })?;
    let extract_to =
        validate_relative(extract_to).map_err(|reason| invalid(format!("extract_to {reason}")))?;
    for file in &raw.files {
        validate_relative(file).map_err(|reason| invalid(format!("files entry {reason}")))?;
    }

    if (!raw.libs.is_empty() || !raw.staticlibs.is_empty()) && raw.libdir.is_none() {
        return Err(invalid("libs and staticlibs require libdir".to_owned()));
    }

    let enable_if = raw
        .enable_if
        .as_deref()
        .map(Marker::parse)
        .transpose()
        .map_err(|e| invalid(format!("enable_if: {e}")))?;

    log::trace!("parsed target {name} from {location}");
    Ok(BuildTargetConfig {
        name: name.to_owned(),
        source,
        extract_to,
        layout: ExtractLayout {
            incdir: raw.incdir,
            libdir: raw.libdir,
            files: raw.files,
            libs: raw.libs,
            staticlibs: raw.staticlibs,
        },
        strip: raw.strip,
        enable_if,
    })
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMavenLib {
    extract_to: Option<String>,
    #[serde(alias = "artifact")]
    artifact_id: Option<String>,
    #[serde(alias = "group")]
    group_id: Option<String>,
    #[serde(alias = "repo")]
    repo_url: Option<String>,
    version: Option<String>,
    sources_classifier: Option<String>,
    #[serde(default)]
    use_sources: bool,
    use_headers: Option<bool>,
    libs: Option<Vec<String>>,
    staticlibs: Option<Vec<String>>,
    sources: Option<Vec<String>>,
    strip: Option<bool>,
    enable_if: Option<String>,
}

/// Expand one `maven_lib_download` entry into its Maven targets.
///
/// Targets are named after the artifact: `<artifact>-headers`, then either
/// `<artifact>-sources` or `<artifact>-libs` and `<artifact>-staticlibs`.
/// Without `libs` or `staticlibs`, one shared library named after the
/// artifact is assumed.
fn expand_maven_lib(value: &toml::Value, location: &str) -> Result<Vec<BuildTargetConfig>> {
    let invalid = |reason: &str| ConfigurationError::Invalid {
        location: location.to_owned(),
        reason: reason.to_owned(),
    };
    if !value.is_table() {
        return Err(invalid("maven_lib_download entry must be a table"));
    }
    let raw: RawMavenLib = value
        .clone()
        .try_into()
        .map_err(|e: toml::de::Error| invalid(e.message()))?;
    let required = |value: Option<String>, field: &'static str| {
        value.ok_or_else(|| ConfigurationError::MissingField {
            location: location.to_owned(),
            field,
        })
    };

    let artifact = required(raw.artifact_id, "artifact_id")?;
    let base = RawTarget {
        extract_to: raw.extract_to,
        repo: Some(required(raw.repo_url, "repo_url")?),
        group: Some(required(raw.group_id, "group_id")?),
        artifact: Some(artifact.clone()),
        version: Some(required(raw.version, "version")?),
        strip: raw.strip,
        enable_if: raw.enable_if,
        ..RawTarget::default()
    };

    let mut expanded = Vec::new();
    if raw.use_headers.unwrap_or(true) {
        expanded.push((
            format!("{artifact}-headers"),
            RawTarget {
                classifier: Some(HEADERS_CLASSIFIER.to_owned()),
                incdir: Some(String::new()),
                ..base.clone()
            },
        ));
    }

    if raw.use_sources {
        if raw.libs.is_some() || raw.staticlibs.is_some() {
            return Err(invalid("libs and staticlibs cannot be combined with use_sources"));
        }
        expanded.push((
            format!("{artifact}-sources"),
            RawTarget {
                classifier: Some(
                    raw.sources_classifier
                        .unwrap_or_else(|| DEFAULT_SOURCES_CLASSIFIER.to_owned()),
                ),
                files: raw.sources.unwrap_or_default(),
                ..base
            },
        ));
    } else {
        if raw.sources.is_some() {
            return Err(invalid("sources requires use_sources = true"));
        }
        let (libs, staticlibs) = match (raw.libs, raw.staticlibs) {
            (None, None) => (vec![artifact.clone()], Vec::new()),
            (libs, staticlibs) => (libs.unwrap_or_default(), staticlibs.unwrap_or_default()),
        };
        if !libs.is_empty() {
            expanded.push((
                format!("{artifact}-libs"),
                RawTarget {
                    classifier: Some(SHARED_CLASSIFIER.to_owned()),
                    libdir: Some(SHARED_LIBDIR.to_owned()),
                    libs,
                    ..base.clone()
                },
            ));
        }
        if !staticlibs.is_empty() {
            expanded.push((
                format!("{artifact}-staticlibs"),
                RawTarget {
                    classifier: Some(STATIC_CLASSIFIER.to_owned()),
                    libdir: Some(STATIC_LIBDIR.to_owned()),
                    staticlibs,
                    ..base
                },
            ));
        }
    }

    expanded
        .into_iter()
        .map(|(name, raw)| target_from_raw(&name, raw, location))
        .collect()
}

fn parse_source(raw: &RawTarget, location: &str) -> Result<ArtifactSource> {
    let invalid = |reason: String| ConfigurationError::Invalid {
        location: location.to_owned(),
        reason,
    };
    match (&raw.url, raw.has_maven_keys()) {
        (Some(_), true) => Err(ConfigurationError::ConflictingSources {
            location: location.to_owned(),
        }),
        (None, false) => Err(ConfigurationError::MissingSource {
            location: location.to_owned(),
        }),
        (Some(url), false) => {
            validate_http_url(url).map_err(|reason| invalid(format!("url {reason}")))?;
            let checksum = raw
                .checksum
                .as_deref()
                .map(Sha256Digest::parse_checksum)
                .transpose()
                .map_err(|e| invalid(format!("checksum: {e}")))?;
            Ok(ArtifactSource::Url(UrlSource {
                url: url.clone(),
                checksum,
            }))
        }
        (None, true) => {
            if raw.checksum.is_some() {
                return Err(invalid("checksum is only supported with url".to_owned()));
            }
            let required = |value: &Option<String>, field: &'static str| {
                value.clone().ok_or_else(|| ConfigurationError::MissingField {
                    location: location.to_owned(),
                    field,
                })
            };
            let repository_url = required(&raw.repo, "repo")?;
            validate_http_url(&repository_url).map_err(|reason| invalid(format!("repo {reason}")))?;
            Ok(ArtifactSource::Maven(MavenSource {
                repository_url,
                group: required(&raw.group, "group")?,
                artifact: required(&raw.artifact, "artifact")?,
                version: required(&raw.version, "version")?,
                classifier: raw.classifier.clone(),
                extension: raw
                    .extension
                    .clone()
                    .unwrap_or_else(|| DEFAULT_EXTENSION.to_owned()),
            }))
        }
    }
}

/// Check that `value` is an `http` or `https` URL.
fn validate_http_url(value: &str) -> std::result::Result<(), String> {
    let parsed = url::Url::parse(value).map_err(|e| format!("\"{value}\" is not a valid URL: {e}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("\"{value}\" uses unsupported scheme {other}")),
    }
}

/// Check that `value` is a relative path that stays inside its base.
fn validate_relative(value: &str) -> std::result::Result<Utf8PathBuf, String> {
    let path = Utf8Path::new(value);
    let mut has_normal = false;
    for component in path.components() {
        match component {
            Utf8Component::Normal(_) => has_normal = true,
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                return Err(format!("\"{value}\" must not contain .."));
            }
            Utf8Component::RootDir | Utf8Component::Prefix(_) => {
                return Err(format!("\"{value}\" must be a relative path"));
            }
        }
    }
    if !has_normal {
        return Err(format!("\"{value}\" must name a directory below the build root"));
    }
    Ok(path.to_owned())
}

fn join_location(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
