//! Maven repository layout.
//!
//! Maps a group/artifact/version coordinate to the standard repository path
//! `group/with/slashes/artifact/version/artifact-version[-classifier].extension`.

use std::fmt;

/// Errors arising from malformed coordinate components.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordinateError {
    /// A component is empty.
    #[error("maven {field} must not be empty")]
    Empty {
        /// The coordinate field that was empty.
        field: &'static str,
    },

    /// A component contains a character that cannot appear in a repository path.
    #[error("maven {field} \"{value}\" contains invalid character '{character}'")]
    InvalidCharacter {
        /// The coordinate field that was rejected.
        field: &'static str,
        /// The rejected value.
        value: String,
        /// The first offending character.
        character: char,
    },
}

/// A validated Maven coordinate.
///
/// # Examples
///
/// ```
/// use robotpy_fetch_hook::maven::MavenCoordinate;
///
/// let coordinate = MavenCoordinate::new("edu.wpi.first", "wpiutil", "2024.1.1", None, "zip")?;
/// assert_eq!(
///     coordinate.path(),
///     "edu/wpi/first/wpiutil/2024.1.1/wpiutil-2024.1.1.zip"
/// );
/// # Ok::<(), robotpy_fetch_hook::maven::CoordinateError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MavenCoordinate {
    group: String,
    artifact: String,
    version: String,
    classifier: Option<String>,
    extension: String,
}

impl MavenCoordinate {
    /// Validate and build a coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateError`] when a component is empty or contains a
    /// character outside `[A-Za-z0-9._-]`.
    pub fn new(
        group: &str,
        artifact: &str,
        version: &str,
        classifier: Option<&str>,
        extension: &str,
    ) -> Result<Self, CoordinateError> {
        validate_component("group", group)?;
        validate_component("artifact", artifact)?;
        validate_component("version", version)?;
        if let Some(classifier) = classifier {
            validate_component("classifier", classifier)?;
        }
        validate_component("extension", extension)?;
        Ok(Self {
            group: group.to_owned(),
            artifact: artifact.to_owned(),
            version: version.to_owned(),
            classifier: classifier.map(str::to_owned),
            extension: extension.to_owned(),
        })
    }

    /// The artefact file name, e.g. `wpiutil-2024.1.1-headers.zip`.
    #[must_use]
    pub fn file_name(&self) -> String {
        match &self.classifier {
            Some(classifier) => format!(
                "{}-{}-{classifier}.{}",
                self.artifact, self.version, self.extension
            ),
            None => format!("{}-{}.{}", self.artifact, self.version, self.extension),
        }
    }

    /// The repository-relative path of the artefact.
    #[must_use]
    pub fn path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.group.replace('.', "/"),
            self.artifact,
            self.version,
            self.file_name()
        )
    }

    /// The full URL of the artefact below `repository_url`.
    ///
    /// A trailing slash on the repository URL is ignored.
    #[must_use]
    pub fn url(&self, repository_url: &str) -> String {
        format!("{}/{}", repository_url.trim_end_matches('/'), self.path())
    }
}

impl fmt::Display for MavenCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        write!(f, "@{}", self.extension)
    }
}

fn validate_component(field: &'static str, value: &str) -> Result<(), CoordinateError> {
    if value.is_empty() {
        return Err(CoordinateError::Empty { field });
    }
    if let Some(character) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(CoordinateError::InvalidCharacter {
            field,
            value: value.to_owned(),
            character,
        });
    }
    Ok(())
}
