//! Build data exchanged with the host build tool.
//!
//! The host hands the hook a JSON object describing the wheel being built.
//! The hook appends the files it extracted, marks the wheel as
//! platform-specific, and sets the wheel tag when the host has not.
//! Keys the hook does not know are passed through unchanged.

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

/// The host's per-build record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildData {
    /// Files to include in the wheel, relative POSIX paths.
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Whether the wheel contains only Python code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pure_python: Option<bool>,
    /// Wheel tag, e.g. `py3-none-linux_x86_64`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Host keys not interpreted by the hook.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl BuildData {
    /// Parse build data from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a valid build data object.
    ///
    /// # Examples
    ///
    /// ```
    /// use robotpy_fetch_hook::build_data::BuildData;
    ///
    /// let data = BuildData::from_json(r#"{"artifacts": [], "force_include": {}}"#)?;
    /// assert!(data.extra.contains_key("force_include"));
    /// # Ok::<(), serde_json::Error>(())
    /// ```
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Serialise build data as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if a passthrough value cannot be serialised.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Record `path`, given relative to `root`, as a wheel artifact.
    ///
    /// Paths outside `root` are recorded as given.
    pub fn add_artifact(&mut self, root: &Utf8Path, path: &Utf8Path) {
        let relative = path.strip_prefix(root).unwrap_or(path);
        let posix = relative
            .components()
            .map(|component| component.as_str())
            .collect::<Vec<_>>()
            .join("/");
        self.artifacts.push(posix);
    }

    /// Set the wheel tag to `py3-none-<platform_tag>` unless already set.
    pub fn default_tag(&mut self, platform_tag: &str) {
        if self.tag.is_none() {
            self.tag = Some(format!("py3-none-{platform_tag}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_keys_round_trip() {
        let json = r#"{"artifacts":["a"],"force_include":{"x":"y"},"tag":"py3-none-any"}"#;
        let data = BuildData::from_json(json).expect("parse");
        let reparsed: serde_json::Value =
            serde_json::from_str(&data.to_json().expect("serialise")).expect("valid JSON");

        assert_eq!(reparsed["force_include"]["x"], "y");
        assert_eq!(reparsed["tag"], "py3-none-any");
        assert_eq!(reparsed["artifacts"][0], "a");
    }

    #[test]
    fn empty_object_is_accepted() {
        let data = BuildData::from_json("{}").expect("parse");
        assert_eq!(data, BuildData::default());
    }

    #[test]
    fn artifacts_are_relative_posix_paths() {
        let mut data = BuildData::default();
        data.add_artifact(
            Utf8Path::new("/build"),
            Utf8Path::new("/build/native/wpiutil/include/wpi/util.h"),
        );
        assert_eq!(data.artifacts, vec!["native/wpiutil/include/wpi/util.h"]);
    }

    #[test]
    fn default_tag_keeps_host_value() {
        let mut data = BuildData {
            tag: Some("py3-none-any".to_owned()),
            ..BuildData::default()
        };
        data.default_tag("linux_x86_64");
        assert_eq!(data.tag.as_deref(), Some("py3-none-any"));

        let mut fresh = BuildData::default();
        fresh.default_tag("linux_x86_64");
        assert_eq!(fresh.tag.as_deref(), Some("py3-none-linux_x86_64"));
    }
}
