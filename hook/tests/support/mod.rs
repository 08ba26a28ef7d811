//! Test support utilities for hook behavioural tests.

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;

/// A scratch directory removed when dropped.
pub struct Scratch {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Scratch {
    /// Creates an empty scratch directory.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create scratch dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .expect("scratch dir should be UTF-8");
        Self { _dir: dir, root }
    }

    /// Root of the scratch directory.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Path of `relative` inside the scratch directory.
    pub fn path(&self, relative: &str) -> Utf8PathBuf {
        self.root.join(relative)
    }

    /// Writes `contents` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, contents: &str) -> Utf8PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        std::fs::write(&path, contents).expect("write scratch file");
        path
    }
}
