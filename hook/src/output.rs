//! User-facing progress output.

use std::io::Write;

/// Write a line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Progress reporter that can be silenced.
pub struct Progress<'a> {
    stderr: &'a mut dyn Write,
    quiet: bool,
}

impl<'a> Progress<'a> {
    /// Report to `stderr` unless `quiet` is set.
    #[must_use]
    pub const fn new(stderr: &'a mut dyn Write, quiet: bool) -> Self {
        Self { stderr, quiet }
    }

    /// Write one progress line.
    pub fn line(&mut self, message: impl std::fmt::Display) {
        if !self.quiet {
            write_stderr_line(self.stderr, message);
        }
    }
}
