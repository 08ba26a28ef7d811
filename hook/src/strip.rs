//! Debug symbol stripping for extracted Linux libraries.

use camino::Utf8Path;
use std::process::{Command, Output};

/// Abstraction for running external commands.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner {
    /// Run `program` with `args` and capture its output.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the program cannot be started.
    fn run(&self, program: &str, args: &[String]) -> std::io::Result<Output>;
}

/// Runs commands with [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[String]) -> std::io::Result<Output> {
        Command::new(program).args(args).output()
    }
}

/// Errors arising from stripping a library.
#[derive(Debug, thiserror::Error)]
pub enum StripError {
    /// The strip program could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// The strip program.
        program: String,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The strip program exited unsuccessfully.
    #[error("{program} failed on {path}: {reason}")]
    Failed {
        /// The strip program.
        program: String,
        /// The library being stripped.
        path: String,
        /// Captured stderr, or the exit status.
        reason: String,
    },
}

/// Whether libraries of a build should be stripped.
///
/// An explicit target setting wins; otherwise everything except editable
/// builds is stripped.
#[must_use]
pub fn should_strip(explicit: Option<bool>, version: &str) -> bool {
    explicit.unwrap_or(version != "editable")
}

/// Strip debug symbols from `path` using `strip_exe`.
///
/// # Errors
///
/// Returns [`StripError`] if the program cannot be run or fails.
pub fn strip_library(
    runner: &dyn CommandRunner,
    strip_exe: &str,
    path: &Utf8Path,
) -> Result<(), StripError> {
    let output = runner
        .run(strip_exe, &[path.to_string()])
        .map_err(|source| StripError::Spawn {
            program: strip_exe.to_owned(),
            source,
        })?;
    if output.status.success() {
        log::trace!("stripped {path}");
        return Ok(());
    }
    Err(StripError::Failed {
        program: strip_exe.to_owned(),
        path: path.to_string(),
        reason: stderr_message(&output),
    })
}

fn stderr_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        output.status.to_string()
    } else {
        trimmed.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{exit_status, output_with_status};
    use mockall::predicate::{always, eq};
    use rstest::rstest;

    #[rstest]
    #[case::default_standard(None, "standard", true)]
    #[case::default_editable(None, "editable", false)]
    #[case::explicit_off(Some(false), "standard", false)]
    #[case::explicit_on(Some(true), "editable", true)]
    fn strip_default_depends_on_build(
        #[case] explicit: Option<bool>,
        #[case] version: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(should_strip(explicit, version), expected);
    }

    #[test]
    fn successful_strip_passes_library_path() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .with(eq("arm-frc2024-linux-gnueabi-strip"), always())
            .times(1)
            .returning(|_, args| {
                assert_eq!(args, ["/build/lib/libx.so".to_owned()]);
                Ok(output_with_status(exit_status(0), ""))
            });

        let result = strip_library(
            &runner,
            "arm-frc2024-linux-gnueabi-strip",
            Utf8Path::new("/build/lib/libx.so"),
        );
        assert!(result.is_ok());
    }

    #[rstest]
    #[case::stderr("strip: file format not recognized", "file format not recognized")]
    #[case::silent("", "exit")]
    fn failing_strip_reports_reason(#[case] stderr: &'static str, #[case] needle: &str) {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(move |_, _| Ok(output_with_status(exit_status(1), stderr)));

        let err = strip_library(&runner, "strip", Utf8Path::new("libx.so"))
            .expect_err("strip should fail");
        match err {
            StripError::Failed { reason, .. } => assert!(reason.contains(needle), "reason: {reason}"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn missing_strip_program_is_a_spawn_error() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_, _| {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "not found"))
        });

        let err = strip_library(&runner, "strip", Utf8Path::new("libx.so"))
            .expect_err("spawn should fail");
        assert!(matches!(err, StripError::Spawn { .. }));
    }
}
