//! robotpy-fetch hook runner entrypoint.
//!
//! The host build tool runs this binary at its `initialize` and `clean`
//! lifecycle stages. Progress goes to stderr; `initialize` writes the
//! updated build data as JSON to stdout.

use camino::Utf8Path;
use clap::Parser;
use robotpy_fetch_hook::build_data::BuildData;
use robotpy_fetch_hook::cli::{Cli, Command};
use robotpy_fetch_hook::config::HookConfig;
use robotpy_fetch_hook::error::{HookError, Result};
use robotpy_fetch_hook::hook::{BuildHook, DownloadHook, HookServices};
use robotpy_fetch_hook::output::write_stderr_line;
use std::error::Error as _;
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<()> {
    let context = cli.context()?;
    let config = HookConfig::load(&cli.config_path(), &cli.table)?;
    log::debug!(
        "loaded {} target(s) for platform {}",
        config.targets.len(),
        context.platform.name()
    );

    match &cli.command {
        Command::Initialize {
            version,
            build_data,
        } => {
            let mut data = read_build_data(build_data.as_deref())?;
            DownloadHook::new(context, config, HookServices::system(), stderr)
                .initialize(version, &mut data)?;
            write_build_data(&data, stdout)
        }
        Command::Clean { versions } => {
            DownloadHook::new(context, config, HookServices::system(), stderr).clean(versions)
        }
    }
}

/// Reads the host's build data, or starts from empty data.
fn read_build_data(path: Option<&Utf8Path>) -> Result<BuildData> {
    let Some(path) = path else {
        return Ok(BuildData::default());
    };
    let json = std::fs::read_to_string(path).map_err(|e| HookError::BuildData {
        reason: format!("cannot read {path}: {e}"),
    })?;
    BuildData::from_json(&json).map_err(|e| HookError::BuildData {
        reason: format!("{path}: {e}"),
    })
}

fn write_build_data(data: &BuildData, stdout: &mut dyn Write) -> Result<()> {
    let json = data.to_json().map_err(|e| HookError::BuildData {
        reason: e.to_string(),
    })?;
    writeln!(stdout, "{json}")?;
    Ok(())
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            let mut source = err.source();
            while let Some(cause) = source {
                write_stderr_line(stderr, format!("  caused by: {cause}"));
                source = cause.source();
            }
            1
        }
    }
}
