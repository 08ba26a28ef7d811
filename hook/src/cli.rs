//! CLI argument definitions for the hook runner.
//!
//! The host build tool invokes the runner once per lifecycle stage. This
//! module only describes the arguments; `main.rs` turns them into a
//! [`HookContext`] and drives the hook.

use crate::cache::CacheSettings;
use crate::error::Result;
use crate::hook::{DEFAULT_STRIP_EXE, HookContext, WHEEL_TARGET};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use robotpy_fetch_common::Platform;

/// Default project file holding the hook configuration.
pub const DEFAULT_CONFIG_FILE: &str = "pyproject.toml";

/// Download, cache, and extract native artefacts for a wheel build.
#[derive(Parser, Debug)]
#[command(name = "robotpy-fetch-hook")]
#[command(version, about)]
#[command(after_help = concat!(
    "ENVIRONMENT:\n",
    "  HATCH_ROBOTPY_CACHE   Persistent download cache directory. When unset,\n",
    "                        downloads go to a temporary directory removed\n",
    "                        after the build.\n\n",
    "EXAMPLES:\n",
    "  Prepare a wheel build, updating existing build data:\n",
    "    $ robotpy-fetch-hook initialize --build-data build.json > build.json.new\n\n",
    "  Remove extracted files:\n",
    "    $ robotpy-fetch-hook clean",
))]
pub struct Cli {
    /// Lifecycle stage to run.
    #[command(subcommand)]
    pub command: Command,

    /// Project root; `extract_to` paths are relative to it.
    #[arg(long, value_name = "DIR", default_value = ".", global = true)]
    pub root: Utf8PathBuf,

    /// Configuration file [default: <root>/pyproject.toml].
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Dotted path of the hook table inside the configuration file.
    #[arg(
        long,
        value_name = "TABLE",
        default_value = crate::config::DEFAULT_TABLE,
        global = true
    )]
    pub table: String,

    /// Build for this platform instead of the host [e.g. linux-roborio].
    #[arg(long, value_name = "NAME", global = true)]
    pub platform: Option<String>,

    /// Host build target; only `wheel` downloads anything.
    #[arg(long, value_name = "NAME", default_value = WHEEL_TARGET, global = true)]
    pub target_name: String,

    /// Program used to strip debug symbols from Linux libraries.
    #[arg(long, value_name = "PROGRAM", default_value = DEFAULT_STRIP_EXE, global = true)]
    pub strip_exe: String,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Lifecycle stages.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Fetch and extract every target, then print the build data as JSON.
    Initialize {
        /// Build variant, e.g. `standard` or `editable`.
        #[arg(long, default_value = "standard")]
        version: String,

        /// Existing build data (JSON) to update.
        #[arg(long, value_name = "FILE")]
        build_data: Option<Utf8PathBuf>,
    },

    /// Remove directories written by previous builds.
    Clean {
        /// Build variants being cleaned.
        #[arg(long = "version", value_name = "VERSION")]
        versions: Vec<String>,
    },
}

impl Cli {
    /// Configuration file to read.
    #[must_use]
    pub fn config_path(&self) -> Utf8PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| self.root.join(DEFAULT_CONFIG_FILE))
    }

    /// The platform selected by `--platform`, or the host platform.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is unknown or the host is unsupported.
    pub fn platform(&self) -> Result<&'static Platform> {
        let platform = match self.platform.as_deref() {
            Some(name) => Platform::by_name(name)?,
            None => Platform::current()?,
        };
        Ok(platform)
    }

    /// Build the runtime settings for this invocation.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform cannot be determined or the cache
    /// variable is not valid UTF-8.
    pub fn context(&self) -> Result<HookContext> {
        let mut context = HookContext::new(self.root.clone(), self.platform()?);
        context.target_name.clone_from(&self.target_name);
        context.cache = CacheSettings::from_env()?;
        context.strip_exe.clone_from(&self.strip_exe);
        context.quiet = self.quiet;
        Ok(context)
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
