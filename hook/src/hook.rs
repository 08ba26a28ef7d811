//! The build hook.
//!
//! [`DownloadHook`] implements the host's lifecycle points. `initialize`
//! resolves every target up front, then fetches, extracts, and strips each
//! enabled target in turn. `clean` removes the directories the hook writes.
//!
//! Collaborators are injected through [`HookServices`] so tests can
//! substitute the network, archive, and process layers.

use crate::artefact::download::{ArtefactDownloader, HttpDownloader};
use crate::artefact::extraction::{ArtefactExtractor, ZipExtractor};
use crate::build_data::BuildData;
use crate::cache::{CACHE_DIR_ENV, CacheSettings};
use crate::config::HookConfig;
use crate::error::{HookError, Result, TargetFailure, TargetStage};
use crate::fetch::Fetcher;
use crate::output::Progress;
use crate::resolve::{Resolution, ResolvedTarget, output_dirs, resolve_target};
use crate::strip::{CommandRunner, SystemCommandRunner, should_strip, strip_library};
use camino::{Utf8Path, Utf8PathBuf};
use robotpy_fetch_common::Platform;
use std::collections::BTreeSet;
use std::io::Write;

/// Build target for which artefacts are downloaded.
pub const WHEEL_TARGET: &str = "wheel";

/// Default strip program.
pub const DEFAULT_STRIP_EXE: &str = "strip";

/// Lifecycle points the host build tool invokes.
pub trait BuildHook {
    /// Prepare the build tree before packaging.
    ///
    /// `version` is the build variant (e.g. `standard` or `editable`).
    ///
    /// # Errors
    ///
    /// Returns an error if any target cannot be resolved, fetched,
    /// extracted, or stripped. The build must be aborted.
    fn initialize(&mut self, version: &str, build_data: &mut BuildData) -> Result<()>;

    /// Remove files produced by previous builds.
    ///
    /// # Errors
    ///
    /// Returns an error if an output directory cannot be removed.
    fn clean(&mut self, versions: &[String]) -> Result<()>;
}

/// Runtime settings for one hook invocation.
#[derive(Debug, Clone)]
pub struct HookContext {
    /// Project root; `extract_to` paths are relative to it.
    pub root: Utf8PathBuf,
    /// Host build target, e.g. `wheel` or `sdist`.
    pub target_name: String,
    /// Platform the wheel is built for.
    pub platform: &'static Platform,
    /// Download cache location.
    pub cache: CacheSettings,
    /// Program used to strip libraries.
    pub strip_exe: String,
    /// Suppress progress output.
    pub quiet: bool,
}

impl HookContext {
    /// Context for a wheel build of `root` on `platform` with an ephemeral
    /// cache.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>, platform: &'static Platform) -> Self {
        Self {
            root: root.into(),
            target_name: WHEEL_TARGET.to_owned(),
            platform,
            cache: CacheSettings::Ephemeral,
            strip_exe: DEFAULT_STRIP_EXE.to_owned(),
            quiet: false,
        }
    }
}

/// External collaborators used by the hook.
#[derive(Clone, Copy)]
pub struct HookServices<'a> {
    /// Downloads artefacts on cache misses.
    pub downloader: &'a dyn ArtefactDownloader,
    /// Extracts archives into the build tree.
    pub extractor: &'a dyn ArtefactExtractor,
    /// Runs the strip program.
    pub runner: &'a dyn CommandRunner,
}

impl HookServices<'static> {
    /// Production collaborators: HTTP, zip, and real processes.
    #[must_use]
    pub const fn system() -> Self {
        Self {
            downloader: &HttpDownloader,
            extractor: &ZipExtractor,
            runner: &SystemCommandRunner,
        }
    }
}

/// Downloads, caches, and extracts configured artefacts.
pub struct DownloadHook<'a> {
    context: HookContext,
    config: HookConfig,
    services: HookServices<'a>,
    stderr: &'a mut dyn Write,
}

impl<'a> DownloadHook<'a> {
    /// Create a hook for `config`, reporting progress to `stderr`.
    #[must_use]
    pub const fn new(
        context: HookContext,
        config: HookConfig,
        services: HookServices<'a>,
        stderr: &'a mut dyn Write,
    ) -> Self {
        Self {
            context,
            config,
            services,
            stderr,
        }
    }

    /// The runtime settings of this hook.
    #[must_use]
    pub const fn context(&self) -> &HookContext {
        &self.context
    }
}

impl BuildHook for DownloadHook<'_> {
    fn initialize(&mut self, version: &str, build_data: &mut BuildData) -> Result<()> {
        if self.context.target_name != WHEEL_TARGET {
            log::debug!(
                "nothing to download for build target {}",
                self.context.target_name
            );
            return Ok(());
        }

        build_data.pure_python = Some(false);
        let context = &self.context;
        let mut progress = Progress::new(&mut *self.stderr, context.quiet);

        let targets = resolve_all(&self.config, context, &mut progress)?;
        let cache = context.cache.open()?;
        if cache.is_ephemeral() {
            log::info!("{CACHE_DIR_ENV} is not set; downloads will not be reused by later builds");
        }
        let fetcher = Fetcher::new(&cache, self.services.downloader);
        let mut cleared = BTreeSet::new();

        for target in &targets {
            let run = TargetRun {
                context,
                services: &self.services,
                fetcher: &fetcher,
                strip: should_strip(target.strip, version) && context.platform.is_linux(),
            };
            run.process(target, &mut cleared, build_data, &mut progress)?;
        }

        build_data.default_tag(context.platform.tag());
        Ok(())
    }

    fn clean(&mut self, versions: &[String]) -> Result<()> {
        log::debug!("cleaning outputs for versions {versions:?}");
        let mut progress = Progress::new(&mut *self.stderr, self.context.quiet);
        let mut removed = BTreeSet::new();
        for target in &self.config.targets {
            for dir in output_dirs(&self.context.root, target) {
                if removed.insert(dir.clone()) {
                    remove_dir(&dir, &mut progress)?;
                }
            }
        }
        Ok(())
    }
}

/// Resolve every target before anything is downloaded.
fn resolve_all(
    config: &HookConfig,
    context: &HookContext,
    progress: &mut Progress<'_>,
) -> Result<Vec<ResolvedTarget>> {
    let mut resolved = Vec::new();
    for target in &config.targets {
        match resolve_target(&context.root, target, context.platform)
            .map_err(|e| HookError::target(&target.name, TargetStage::Resolve, e))?
        {
            Resolution::Enabled(target) => resolved.push(target),
            Resolution::Disabled { name, marker } => progress.line(format!(
                "{name} skipped because enable_if ({marker}) did not match current environment"
            )),
        }
    }
    Ok(resolved)
}

/// Shared state for processing one target.
struct TargetRun<'r, 'a> {
    context: &'r HookContext,
    services: &'r HookServices<'a>,
    fetcher: &'r Fetcher<'r>,
    strip: bool,
}

impl TargetRun<'_, '_> {
    fn process(
        &self,
        target: &ResolvedTarget,
        cleared: &mut BTreeSet<Utf8PathBuf>,
        build_data: &mut BuildData,
        progress: &mut Progress<'_>,
    ) -> Result<()> {
        let fail = |stage, failure: TargetFailure| HookError::target(&target.name, stage, failure);

        for dir in &target.clear_dirs {
            if cleared.insert(dir.clone()) {
                remove_dir(dir, progress).map_err(|e| match e {
                    HookError::Io(source) => fail(
                        TargetStage::Extract,
                        TargetFailure::Io {
                            path: dir.clone(),
                            source,
                        },
                    ),
                    other => other,
                })?;
            }
        }

        progress.line(format!("Downloading {}", target.source.url));
        let fetched = self
            .fetcher
            .fetch(&target.source)
            .map_err(|e| fail(TargetStage::Fetch, e.into()))?;
        if fetched.from_cache {
            progress.line("-> already present in cache");
        }

        let archive = &fetched.entry.path;
        progress.line(format!(
            "Extracting {}",
            archive.file_name().unwrap_or(archive.as_str())
        ));
        let extracted = self
            .services
            .extractor
            .extract(archive, &target.plan)
            .map_err(|e| fail(TargetStage::Extract, e.into()))?;
        for file in &extracted {
            progress.line(format!("- {} => {}", file.source, file.destination));
            build_data.add_artifact(&self.context.root, &file.destination);
        }

        if self.strip {
            for lib in &target.lib_files {
                progress.line(format!("+ {} {lib}", self.context.strip_exe));
                strip_library(self.services.runner, &self.context.strip_exe, lib)
                    .map_err(|e| fail(TargetStage::Strip, e.into()))?;
            }
        }
        Ok(())
    }
}

/// Remove `dir` and its contents; a missing directory is not an error.
fn remove_dir(dir: &Utf8Path, progress: &mut Progress<'_>) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {
            progress.line(format!("Removing {dir}"));
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(HookError::Io(e)),
    }
}

#[cfg(test)]
#[path = "hook_tests.rs"]
mod tests;
