//! In-app update orchestration.
//!
//! Drives one update attempt: discover a release, build a staging directory
//! with monotonic progress reporting, then hand the install over to the
//! swapper process. Nothing under the install directory is modified here.

use super::cancel::CancelFlag;
use super::checker::UpdateChecker;
use super::handoff::{self, ShutdownHook};
use super::progress::ProgressTracker;
use super::release::Release;
use super::stage::{ArchiveStageBuilder, StageBuilder};
use super::state::{AutoUpdatePreference, UpdateState};
use crate::config::UpdaterConfig;
use crate::error::{Result, UpdateError};
use crate::layout::{DEFAULT_EXE_NAME, InstallLayout};
use crate::swapper::fs_ops;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A validated staging directory ready for the swapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedUpdate {
    /// Version that was staged.
    pub version: String,
    /// Absolute path of the staging directory.
    pub stage_dir: PathBuf,
}

/// Update orchestrator facade.
pub struct Orchestrator {
    config: UpdaterConfig,
    layout: InstallLayout,
    builder: Arc<dyn StageBuilder>,
    staging_root: PathBuf,
    state_path: PathBuf,
}

impl Orchestrator {
    /// Orchestrator using HTTP download and zip extraction.
    pub fn new(config: UpdaterConfig) -> Self {
        let builder = Arc::new(ArchiveStageBuilder::http(&config.feed));
        Self::with_builder(config, builder)
    }

    /// Orchestrator with a custom stage builder.
    pub fn with_builder(config: UpdaterConfig, builder: Arc<dyn StageBuilder>) -> Self {
        let layout = InstallLayout::default();
        let staging_root = config.staging.root_or_default();
        Self {
            config,
            layout,
            builder,
            staging_root,
            state_path: UpdateState::state_file_path(),
        }
    }

    /// Override where update state is persisted.
    #[must_use]
    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = path.into();
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// Install layout shared with the swapper.
    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    /// Root under which staging directories are created.
    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    /// Path of the persisted update state.
    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Query the release feed for a newer version.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Network`] if the feed cannot be reached or
    /// parsed. This is never fatal to the application.
    pub fn check_for_updates(&self) -> Result<Option<Release>> {
        let mut state = UpdateState::load_from(&self.state_path);
        let checker = UpdateChecker::new(&self.config.feed, self.config.app.version.clone());
        let result = checker.check_for_updates(&mut state);

        if let Err(e) = state.save_to(&self.state_path) {
            tracing::warn!(error = %e, "cannot persist update state");
        }
        result
    }

    /// `true` when the last feed query is at least `[check] interval_hours` old.
    pub fn check_is_due(&self) -> bool {
        UpdateState::load_from(&self.state_path).check_is_stale(self.config.check.interval_hours)
    }

    /// [`Orchestrator::check_for_updates`], honouring the configured cadence.
    ///
    /// Without `force`, returns `Ok(None)` without touching the network when
    /// `auto_update` is `never` or the last check is more recent than
    /// `interval_hours`.
    ///
    /// # Errors
    ///
    /// As [`Orchestrator::check_for_updates`].
    pub fn check_if_due(&self, force: bool) -> Result<Option<Release>> {
        if !force {
            if self.config.check.auto_update == AutoUpdatePreference::Never {
                tracing::debug!("automatic update checks are disabled");
                return Ok(None);
            }
            if !self.check_is_due() {
                tracing::debug!(
                    interval_hours = self.config.check.interval_hours,
                    "skipping update check, last check is recent"
                );
                return Ok(None);
            }
        }
        self.check_for_updates()
    }

    /// Remove staging leftovers from earlier aborted attempts.
    ///
    /// Only entries named `<app>-*` directly under the staging root are
    /// touched. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Storage`] if the staging root cannot be listed.
    pub fn cleanup_stale_stages(&self) -> Result<usize> {
        let entries = match std::fs::read_dir(&self.staging_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(UpdateError::storage("read", &self.staging_root, e)),
        };

        let prefix = format!("{}-", self.config.app.name);
        let mut removed = 0;
        for entry in entries.filter_map(std::result::Result::ok) {
            if !entry.file_name().to_string_lossy().starts_with(&prefix) {
                continue;
            }
            let path = entry.path();
            match fs_ops::remove_path_if_present(&path) {
                Ok(true) => {
                    tracing::info!(path = %path.display(), "removed stale staging entry");
                    removed += 1;
                }
                Ok(false) => {}
                Err(e) => tracing::warn!(error = %e, "cannot remove stale staging entry"),
            }
        }
        Ok(removed)
    }

    /// Acquire and extract `release` into a fresh staging directory.
    ///
    /// `on_progress` receives non-decreasing percentages, starting with `0`
    /// and ending with exactly one `100` on success. `install_dir` is only
    /// inspected, never modified.
    ///
    /// # Errors
    ///
    /// Storage, network or integrity errors. On error the staging directory
    /// is removed and `100` is never reported.
    pub fn download_and_install(
        &self,
        release: &Release,
        install_dir: &Path,
        on_progress: &mut dyn FnMut(u8),
    ) -> Result<StagedUpdate> {
        self.download_and_install_with_cancel(release, install_dir, on_progress, &CancelFlag::new())
    }

    /// [`Orchestrator::download_and_install`] reduced to a success flag.
    pub fn download_and_install_ok(
        &self,
        release: &Release,
        install_dir: &Path,
        on_progress: &mut dyn FnMut(u8),
    ) -> bool {
        match self.download_and_install(release, install_dir, on_progress) {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(error = %e, version = %release.version, "failed to install update");
                false
            }
        }
    }

    /// [`Orchestrator::download_and_install`] with a cancellation flag,
    /// checked at every progress step.
    ///
    /// # Errors
    ///
    /// As [`Orchestrator::download_and_install`], plus
    /// [`UpdateError::Cancelled`].
    pub fn download_and_install_with_cancel(
        &self,
        release: &Release,
        install_dir: &Path,
        on_progress: &mut dyn FnMut(u8),
        cancel: &CancelFlag,
    ) -> Result<StagedUpdate> {
        let mut tracker = ProgressTracker::new(on_progress);
        tracker.start();
        cancel.check()?;

        let stage_dir = self.create_stage_dir(release, install_dir)?;
        tracing::info!(
            version = %release.version,
            stage = %stage_dir.display(),
            "staging update"
        );

        let built = self
            .builder
            .build_stage(release, &stage_dir, &mut |value| {
                cancel.check()?;
                tracker.report(value);
                Ok(())
            })
            .and_then(|()| cancel.check())
            .and_then(|()| self.validate_stage(&stage_dir));

        if let Err(e) = built {
            tracing::warn!(error = %e, stage = %stage_dir.display(), "staging failed");
            if let Err(cleanup) = fs_ops::remove_path_if_present(&stage_dir) {
                tracing::warn!(error = %cleanup, "cannot remove failed stage");
            }
            return Err(e);
        }

        tracker.finish();
        Ok(StagedUpdate {
            version: release.version.clone(),
            stage_dir,
        })
    }

    /// Spawn the swapper for `stage_dir` and shut this process down.
    ///
    /// All file handles under `install_dir` must be closed before calling.
    /// Only returns if `shutdown` returns (e.g. a GUI that quits its event
    /// loop instead of exiting).
    ///
    /// `exe_name` must be [`DEFAULT_EXE_NAME`], the only name the swapper
    /// knows how to install and relaunch.
    ///
    /// # Errors
    ///
    /// Returns an error, leaving the install untouched, if `exe_name` is not
    /// the pinned name, the stage is incomplete or the swapper cannot be
    /// started.
    pub fn start_swap_and_exit(
        &self,
        install_dir: &Path,
        stage_dir: &Path,
        exe_name: &str,
        shutdown: &dyn ShutdownHook,
    ) -> Result<()> {
        if exe_name != DEFAULT_EXE_NAME {
            return Err(UpdateError::Config(format!(
                "executable name {exe_name:?} is not supported, the swapper installs {DEFAULT_EXE_NAME:?}"
            )));
        }
        let check = self.layout.validate_stage(stage_dir);
        if !check.is_complete() {
            return Err(UpdateError::MissingSource(format!(
                "stage {} lacks {}",
                stage_dir.display(),
                check.missing(&self.layout).join(", ")
            )));
        }

        let exe_dir = crate::config::current_exe_dir()?;
        let swapper_src = self.config.swap.resolve_swapper(&exe_dir);
        let swapper = handoff::prepare_swapper(&swapper_src, &self.staging_root, &self.config.app.name)?;
        let pid = handoff::spawn_swapper(&swapper, install_dir, stage_dir)?;

        let mut state = UpdateState::load_from(&self.state_path);
        state.last_handoff_stage = Some(stage_dir.to_path_buf());
        if let Err(e) = state.save_to(&self.state_path) {
            tracing::warn!(error = %e, "cannot persist update state");
        }

        tracing::info!(pid, "swapper started, shutting down");
        shutdown.shutdown();
        Ok(())
    }

    fn create_stage_dir(&self, release: &Release, install_dir: &Path) -> Result<PathBuf> {
        let root = std::path::absolute(&self.staging_root)
            .map_err(|e| UpdateError::storage("resolve", &self.staging_root, e))?;
        if let Ok(install) = std::path::absolute(install_dir)
            && root.starts_with(&install)
        {
            return Err(UpdateError::Storage(format!(
                "staging root {} must not be inside the install directory {}",
                root.display(),
                install.display()
            )));
        }

        std::fs::create_dir_all(&root)
            .map_err(|e| UpdateError::storage("create staging root", &root, e))?;
        let suffix: u32 = rand::random();
        let stage = root.join(format!(
            "{}-{}-{suffix:08x}",
            self.config.app.name,
            sanitize(&release.version)
        ));
        std::fs::create_dir(&stage).map_err(|e| UpdateError::storage("create stage", &stage, e))?;
        Ok(stage)
    }

    fn validate_stage(&self, stage_dir: &Path) -> Result<()> {
        let check = self.layout.validate_stage(stage_dir);
        if check.is_complete() {
            Ok(())
        } else {
            Err(UpdateError::Integrity(format!(
                "release does not contain {}",
                check.missing(&self.layout).join(", ")
            )))
        }
    }
}

/// Keep version strings safe for use in a directory name.
fn sanitize(version: &str) -> String {
    version
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
