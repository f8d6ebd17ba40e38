//! Post-exit file swapper.
//!
//! Runs as a separate process after the application has exited. It replaces
//! the installed executable and `_internal` tree with the staged copies,
//! deletes the staging directory and relaunches the application.
//!
//! # Protocol
//!
//! ```text
//! Wait ─► OpenLog ─► RemoveOld ─► CopyNew ─► CleanStage ─► Launch
//!            │                       │            │
//!            └──────────► Fatal ◄────┴────────────┘
//! ```
//!
//! Steps run strictly in sequence. Nothing is rolled back: a failure after
//! `RemoveOld` leaves the install half-cleared and the log in the staging
//! directory describes what happened. A failed relaunch is logged and does
//! not change the exit code.

pub mod fs_ops;
pub mod launch;
pub mod log;

use crate::error::{Result, UpdateError};
use crate::layout::{INTERNAL_DIR, InstallLayout};
use launch::Launcher;
use log::UpdateLog;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Swap completed through `CleanStage`.
pub const EXIT_OK: i32 = 0;
/// The install is in an undefined intermediate state; see the update log.
pub const EXIT_FATAL: i32 = 1;
/// The swapper was invoked with the wrong arguments.
pub const EXIT_USAGE: i32 = 2;

/// Default grace interval before touching the install directory.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(2);

/// Steps of the swap protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapState {
    /// Sleeping so the parent can exit and release its file handles.
    Wait,
    /// Creating the update log in the staging directory.
    OpenLog,
    /// Deleting the installed executable and `_internal` tree.
    RemoveOld,
    /// Copying the staged executable and `_internal` tree into place.
    CopyNew,
    /// Deleting the staging directory.
    CleanStage,
    /// Starting the new executable.
    Launch,
    /// An unrecoverable error stopped the swap.
    Fatal,
}

impl std::fmt::Display for SwapState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Wait => "Wait",
            Self::OpenLog => "OpenLog",
            Self::RemoveOld => "RemoveOld",
            Self::CopyNew => "CopyNew",
            Self::CleanStage => "CleanStage",
            Self::Launch => "Launch",
            Self::Fatal => "Fatal",
        };
        f.write_str(name)
    }
}

/// Tunables for a swap run.
#[derive(Debug, Clone)]
pub struct SwapOptions {
    /// Sleep before the first filesystem operation.
    pub grace: Duration,
}

impl Default for SwapOptions {
    fn default() -> Self {
        Self {
            grace: DEFAULT_GRACE,
        }
    }
}

/// Result of a swap run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapOutcome {
    /// Last state entered. [`SwapState::Fatal`] on failure.
    pub state: SwapState,
    /// State in which the failure happened, if any.
    pub failed_in: Option<SwapState>,
    /// Whether the new executable was started.
    pub launched: bool,
}

impl SwapOutcome {
    fn fatal(failed_in: SwapState) -> Self {
        Self {
            state: SwapState::Fatal,
            failed_in: Some(failed_in),
            launched: false,
        }
    }

    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        if self.state == SwapState::Fatal {
            EXIT_FATAL
        } else {
            EXIT_OK
        }
    }

    /// `true` if the install tree was replaced and the stage removed.
    pub fn is_success(&self) -> bool {
        self.exit_code() == EXIT_OK
    }
}

/// Replaces the install tree with the staged tree.
#[derive(Debug, Clone)]
pub struct Swapper {
    layout: InstallLayout,
    install_dir: PathBuf,
    stage_dir: PathBuf,
    options: SwapOptions,
}

impl Swapper {
    /// Create a swapper for one install/stage pair.
    pub fn new(
        layout: InstallLayout,
        install_dir: impl Into<PathBuf>,
        stage_dir: impl Into<PathBuf>,
        options: SwapOptions,
    ) -> Self {
        Self {
            layout,
            install_dir: install_dir.into(),
            stage_dir: stage_dir.into(),
            options,
        }
    }

    /// Install directory being replaced.
    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Staging directory being consumed.
    pub fn stage_dir(&self) -> &Path {
        &self.stage_dir
    }

    /// Run the whole protocol. Never panics and never returns an error:
    /// failures are written to the update log and reflected in the outcome.
    pub fn run(&self, launcher: &dyn Launcher) -> SwapOutcome {
        tracing::info!(
            install = %self.install_dir.display(),
            stage = %self.stage_dir.display(),
            grace_ms = self.options.grace.as_millis() as u64,
            "swapper started"
        );

        // Wait
        if !self.options.grace.is_zero() {
            std::thread::sleep(self.options.grace);
        }

        // OpenLog
        let log_path = self.layout.log_in(&self.stage_dir);
        let mut log = match UpdateLog::create(&log_path) {
            Ok(log) => log,
            Err(e) => {
                tracing::error!(path = %log_path.display(), error = %e, "cannot create update log");
                return SwapOutcome::fatal(SwapState::OpenLog);
            }
        };
        log.info(&format!(
            "entering {}: install={} stage={}",
            SwapState::OpenLog,
            self.install_dir.display(),
            self.stage_dir.display()
        ));

        let step = self
            .remove_old(&mut log)
            .map_err(|e| (SwapState::RemoveOld, e))
            .and_then(|()| {
                self.copy_new(&mut log)
                    .map_err(|e| (SwapState::CopyNew, e))
            });
        if let Err((state, e)) = step {
            log.info(&format!("entering {} after failure in {state}", SwapState::Fatal));
            log.fatal(&e);
            return SwapOutcome::fatal(state);
        }

        // CleanStage. The log lives inside the stage, so close it first.
        log.info(&format!("entering {}", SwapState::CleanStage));
        drop(log);
        if let Err(e) = fs_ops::remove_path_if_present(&self.stage_dir) {
            tracing::error!(error = %e, "cannot remove staging directory");
            if let Ok(mut log) = UpdateLog::append(&log_path) {
                log.fatal(&e);
            }
            return SwapOutcome::fatal(SwapState::CleanStage);
        }
        tracing::info!(stage = %self.stage_dir.display(), "staging directory removed");

        // Launch
        let exe = self.layout.exe_in(&self.install_dir);
        let launched = match launcher.launch(&exe, &self.install_dir) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "relaunch failed; update itself succeeded");
                false
            }
        };

        SwapOutcome {
            state: SwapState::Launch,
            failed_in: None,
            launched,
        }
    }

    fn remove_old(&self, log: &mut UpdateLog) -> Result<()> {
        log.info(&format!("entering {}", SwapState::RemoveOld));

        let internal = self.layout.internal_in(&self.install_dir);
        if fs_ops::remove_path_if_present(&internal)? {
            log.info(&format!("removed {}", internal.display()));
        } else {
            log.warn(&format!("old {INTERNAL_DIR} not present: {}", internal.display()));
        }

        let exe = self.layout.exe_in(&self.install_dir);
        if fs_ops::remove_path_if_present(&exe)? {
            log.info(&format!("removed {}", exe.display()));
        } else {
            log.warn(&format!("old executable not present: {}", exe.display()));
        }

        Ok(())
    }

    fn copy_new(&self, log: &mut UpdateLog) -> Result<()> {
        log.info(&format!("entering {}", SwapState::CopyNew));

        let new_internal = self.layout.internal_in(&self.stage_dir);
        let new_exe = self.layout.exe_in(&self.stage_dir);
        if !new_internal.is_dir() {
            return Err(UpdateError::MissingSource(format!(
                "new {INTERNAL_DIR} folder not found: {}",
                new_internal.display()
            )));
        }
        if !new_exe.is_file() {
            return Err(UpdateError::MissingSource(format!(
                "new executable not found: {}",
                new_exe.display()
            )));
        }

        std::fs::create_dir_all(&self.install_dir)
            .map_err(|e| UpdateError::fs("create directory", &self.install_dir, e))?;

        let internal = self.layout.internal_in(&self.install_dir);
        let files = fs_ops::copy_dir_recursive(&new_internal, &internal)?;
        log.info(&format!("copied {files} files into {}", internal.display()));

        let exe = self.layout.exe_in(&self.install_dir);
        fs_ops::copy_file(&new_exe, &exe)?;
        log.info(&format!("copied {}", exe.display()));

        Ok(())
    }
}

/// Parse the swapper command line (program name already removed).
///
/// # Errors
///
/// Returns [`UpdateError::Usage`] unless there are exactly two absolute paths.
pub fn parse_args<I>(args: I) -> Result<(PathBuf, PathBuf)>
where
    I: IntoIterator<Item = OsString>,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let [install, stage] = args.as_slice() else {
        return Err(UpdateError::Usage(format!(
            "expected 2 arguments <install_dir> <stage_dir>, got {}",
            args.len()
        )));
    };

    let install = PathBuf::from(install);
    let stage = PathBuf::from(stage);
    for path in [&install, &stage] {
        if !path.is_absolute() {
            return Err(UpdateError::Usage(format!(
                "path must be absolute: {}",
                path.display()
            )));
        }
    }

    Ok((install, stage))
}

/// Entry point shared by the swapper binary: parse, swap, return the exit code.
pub fn run_from_args<I>(args: I, layout: InstallLayout, launcher: &dyn Launcher) -> i32
where
    I: IntoIterator<Item = OsString>,
{
    let (install, stage) = match parse_args(args) {
        Ok(paths) => paths,
        Err(e) => {
            tracing::error!(error = %e, "invalid swapper invocation");
            eprintln!("{e}\nusage: handoff-swapper <install_dir> <stage_dir>");
            return EXIT_USAGE;
        }
    };

    let outcome = Swapper::new(layout, install, stage, SwapOptions::default()).run(launcher);
    tracing::info!(
        state = %outcome.state,
        launched = outcome.launched,
        exit_code = outcome.exit_code(),
        "swapper finished"
    );
    outcome.exit_code()
}
