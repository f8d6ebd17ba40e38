//! Starting a process detached from the current one.

use crate::error::{Result, UpdateError};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

#[cfg(target_os = "windows")]
const DETACHED_PROCESS: u32 = 0x0000_0008;
#[cfg(target_os = "windows")]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

/// Starts the freshly installed executable.
pub trait Launcher {
    /// Launch `exe` with `working_dir` as its current directory.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Launch`] if the process could not be started
    /// or was seen to fail straight away.
    fn launch(&self, exe: &Path, working_dir: &Path) -> Result<()>;
}

/// Configure `cmd` so the child outlives the parent and shares no console.
pub fn detach(cmd: &mut Command) -> &mut Command {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
    }

    cmd
}

/// Spawns the executable detached, then watches it for `probe`.
///
/// An exit with a failure status inside the probe window is reported as a
/// launch error. A child still running at the end of the window is left alone.
#[derive(Debug, Clone)]
pub struct DetachedLauncher {
    probe: Duration,
}

impl DetachedLauncher {
    /// Launcher with the given liveness probe window (zero disables probing).
    pub fn new(probe: Duration) -> Self {
        Self { probe }
    }
}

impl Default for DetachedLauncher {
    fn default() -> Self {
        Self::new(Duration::from_millis(750))
    }
}

impl Launcher for DetachedLauncher {
    fn launch(&self, exe: &Path, working_dir: &Path) -> Result<()> {
        super::fs_ops::set_executable(exe)
            .map_err(|e| UpdateError::Launch(e.to_string()))?;

        let mut cmd = Command::new(exe);
        cmd.current_dir(working_dir);
        detach(&mut cmd);

        let mut child = cmd
            .spawn()
            .map_err(|e| UpdateError::Launch(format!("cannot start {}: {e}", exe.display())))?;
        tracing::info!(pid = child.id(), exe = %exe.display(), "relaunched application");

        if self.probe.is_zero() {
            return Ok(());
        }

        let deadline = Instant::now() + self.probe;
        while Instant::now() < deadline {
            match child.try_wait() {
                Ok(Some(status)) if !status.success() => {
                    return Err(UpdateError::Launch(format!(
                        "{} exited immediately with {status}",
                        exe.display()
                    )));
                }
                Ok(Some(_)) => return Ok(()),
                Ok(None) => std::thread::sleep(Duration::from_millis(50)),
                Err(e) => {
                    tracing::warn!(error = %e, "cannot poll relaunched process");
                    return Ok(());
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn launch_nonexistent_fails() {
        let launcher = DetachedLauncher::new(Duration::ZERO);
        let result = launcher.launch(
            Path::new("/nonexistent/handoff/app.exe"),
            Path::new("/nonexistent/handoff"),
        );
        assert!(matches!(result, Err(UpdateError::Launch(_))));
    }

    #[cfg(unix)]
    #[test]
    fn launch_script_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("app.exe");
        std::fs::write(&exe, "#!/bin/sh\nexit 0\n").unwrap();

        let launcher = DetachedLauncher::new(Duration::from_millis(500));
        launcher.launch(&exe, dir.path()).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn probe_reports_immediate_failure() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("app.exe");
        std::fs::write(&exe, "#!/bin/sh\nexit 3\n").unwrap();

        let launcher = DetachedLauncher::new(Duration::from_secs(5));
        let result = launcher.launch(&exe, dir.path());
        assert!(matches!(result, Err(UpdateError::Launch(msg)) if msg.contains("exited immediately")));
    }
}
