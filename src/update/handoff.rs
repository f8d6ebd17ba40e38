//! Process hand-off to the swapper.
//!
//! After [`spawn_swapper`] returns, the swapper owns both the install and
//! the staging directory. The calling process must exit promptly so its
//! executable and open files are released before the grace interval ends.

use crate::error::{Result, UpdateError};
use crate::swapper::launch::detach;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Process-wide shutdown collaborator invoked right after the swapper starts.
pub trait ShutdownHook: Send + Sync {
    /// Tear the application down. Implementations normally do not return.
    fn shutdown(&self);
}

/// Exits the process immediately with a success code.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExitProcess;

impl ShutdownHook for ExitProcess {
    fn shutdown(&self) {
        tracing::info!("exiting for update");
        std::process::exit(0);
    }
}

/// Copy the swapper executable out of the install tree into the staging
/// root so the running helper never sits inside the tree it replaces.
///
/// # Errors
///
/// Returns [`UpdateError::MissingSource`] if `swapper_src` does not exist,
/// or [`UpdateError::Storage`] if the copy fails.
pub fn prepare_swapper(swapper_src: &Path, staging_root: &Path, app_name: &str) -> Result<PathBuf> {
    if !swapper_src.is_file() {
        return Err(UpdateError::MissingSource(format!(
            "swapper executable not found: {}",
            swapper_src.display()
        )));
    }

    let suffix: u32 = rand::random();
    let dir = staging_root.join(format!("{app_name}-swapper-{suffix:08x}"));
    std::fs::create_dir_all(&dir).map_err(|e| UpdateError::storage("create", &dir, e))?;

    let file_name = swapper_src
        .file_name()
        .ok_or_else(|| UpdateError::MissingSource(format!("{} has no file name", swapper_src.display())))?;
    let dest = dir.join(file_name);
    std::fs::copy(swapper_src, &dest).map_err(|e| UpdateError::storage("copy swapper to", &dest, e))?;
    crate::swapper::fs_ops::set_executable(&dest)?;

    tracing::debug!(swapper = %dest.display(), "swapper prepared");
    Ok(dest)
}

/// Start the swapper detached with exactly `<install_dir> <stage_dir>`.
/// Relative paths are made absolute first. Returns the child's pid.
///
/// # Errors
///
/// Returns [`UpdateError::Launch`] if the process cannot be started.
pub fn spawn_swapper(swapper: &Path, install_dir: &Path, stage_dir: &Path) -> Result<u32> {
    let install = std::path::absolute(install_dir)
        .map_err(|e| UpdateError::fs("resolve", install_dir, e))?;
    let stage =
        std::path::absolute(stage_dir).map_err(|e| UpdateError::fs("resolve", stage_dir, e))?;

    let mut cmd = Command::new(swapper);
    cmd.arg(&install).arg(&stage);
    if let Some(parent) = swapper.parent() {
        cmd.current_dir(parent);
    }
    detach(&mut cmd);

    let child = cmd.spawn().map_err(|e| {
        UpdateError::Launch(format!("cannot start swapper {}: {e}", swapper.display()))
    })?;

    tracing::info!(
        pid = child.id(),
        install = %install.display(),
        stage = %stage.display(),
        "swapper spawned"
    );
    Ok(child.id())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn prepare_swapper_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let result = prepare_swapper(&dir.path().join("absent"), dir.path(), "app");
        assert!(matches!(result, Err(UpdateError::MissingSource(_))));
    }

    #[test]
    fn prepare_swapper_copies_into_staging_root() {
        let dir = tempfile::tempdir().unwrap();
        let install = dir.path().join("inst");
        std::fs::create_dir(&install).unwrap();
        let src = install.join("handoff-swapper");
        std::fs::write(&src, "#!/bin/sh\n").unwrap();
        let root = dir.path().join("staging");

        let copied = prepare_swapper(&src, &root, "app").unwrap();
        assert!(copied.starts_with(&root));
        assert!(!copied.starts_with(&install));
        assert_eq!(copied.file_name().unwrap(), "handoff-swapper");
        assert!(copied.is_file());
    }

    #[test]
    fn spawn_missing_swapper_is_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = spawn_swapper(
            &dir.path().join("no-swapper"),
            &dir.path().join("inst"),
            &dir.path().join("stage"),
        );
        assert!(matches!(result, Err(UpdateError::Launch(_))));
    }

    #[cfg(unix)]
    #[test]
    fn spawn_passes_exactly_two_absolute_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("args.txt");
        let script = dir.path().join("fake-swapper");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\necho \"$#\" > '{out}'\nfor a in \"$@\"; do echo \"$a\" >> '{out}'; done\n",
                out = out.display()
            ),
        )
        .unwrap();
        crate::swapper::fs_ops::set_executable(&script).unwrap();

        spawn_swapper(&script, &dir.path().join("inst"), &dir.path().join("stage")).unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        let mut text = String::new();
        while std::time::Instant::now() < deadline {
            text = std::fs::read_to_string(&out).unwrap_or_default();
            if text.lines().count() >= 3 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(50));
        }
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3, "got: {text:?}");
        assert_eq!(lines[0], "2");
        assert_eq!(lines[1], dir.path().join("inst").to_string_lossy());
        assert_eq!(lines[2], dir.path().join("stage").to_string_lossy());
    }
}
