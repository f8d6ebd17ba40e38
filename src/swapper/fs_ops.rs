//! Recursive delete and copy used by the swap steps.

use crate::error::{Result, UpdateError};
use std::fs;
use std::io;
use std::path::Path;

/// Remove a file or directory tree at `path`.
///
/// Returns `Ok(false)` when nothing existed there.
///
/// # Errors
///
/// Returns [`UpdateError::Filesystem`] if the path exists but cannot be removed.
pub fn remove_path_if_present(path: &Path) -> Result<bool> {
    let meta = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(UpdateError::fs("inspect", path, e)),
    };

    let removed = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.map_err(|e| UpdateError::fs("remove", path, e))?;
    Ok(true)
}

/// Copy a single file, preserving its permission bits.
///
/// # Errors
///
/// Returns [`UpdateError::Filesystem`] if the copy fails.
pub fn copy_file(src: &Path, dst: &Path) -> Result<u64> {
    fs::copy(src, dst).map_err(|e| {
        UpdateError::Filesystem(format!(
            "cannot copy {} to {}: {e}",
            src.display(),
            dst.display()
        ))
    })
}

/// Recursively copy the directory `src` to `dst`.
///
/// `dst` must not exist yet. Returns the number of files copied.
///
/// # Errors
///
/// Returns [`UpdateError::Filesystem`] on the first entry that cannot be copied.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<usize> {
    fs::create_dir_all(dst).map_err(|e| UpdateError::fs("create directory", dst, e))?;
    let mut copied = 0;

    let entries = fs::read_dir(src).map_err(|e| UpdateError::fs("read directory", src, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| UpdateError::fs("read directory", src, e))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let file_type = entry
            .file_type()
            .map_err(|e| UpdateError::fs("inspect", &from, e))?;

        if file_type.is_dir() {
            copied += copy_dir_recursive(&from, &to)?;
        } else if file_type.is_symlink() {
            copy_symlink(&from, &to)?;
            copied += 1;
        } else {
            copy_file(&from, &to)?;
            copied += 1;
        }
    }

    Ok(copied)
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    let target = fs::read_link(from).map_err(|e| UpdateError::fs("read link", from, e))?;
    std::os::unix::fs::symlink(&target, to).map_err(|e| UpdateError::fs("create link", to, e))
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    // Follow the link and copy what it points at.
    if from.is_dir() {
        copy_dir_recursive(from, to).map(|_| ())
    } else {
        copy_file(from, to).map(|_| ())
    }
}

/// Mark `path` executable on Unix; no-op elsewhere.
///
/// # Errors
///
/// Returns [`UpdateError::Filesystem`] if permissions cannot be changed.
pub fn set_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let meta = fs::metadata(path).map_err(|e| UpdateError::fs("inspect", path, e))?;
        let mut perms = meta.permissions();
        perms.set_mode(perms.mode() | 0o755);
        fs::set_permissions(path, perms)
            .map_err(|e| UpdateError::fs("set executable permission on", path, e))?;
    }
    let _ = path;
    Ok(())
}
