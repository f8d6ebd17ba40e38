//! Archive extraction into a staging directory.

use crate::error::{Result, UpdateError};
use std::fs;
use std::path::Path;

/// Entry-level progress callback: `(entries_done, entries_total)`. Returning
/// an error aborts extraction.
pub type EntryProgress<'a> = &'a mut dyn FnMut(usize, usize) -> Result<()>;

/// Unpacks a release archive.
pub trait Extractor: Send + Sync {
    /// Extract `archive` into the existing directory `dest`. Returns the
    /// number of files written.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Integrity`] for corrupt or unsafe archives and
    /// [`UpdateError::Storage`] if files cannot be written.
    fn extract(&self, archive: &Path, dest: &Path, on_entry: EntryProgress<'_>) -> Result<usize>;
}

/// Extracts `.zip` archives with the `zip` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipExtractor;

impl Extractor for ZipExtractor {
    fn extract(&self, archive: &Path, dest: &Path, on_entry: EntryProgress<'_>) -> Result<usize> {
        let file = fs::File::open(archive).map_err(|e| UpdateError::storage("open", archive, e))?;
        let mut zip = zip::ZipArchive::new(file)
            .map_err(|e| UpdateError::Integrity(format!("invalid archive: {e}")))?;

        let total = zip.len();
        let mut written = 0;
        on_entry(0, total)?;

        for i in 0..total {
            let mut entry = zip
                .by_index(i)
                .map_err(|e| UpdateError::Integrity(format!("corrupt archive entry {i}: {e}")))?;
            let Some(relative) = entry.enclosed_name() else {
                return Err(UpdateError::Integrity(format!(
                    "archive entry escapes destination: {}",
                    entry.name()
                )));
            };
            let out = dest.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&out)
                    .map_err(|e| UpdateError::storage("create directory", &out, e))?;
            } else {
                if let Some(parent) = out.parent() {
                    fs::create_dir_all(parent)
                        .map_err(|e| UpdateError::storage("create directory", parent, e))?;
                }
                let mut target =
                    fs::File::create(&out).map_err(|e| UpdateError::storage("create", &out, e))?;
                std::io::copy(&mut entry, &mut target)
                    .map_err(|e| UpdateError::Integrity(format!("cannot extract {}: {e}", out.display())))?;
                written += 1;

                #[cfg(unix)]
                if let Some(mode) = entry.unix_mode() {
                    use std::os::unix::fs::PermissionsExt;
                    fs::set_permissions(&out, fs::Permissions::from_mode(mode & 0o7777))
                        .map_err(|e| UpdateError::storage("set permissions on", &out, e))?;
                }
            }

            on_entry(i + 1, total)?;
        }

        tracing::info!(files = written, dest = %dest.display(), "archive extracted");
        Ok(written)
    }
}

/// If `dest` holds nothing but one directory (other than `keep`), move that
/// directory's children up one level.
///
/// Release archives are commonly packed as `app-1.2.3/{app.exe,_internal}`;
/// this brings the stage into the install directory's shape.
///
/// # Errors
///
/// Returns [`UpdateError::Storage`] if entries cannot be moved.
pub fn flatten_single_root(dest: &Path, keep: &str) -> Result<bool> {
    let entries: Vec<_> = fs::read_dir(dest)
        .map_err(|e| UpdateError::storage("read", dest, e))?
        .filter_map(std::result::Result::ok)
        .collect();

    let [only] = entries.as_slice() else {
        return Ok(false);
    };
    let root = only.path();
    if !root.is_dir() || only.file_name() == keep {
        return Ok(false);
    }

    for child in fs::read_dir(&root).map_err(|e| UpdateError::storage("read", &root, e))? {
        let child = child.map_err(|e| UpdateError::storage("read", &root, e))?;
        let to = dest.join(child.file_name());
        fs::rename(child.path(), &to).map_err(|e| UpdateError::storage("move", &to, e))?;
    }
    fs::remove_dir(&root).map_err(|e| UpdateError::storage("remove", &root, e))?;
    tracing::debug!(root = %root.display(), "flattened archive root");
    Ok(true)
}
