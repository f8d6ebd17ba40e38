//! The swapper's on-disk update log.
//!
//! Lives at `<D_stage>/update_log.txt`. Created (truncated) when the swapper
//! enters `OpenLog`. Each record is one line:
//!
//! ```text
//! [YYYY-MM-DD HH:MM:SS] [LEVEL] message
//! ```
//!
//! Every line is flushed immediately so the file is readable after a crash.
//! Records are mirrored to `tracing`.

use std::backtrace::Backtrace;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Append-mostly text log of swap transitions.
pub struct UpdateLog {
    path: PathBuf,
    file: File,
}

impl UpdateLog {
    /// Create or truncate the log at `path`.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if the file cannot be created.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Reopen an existing log for appending.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if the file cannot be opened.
    pub fn append(path: &Path) -> io::Result<Self> {
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record an informational line.
    pub fn info(&mut self, message: &str) {
        tracing::info!("{message}");
        self.write_line("INFO", message);
    }

    /// Record a warning line.
    pub fn warn(&mut self, message: &str) {
        tracing::warn!("{message}");
        self.write_line("WARN", message);
    }

    /// Record an error, its source chain and a captured stack.
    pub fn fatal(&mut self, error: &(dyn std::error::Error + 'static)) {
        tracing::error!(error = %error, "update failed");
        self.write_line("ERROR", &format!("update failed: {error}"));

        let mut source = error.source();
        while let Some(cause) = source {
            self.write_line("ERROR", &format!("caused by: {cause}"));
            source = cause.source();
        }

        let stack = Backtrace::force_capture();
        self.write_line("ERROR", "stack:");
        for frame in stack.to_string().lines() {
            self.write_raw(&format!("    {frame}"));
        }
    }

    /// Write one timestamped line. Write failures go to tracing only.
    fn write_line(&mut self, level: &str, message: &str) {
        let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        self.write_raw(&format!("[{ts}] [{level}] {message}"));
    }

    fn write_raw(&mut self, line: &str) {
        let result = writeln!(self.file, "{line}").and_then(|()| self.file.flush());
        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), error = %e, "cannot write update log");
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::error::UpdateError;

    #[test]
    fn lines_are_timestamped_and_leveled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("update_log.txt");
        let mut log = UpdateLog::create(&path).unwrap();
        log.info("entering RemoveOld");
        log.warn("no old executable to remove");
        drop(log);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("[INFO] entering RemoveOld"));
        assert!(lines[1].contains("[WARN] no old executable to remove"));
    }

    #[test]
    fn create_truncates_previous_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("update_log.txt");
        std::fs::write(&path, "stale content from an earlier attempt\n").unwrap();

        let mut log = UpdateLog::create(&path).unwrap();
        log.info("fresh");
        drop(log);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("stale"));
        assert!(text.contains("fresh"));
    }

    #[test]
    fn fatal_writes_error_and_stack() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("update_log.txt");
        let mut log = UpdateLog::create(&path).unwrap();
        let err = UpdateError::MissingSource("new executable not found".to_owned());
        log.fatal(&err);
        drop(log);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[ERROR] update failed: missing source: new executable not found"));
        assert!(text.contains("stack:"));
    }

    #[test]
    fn create_fails_when_directory_missing() {
        let result = UpdateLog::create(Path::new("/nonexistent/handoff-stage/update_log.txt"));
        assert!(result.is_err());
    }
}
