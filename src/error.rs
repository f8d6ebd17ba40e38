//! Error types for the updater.

use std::path::Path;

/// Top-level error type shared by the orchestrator and the swapper.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// Wrong command-line shape for the swapper.
    #[error("usage error: {0}")]
    Usage(String),

    /// A required entry is absent from the staging directory.
    #[error("missing source: {0}")]
    MissingSource(String),

    /// Delete, copy or create failed on the install or staging tree.
    #[error("filesystem error: {0}")]
    Filesystem(String),

    /// The freshly installed executable could not be started.
    #[error("launch error: {0}")]
    Launch(String),

    /// Release feed or archive download failure.
    #[error("network error: {0}")]
    Network(String),

    /// Staging area could not be prepared or written.
    #[error("storage error: {0}")]
    Storage(String),

    /// Downloaded archive is corrupt or does not match its checksum.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// The user aborted the update before the hand-off.
    #[error("update cancelled")]
    Cancelled,

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpdateError {
    /// Build a [`UpdateError::Filesystem`] naming the operation and path.
    pub fn fs(op: &str, path: &Path, err: impl std::fmt::Display) -> Self {
        Self::Filesystem(format!("cannot {op} {}: {err}", path.display()))
    }

    /// Build a [`UpdateError::Storage`] naming the operation and path.
    pub fn storage(op: &str, path: &Path, err: impl std::fmt::Display) -> Self {
        Self::Storage(format!("cannot {op} {}: {err}", path.display()))
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, UpdateError>;
