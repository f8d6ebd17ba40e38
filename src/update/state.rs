//! Update state persistence.
//!
//! Tracks the auto-update preference, the last check time, a dismissed
//! release and the cached ETag of the release feed. Persisted as JSON to
//! `<config_dir>/update-state.json`.

use crate::error::{Result, UpdateError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// User preference for automatic updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoUpdatePreference {
    /// Ask before installing (default).
    #[default]
    Ask,
    /// Install without asking.
    Always,
    /// Never install, just log availability.
    Never,
}

impl AutoUpdatePreference {
    /// Whether a found release may be installed. `confirmed` is the user's
    /// answer, only consulted for [`AutoUpdatePreference::Ask`].
    pub fn permits_install(self, confirmed: bool) -> bool {
        match self {
            Self::Always => true,
            Self::Ask => confirmed,
            Self::Never => false,
        }
    }
}

impl std::fmt::Display for AutoUpdatePreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ask => write!(f, "ask"),
            Self::Always => write!(f, "always"),
            Self::Never => write!(f, "never"),
        }
    }
}

/// Persistent update state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateState {
    /// When the feed was last queried.
    pub last_check: Option<DateTime<Utc>>,
    /// Release version the user chose to skip.
    pub dismissed_release: Option<String>,
    /// ETag of the last feed response.
    pub etag: Option<String>,
    /// Staging directory last handed to the swapper. If it still exists on
    /// the next start, the swap failed and its `update_log.txt` explains why.
    pub last_handoff_stage: Option<PathBuf>,
}

impl UpdateState {
    /// Default state file location.
    pub fn state_file_path() -> PathBuf {
        crate::app_dirs::update_state_file()
    }

    /// Load state from `path`. Returns the default state if the file is
    /// missing or cannot be parsed.
    pub fn load_from(path: &Path) -> Self {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(_) => return Self::default(),
        };

        serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable update state");
            Self::default()
        })
    }

    /// Persist the state to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file
    /// cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| UpdateError::storage("create state directory", parent, e))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| UpdateError::Storage(format!("cannot serialize update state: {e}")))?;

        std::fs::write(path, json).map_err(|e| UpdateError::storage("write update state", path, e))
    }

    /// Record that a check happened now.
    pub fn mark_checked(&mut self) {
        self.last_check = Some(Utc::now());
    }

    /// `true` if the last check is at least `hours` old, or never happened.
    pub fn check_is_stale(&self, hours: u64) -> bool {
        let Some(last) = self.last_check else {
            return true;
        };
        let elapsed = Utc::now().signed_duration_since(last);
        elapsed.num_hours() >= i64::try_from(hours).unwrap_or(i64::MAX)
    }

    /// `true` if `version` was dismissed by the user.
    pub fn is_dismissed(&self, version: &str) -> bool {
        self.dismissed_release.as_deref() == Some(version)
    }
}
