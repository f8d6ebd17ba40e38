//! Configuration for the update front end and orchestrator.
//!
//! The swapper reads none of this; it is driven entirely by its arguments.

use crate::error::{Result, UpdateError};
use crate::update::state::AutoUpdatePreference;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level updater configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// The installed application.
    pub app: AppConfig,
    /// Where releases are discovered.
    pub feed: FeedConfig,
    /// Swapper hand-off settings.
    pub swap: SwapConfig,
    /// Staging area settings.
    pub staging: StagingConfig,
    /// Update check cadence.
    pub check: CheckConfig,
}

/// Identity of the application being updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Short application name, used to prefix staging directories.
    ///
    /// The executable file name is not configurable: the swapper only gets
    /// two paths, so both sides use [`crate::layout::DEFAULT_EXE_NAME`].
    pub name: String,
    /// Currently installed version.
    pub version: String,
    /// Install directory. `None` = directory of the running executable.
    pub install_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "app".to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            install_dir: None,
        }
    }
}

/// Release feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// GitHub-style "latest release" JSON endpoint.
    pub releases_url: String,
    /// Substring the archive asset name must contain.
    pub asset_pattern: String,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds (covers the whole archive download).
    pub read_timeout_secs: u64,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            releases_url: String::new(),
            asset_pattern: ".zip".to_owned(),
            connect_timeout_secs: 15,
            read_timeout_secs: 300,
            user_agent: format!("handoff/{} (self-update)", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl FeedConfig {
    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Read timeout as a [`Duration`].
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// Swapper hand-off settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapConfig {
    /// Swapper executable. Relative paths resolve next to the running executable.
    pub swapper_exe: PathBuf,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            swapper_exe: PathBuf::from(default_swapper_name()),
        }
    }
}

impl SwapConfig {
    /// Resolve the swapper executable against `exe_dir` when it is relative.
    pub fn resolve_swapper(&self, exe_dir: &Path) -> PathBuf {
        if self.swapper_exe.is_absolute() {
            self.swapper_exe.clone()
        } else {
            exe_dir.join(&self.swapper_exe)
        }
    }
}

/// Platform file name of the swapper binary.
pub fn default_swapper_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "handoff-swapper.exe"
    } else {
        "handoff-swapper"
    }
}

/// Staging area settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Root under which per-attempt staging directories are created.
    pub root: Option<PathBuf>,
    /// Remove leftover staging directories from aborted attempts on startup.
    pub clean_stale_on_start: bool,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            root: None,
            clean_stale_on_start: true,
        }
    }
}

impl StagingConfig {
    /// Configured root, or the cache-based default.
    pub fn root_or_default(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(crate::app_dirs::staging_root)
    }
}

/// Update check cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Minimum hours between automatic checks.
    pub interval_hours: u64,
    /// What to do when an update is found.
    pub auto_update: AutoUpdatePreference,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            interval_hours: 24,
            auto_update: AutoUpdatePreference::default(),
        }
    }
}

impl UpdaterConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| UpdateError::Config(e.to_string()))
    }

    /// Load from `path`, or the default path, returning defaults if the file is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_config_path);
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| UpdateError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> PathBuf {
        crate::app_dirs::config_file()
    }

    /// Install directory: configured, or the directory of the running executable.
    ///
    /// # Errors
    ///
    /// Returns an error if the running executable's location cannot be determined.
    pub fn install_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.app.install_dir {
            return Ok(dir.clone());
        }
        current_exe_dir()
    }
}

/// Directory containing the running executable.
///
/// # Errors
///
/// Returns an error if the path cannot be determined.
pub fn current_exe_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().map_err(|e| {
        UpdateError::Config(format!("cannot determine current executable path: {e}"))
    })?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| UpdateError::Config(format!("{} has no parent", exe.display())))
}
