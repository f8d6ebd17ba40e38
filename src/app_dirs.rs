//! Application directory paths for the updater front end.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! | Purpose | Linux | Windows |
//! |---------|-------|---------|
//! | Config | `~/.config/handoff/` | `%APPDATA%\handoff\` |
//! | Cache | `~/.cache/handoff/` | `%LOCALAPPDATA%\handoff\` |
//! | Data | `~/.local/share/handoff/` | `%APPDATA%\handoff\` |
//!
//! # Environment Overrides
//!
//! - `HANDOFF_CONFIG_DIR` overrides [`config_dir`]
//! - `HANDOFF_CACHE_DIR` overrides [`cache_dir`]
//! - `HANDOFF_DATA_DIR` overrides [`data_dir`]
//!
//! The swapper process never calls into this module: it works purely from
//! its two command-line arguments.

use std::path::PathBuf;

/// Application data root directory.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("HANDOFF_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("handoff"))
        .unwrap_or_else(|| std::env::temp_dir().join("handoff-data"))
}

/// Application config directory, holding `config.toml` and `update-state.json`.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("HANDOFF_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("handoff"))
        .unwrap_or_else(|| std::env::temp_dir().join("handoff-config"))
}

/// Application cache directory. Downloaded archives and staging trees live here.
#[must_use]
pub fn cache_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("HANDOFF_CACHE_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::cache_dir()
        .map(|d| d.join("handoff"))
        .unwrap_or_else(|| std::env::temp_dir().join("handoff-cache"))
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Persisted update state (`config_dir()/update-state.json`).
#[must_use]
pub fn update_state_file() -> PathBuf {
    config_dir().join("update-state.json")
}

/// Default root under which staging directories are created.
#[must_use]
pub fn staging_root() -> PathBuf {
    cache_dir().join("staging")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_ends_with_config_toml() {
        let path = config_file();
        let s = path.to_string_lossy();
        assert!(s.ends_with("config.toml"), "config_file: {s}");
    }

    #[test]
    fn update_state_file_is_json() {
        let path = update_state_file();
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("update-state.json")
        );
    }

    #[test]
    fn staging_root_is_subpath_of_cache_dir() {
        let staging = staging_root();
        let cache = cache_dir();
        assert!(
            staging.starts_with(&cache),
            "staging_root ({}) should start with cache_dir ({})",
            staging.display(),
            cache.display()
        );
    }

    #[test]
    fn logs_dir_is_subpath_of_data_dir() {
        assert!(logs_dir().ends_with("logs"));
    }

    #[test]
    fn data_dir_override_via_env() {
        let key = "HANDOFF_DATA_DIR";
        let original = std::env::var_os(key);

        // SAFETY: no other test in this crate reads HANDOFF_DATA_DIR directly.
        unsafe { std::env::set_var(key, "/custom/data") };
        let result = data_dir();
        assert_eq!(result, PathBuf::from("/custom/data"));

        match original {
            Some(val) => unsafe { std::env::set_var(key, val) },
            None => unsafe { std::env::remove_var(key) },
        }
    }
}
