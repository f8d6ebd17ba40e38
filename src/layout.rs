//! Fixed on-disk shape of an install or staging directory.
//!
//! Both trees hold exactly one executable and one `_internal` resource
//! directory. Every path is derived by joining those names onto a root.

use std::path::{Path, PathBuf};

/// Name of the internal resources directory next to the executable.
pub const INTERNAL_DIR: &str = "_internal";

/// Name of the swapper's log file inside the staging directory.
pub const UPDATE_LOG_FILE: &str = "update_log.txt";

/// Executable name in every install and stage. The swapper receives only
/// two paths, so the orchestrator and the swapper both use this constant.
pub const DEFAULT_EXE_NAME: &str = "app.exe";

/// Names the two entries of an install tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    exe_name: String,
}

impl Default for InstallLayout {
    fn default() -> Self {
        Self {
            exe_name: DEFAULT_EXE_NAME.to_owned(),
        }
    }
}

impl InstallLayout {
    /// Executable file name.
    pub fn exe_name(&self) -> &str {
        &self.exe_name
    }

    /// `<root>/<exe>`.
    pub fn exe_in(&self, root: &Path) -> PathBuf {
        root.join(&self.exe_name)
    }

    /// `<root>/_internal`.
    pub fn internal_in(&self, root: &Path) -> PathBuf {
        root.join(INTERNAL_DIR)
    }

    /// `<stage>/update_log.txt`.
    pub fn log_in(&self, stage: &Path) -> PathBuf {
        stage.join(UPDATE_LOG_FILE)
    }

    /// Check that `stage` holds both required entries.
    pub fn validate_stage(&self, stage: &Path) -> StageCheck {
        StageCheck {
            exe_present: self.exe_in(stage).is_file(),
            internal_present: self.internal_in(stage).is_dir(),
        }
    }
}

/// Outcome of [`InstallLayout::validate_stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageCheck {
    /// The executable exists as a regular file.
    pub exe_present: bool,
    /// `_internal` exists as a directory.
    pub internal_present: bool,
}

impl StageCheck {
    /// Both entries are present.
    pub fn is_complete(&self) -> bool {
        self.exe_present && self.internal_present
    }

    /// Human-readable list of missing entries, empty when complete.
    pub fn missing(&self, layout: &InstallLayout) -> Vec<String> {
        let mut missing = Vec::new();
        if !self.exe_present {
            missing.push(layout.exe_name().to_owned());
        }
        if !self.internal_present {
            missing.push(INTERNAL_DIR.to_owned());
        }
        missing
    }
}
