//! Handoff: post-exit self-updater for desktop applications.
//!
//! A running application cannot overwrite its own executable and resources
//! on every platform, so an update is split across two processes:
//!
//! - **Orchestrator** ([`update`]): runs inside the application. Finds a
//!   newer release, downloads and extracts it into a staging directory
//!   outside the install tree, reports monotonic progress, then spawns the
//!   swapper and exits.
//! - **Swapper** ([`swapper`], binary `handoff-swapper`): waits for the
//!   application to exit, replaces the executable and `_internal` tree with
//!   the staged copies, removes the staging directory and relaunches.
//!
//! The swapper records every step in `update_log.txt` inside the staging
//! directory, so a failed swap leaves an explanation behind.

pub mod app_dirs;
pub mod config;
pub mod error;
pub mod layout;
pub mod logging;
pub mod swapper;
pub mod update;

pub use config::UpdaterConfig;
pub use error::{Result, UpdateError};
pub use layout::InstallLayout;
pub use swapper::{SwapOutcome, SwapState, Swapper};
pub use update::{Orchestrator, Release, StagedUpdate, UpdateWorker, WorkerEvent};
