//! In-app side of the self-updater.
//!
//! Discovers newer releases, stages them outside the install directory with
//! monotonic progress reporting, and hands the install over to the
//! `handoff-swapper` process once the application is ready to exit.

pub mod cancel;
pub mod checker;
pub mod extract;
pub mod fetcher;
pub mod handoff;
pub mod integrity;
pub mod orchestrator;
pub mod progress;
pub mod release;
pub mod stage;
pub mod state;
pub mod worker;

pub use cancel::CancelFlag;
pub use checker::UpdateChecker;
pub use handoff::{ExitProcess, ShutdownHook};
pub use orchestrator::{Orchestrator, StagedUpdate};
pub use progress::ProgressTracker;
pub use release::{Release, version_is_newer};
pub use stage::{ArchiveStageBuilder, StageBuilder};
pub use state::{AutoUpdatePreference, UpdateState};
pub use worker::{UpdateWorker, WorkerEvent};
