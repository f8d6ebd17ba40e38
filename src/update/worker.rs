//! Background worker for the download/extract phase.
//!
//! The UI spawns an [`UpdateWorker`] and drains its event channel from its
//! own event loop. Each progress value is delivered exactly once, in order,
//! followed by exactly one [`WorkerEvent::Finished`].

use super::cancel::CancelFlag;
use super::orchestrator::{Orchestrator, StagedUpdate};
use super::release::Release;
use crate::error::{Result, UpdateError};
use crossbeam_channel::{Receiver, unbounded};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Events published by the worker.
#[derive(Debug)]
pub enum WorkerEvent {
    /// Progress percentage in `[0, 100]`.
    Progress(u8),
    /// The attempt is over.
    Finished(Result<StagedUpdate>),
}

/// Runs [`Orchestrator::download_and_install_with_cancel`] on a thread.
pub struct UpdateWorker {
    events: Receiver<WorkerEvent>,
    cancel: CancelFlag,
    handle: Option<JoinHandle<()>>,
}

impl UpdateWorker {
    /// Start installing `release` in the background.
    pub fn spawn(orchestrator: Arc<Orchestrator>, release: Release, install_dir: PathBuf) -> Self {
        let (tx, rx) = unbounded();
        let cancel = CancelFlag::new();
        let worker_cancel = cancel.clone();

        let handle = std::thread::Builder::new()
            .name("update-worker".to_owned())
            .spawn(move || {
                let progress_tx = tx.clone();
                let mut on_progress = move |value: u8| {
                    // The UI may have gone away; keep working regardless.
                    let _ = progress_tx.send(WorkerEvent::Progress(value));
                };
                let result = orchestrator.download_and_install_with_cancel(
                    &release,
                    &install_dir,
                    &mut on_progress,
                    &worker_cancel,
                );
                let _ = tx.send(WorkerEvent::Finished(result));
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!(error = %e, "cannot spawn update worker");
                let (fallback_tx, fallback_rx) = unbounded();
                let _ = fallback_tx.send(WorkerEvent::Finished(Err(UpdateError::Io(e))));
                return Self {
                    events: fallback_rx,
                    cancel,
                    handle: None,
                };
            }
        };

        Self {
            events: rx,
            cancel,
            handle,
        }
    }

    /// Event channel to drain from the UI context.
    pub fn events(&self) -> &Receiver<WorkerEvent> {
        &self.events
    }

    /// Ask the worker to stop at its next progress step.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the attempt finishes, forwarding progress to `on_progress`.
    ///
    /// # Errors
    ///
    /// Returns the attempt's error, or [`UpdateError::Cancelled`] if the
    /// worker vanished without reporting.
    pub fn wait(mut self, mut on_progress: impl FnMut(u8)) -> Result<StagedUpdate> {
        let mut outcome = Err(UpdateError::Cancelled);
        for event in self.events.iter() {
            match event {
                WorkerEvent::Progress(value) => on_progress(value),
                WorkerEvent::Finished(result) => {
                    outcome = result;
                    break;
                }
            }
        }
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("update worker panicked");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::config::UpdaterConfig;
    use crate::update::stage::{StageBuilder, StageProgress};
    use std::path::Path;
    use std::time::Duration;

    struct SlowBuilder;

    impl StageBuilder for SlowBuilder {
        fn build_stage(
            &self,
            _release: &Release,
            stage_dir: &Path,
            progress: StageProgress<'_>,
        ) -> Result<()> {
            for step in (0..=90).step_by(10) {
                progress(step)?;
                std::thread::sleep(Duration::from_millis(20));
            }
            std::fs::create_dir_all(stage_dir.join("_internal")).unwrap();
            std::fs::write(stage_dir.join("app.exe"), "v2").unwrap();
            Ok(())
        }
    }

    fn orchestrator(root: &Path) -> Arc<Orchestrator> {
        let mut config = UpdaterConfig::default();
        config.staging.root = Some(root.join("staging"));
        Arc::new(
            Orchestrator::with_builder(config, Arc::new(SlowBuilder))
                .with_state_path(root.join("update-state.json")),
        )
    }

    #[test]
    fn worker_delivers_ordered_progress_then_finish() {
        let dir = tempfile::tempdir().unwrap();
        let worker = UpdateWorker::spawn(
            orchestrator(dir.path()),
            Release::from_url("2.0.0", "https://example.com/app.zip"),
            dir.path().join("inst"),
        );

        let mut seen = Vec::new();
        let staged = worker.wait(|v| seen.push(v)).unwrap();

        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.iter().filter(|v| **v == 100).count(), 1);
        assert!(staged.stage_dir.join("app.exe").is_file());
    }

    #[test]
    fn cancel_stops_worker_without_reaching_100() {
        let dir = tempfile::tempdir().unwrap();
        let worker = UpdateWorker::spawn(
            orchestrator(dir.path()),
            Release::from_url("2.0.0", "https://example.com/app.zip"),
            dir.path().join("inst"),
        );
        worker.cancel();

        let mut seen = Vec::new();
        let result = worker.wait(|v| seen.push(v));
        assert!(matches!(result, Err(UpdateError::Cancelled)));
        assert!(!seen.contains(&100));
        let leftovers = std::fs::read_dir(dir.path().join("staging"))
            .map(|d| d.count())
            .unwrap_or(0);
        assert_eq!(leftovers, 0);
    }
}
