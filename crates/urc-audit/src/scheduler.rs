//! Bounded fan-out of dataset workers.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Semaphore, watch};
use tokio::task::{self, JoinError, JoinSet};
use tracing::{debug, error, info, warn};
use urc_core::DatasetId;

use crate::{Aggregator, AuditSnapshot, Counter, DatasetOutcome, DatasetStatus, DatasetWorker};

/// Receives periodic progress snapshots during a run.
pub trait ProgressSink: Send + Sync {
    /// Called after every `progress_interval` finished datasets.
    fn on_progress(&self, finished: usize, total: usize, snapshot: &AuditSnapshot);
}

/// Progress sink that logs the counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_progress(&self, finished: usize, total: usize, snapshot: &AuditSnapshot) {
        let stats = &snapshot.stats;
        info!(
            finished,
            total,
            datasets_processed = stats.datasets_processed,
            files_checked = stats.files_checked,
            unique_files_found = stats.unique_files_found,
            errors = stats.errors,
            skipped = stats.skipped,
            "Progress"
        );
    }
}

/// What happened to the submitted dataset tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutSummary {
    /// Tasks spawned.
    pub submitted: usize,
    /// Tasks that returned an outcome, whatever its status.
    pub completed: usize,
    /// Tasks that panicked.
    pub failed: usize,
    /// Tasks aborted by a shutdown request.
    pub cancelled: usize,
    /// Whether a shutdown request stopped the run early.
    pub interrupted: bool,
}

impl FanOutSummary {
    /// Tasks that reached an end on their own.
    #[must_use]
    pub const fn finished(&self) -> usize {
        self.completed + self.failed
    }
}

/// Runs one [`DatasetWorker`] task per dataset, at most `width` at a time.
///
/// A task that panics is logged and counted as one error; its siblings keep
/// running. A shutdown request stops submission and aborts in-flight tasks.
#[derive(Debug, Clone, Copy)]
pub struct FanOut {
    width: usize,
    progress_interval: usize,
}

impl FanOut {
    /// Create a scheduler. A `width` of zero is treated as one.
    #[must_use]
    pub fn new(width: usize, progress_interval: usize) -> Self {
        Self {
            width: width.max(1),
            progress_interval,
        }
    }

    /// Maximum concurrent dataset tasks.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Process every dataset and return once all submitted tasks have ended.
    pub async fn run(
        &self,
        worker: Arc<DatasetWorker>,
        datasets: Vec<DatasetId>,
        aggregator: &Aggregator,
        mut shutdown: watch::Receiver<bool>,
        progress: &dyn ProgressSink,
    ) -> FanOutSummary {
        let total = datasets.len();
        let semaphore = Arc::new(Semaphore::new(self.width));
        let mut tasks: JoinSet<DatasetOutcome> = JoinSet::new();
        let mut running: HashMap<task::Id, DatasetId> = HashMap::new();
        let mut summary = FanOutSummary::default();

        info!(datasets = total, width = self.width, "Starting dataset fan-out");

        'submit: for dataset in datasets {
            let permit = loop {
                tokio::select! {
                    biased;
                    () = shutdown_requested(&mut shutdown) => {
                        summary.interrupted = true;
                        break 'submit;
                    }
                    Some(joined) = tasks.join_next_with_id(), if !tasks.is_empty() => {
                        self.reap(joined, &mut running, &mut summary, aggregator, total, progress);
                    }
                    permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                        Ok(permit) => break permit,
                        Err(_) => break 'submit,
                    },
                }
            };

            let worker = Arc::clone(&worker);
            let task_dataset = dataset.clone();
            let handle = tasks.spawn(async move {
                let _permit = permit;
                worker.process(&task_dataset).await
            });
            running.insert(handle.id(), dataset);
            summary.submitted += 1;
        }

        if summary.interrupted {
            warn!(
                submitted = summary.submitted,
                pending = total - summary.submitted,
                "Shutdown requested, aborting in-flight datasets"
            );
            tasks.abort_all();
        }

        while !tasks.is_empty() {
            tokio::select! {
                biased;
                () = shutdown_requested(&mut shutdown), if !summary.interrupted => {
                    warn!(in_flight = tasks.len(), "Shutdown requested, aborting in-flight datasets");
                    summary.interrupted = true;
                    tasks.abort_all();
                }
                Some(joined) = tasks.join_next_with_id() => {
                    self.reap(joined, &mut running, &mut summary, aggregator, total, progress);
                }
            }
        }

        debug!(?summary, "Dataset fan-out finished");
        summary
    }

    fn reap(
        &self,
        joined: Result<(task::Id, DatasetOutcome), JoinError>,
        running: &mut HashMap<task::Id, DatasetId>,
        summary: &mut FanOutSummary,
        aggregator: &Aggregator,
        total: usize,
        progress: &dyn ProgressSink,
    ) {
        match joined {
            Ok((id, outcome)) => {
                let dataset = running.remove(&id);
                summary.completed += 1;
                if outcome.status != DatasetStatus::Processed {
                    debug!(dataset = ?dataset, status = ?outcome.status, "Dataset ended early");
                }
            }
            Err(err) if err.is_panic() => {
                let dataset = running.remove(&err.id());
                let message = panic_message(err.into_panic());
                error!(dataset = ?dataset, panic = %message, "Dataset task panicked");
                aggregator.increment(Counter::Errors, 1);
                summary.failed += 1;
            }
            Err(err) => {
                let dataset = running.remove(&err.id());
                debug!(dataset = ?dataset, "Dataset task cancelled");
                summary.cancelled += 1;
                return;
            }
        }

        let finished = summary.finished();
        if self.progress_interval > 0 && finished % self.progress_interval == 0 {
            progress.on_progress(finished, total, &aggregator.snapshot());
        }
    }
}

/// Resolves once shutdown has been requested. A dropped sender never resolves.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
