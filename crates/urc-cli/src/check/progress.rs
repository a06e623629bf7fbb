//! Progress logging with optional report checkpoints.

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use urc_audit::{
    AuditSnapshot, FileReportWriter, LogProgress, ProgressSink, ReportSink, RunReport,
};

/// Logs progress and rewrites the report every `every` finished datasets.
///
/// Checkpoints happen at progress reports, so the effective spacing is
/// rounded up to the progress interval. Writes run on the blocking pool; a
/// checkpoint that comes due while the previous one is still on disk is skipped.
pub struct CheckpointProgress {
    rse: String,
    writer: FileReportWriter,
    every: Option<usize>,
    last: Mutex<usize>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl CheckpointProgress {
    pub fn new(rse: impl Into<String>, writer: FileReportWriter, every: Option<usize>) -> Self {
        Self {
            rse: rse.into(),
            writer,
            every: every.filter(|n| *n > 0),
            last: Mutex::new(0),
            pending: Mutex::new(None),
        }
    }

    fn due(&self, finished: usize) -> bool {
        let Some(every) = self.every else {
            return false;
        };
        let mut last = self.last.lock();
        if finished < *last + every {
            return false;
        }
        *last = finished;
        true
    }

    /// Wait for an in-flight checkpoint write.
    ///
    /// Must be awaited before the final report is written, or a late
    /// checkpoint could replace it.
    pub async fn finish(&self) {
        let pending = self.pending.lock().take();
        if let Some(handle) = pending {
            if let Err(e) = handle.await {
                warn!(error = %e, "Checkpoint task failed");
            }
        }
    }
}

impl ProgressSink for CheckpointProgress {
    fn on_progress(&self, finished: usize, total: usize, snapshot: &AuditSnapshot) {
        LogProgress.on_progress(finished, total, snapshot);

        let mut pending = self.pending.lock();
        if pending.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!(finished, "Previous checkpoint still writing, skipping");
            return;
        }
        if !self.due(finished) {
            return;
        }

        let report = RunReport::from_snapshot(&self.rse, snapshot);
        let writer = self.writer.clone();
        *pending = Some(tokio::task::spawn_blocking(move || {
            match writer.write(&report) {
                Ok(()) => info!(finished, total, "Checkpoint written"),
                Err(e) => warn!(error = %e, "Checkpoint write failed, continuing"),
            }
        }));
    }
}
