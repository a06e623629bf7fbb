//! Per-dataset processing.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};
use urc_core::{CatalogClient, CatalogResult, DatasetId, FileId, ReplicaRecord, is_unique};
use urc_ratelimit::RateLimiter;

use crate::{Aggregator, AuditConfig, Counter};

/// How a dataset ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetStatus {
    /// Every batch was attempted.
    Processed,
    /// Empty or missing dataset.
    Skipped,
    /// The file list could not be fetched.
    Failed,
    /// Gave up after too many consecutive failed batches.
    Aborted,
}

/// Result of processing one dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetOutcome {
    /// Final status.
    pub status: DatasetStatus,
    /// Files whose replica record was evaluated.
    pub files_checked: u64,
    /// Files found unique (including ones already registered via another dataset).
    pub unique_found: u64,
}

impl DatasetOutcome {
    const fn empty(status: DatasetStatus) -> Self {
        Self {
            status,
            files_checked: 0,
            unique_found: 0,
        }
    }
}

#[derive(Debug, Default)]
struct BatchOutcome {
    checked: u64,
    unique: u64,
    gaps: u64,
}

/// Processes one dataset at a time: list files, look up replicas in batches,
/// classify each file, and feed the aggregator.
///
/// Catalog failures never escape; they become statistics and log lines.
pub struct DatasetWorker {
    catalog: Arc<dyn CatalogClient>,
    limiter: Arc<dyn RateLimiter>,
    aggregator: Arc<Aggregator>,
    target: String,
    batch_size: usize,
    max_consecutive_batch_failures: Option<u32>,
}

impl DatasetWorker {
    /// Create a worker for the endpoint named in `config`.
    #[must_use]
    pub fn new(
        config: &AuditConfig,
        catalog: Arc<dyn CatalogClient>,
        limiter: Arc<dyn RateLimiter>,
        aggregator: Arc<Aggregator>,
    ) -> Self {
        Self {
            catalog,
            limiter,
            aggregator,
            target: config.target_rse.clone(),
            batch_size: config.batch_size.max(1),
            max_consecutive_batch_failures: config.max_consecutive_batch_failures,
        }
    }

    /// Endpoint under audit.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Process one dataset to completion.
    #[instrument(skip(self), fields(dataset = %dataset))]
    pub async fn process(&self, dataset: &DatasetId) -> DatasetOutcome {
        info!("Processing dataset");

        let files = match self.fetch_files(dataset).await {
            Ok(files) if files.is_empty() => {
                warn!("No files found in dataset");
                self.aggregator.increment(Counter::Skipped, 1);
                return DatasetOutcome::empty(DatasetStatus::Skipped);
            }
            Ok(files) => files,
            Err(err) if err.is_not_found() => {
                warn!(error = %err, "Dataset not found, skipping");
                self.aggregator.increment(Counter::Skipped, 1);
                return DatasetOutcome::empty(DatasetStatus::Skipped);
            }
            Err(err) => {
                error!(error = %err, kind = err.kind(), "Failed to list files");
                self.aggregator.increment(Counter::Errors, 1);
                return DatasetOutcome::empty(DatasetStatus::Failed);
            }
        };
        debug!(files = files.len(), "Dataset listed");

        let mut outcome = DatasetOutcome::empty(DatasetStatus::Processed);
        let mut consecutive_failures = 0_u32;

        for (index, batch) in files.chunks(self.batch_size).enumerate() {
            match self.check_batch(batch).await {
                Ok(result) => {
                    consecutive_failures = 0;
                    outcome.files_checked += result.checked;
                    outcome.unique_found += result.unique;
                    if result.gaps > 0 {
                        debug!(batch = index, gaps = result.gaps, "Batch answer omitted files");
                    }
                }
                Err(err) => {
                    error!(
                        batch = index,
                        files = batch.len(),
                        error = %err,
                        "Failed to check replicas for batch"
                    );
                    self.aggregator.increment(Counter::Errors, batch.len() as u64);
                    consecutive_failures += 1;

                    if self
                        .max_consecutive_batch_failures
                        .is_some_and(|max| consecutive_failures >= max)
                    {
                        let remaining = files.len().saturating_sub((index + 1) * self.batch_size);
                        warn!(
                            consecutive_failures,
                            remaining, "Too many failed batches, abandoning rest of dataset"
                        );
                        self.aggregator.increment(Counter::Errors, remaining as u64);
                        outcome.status = DatasetStatus::Aborted;
                        return outcome;
                    }
                }
            }
        }

        self.aggregator.increment(Counter::DatasetsProcessed, 1);
        info!(
            files_checked = outcome.files_checked,
            unique = outcome.unique_found,
            "Completed dataset"
        );
        outcome
    }

    async fn fetch_files(&self, dataset: &DatasetId) -> CatalogResult<Vec<FileId>> {
        self.limiter.acquire().await;
        let files = self.catalog.list_files(dataset).await;
        self.limiter.release();
        files
    }

    async fn check_batch(&self, batch: &[FileId]) -> CatalogResult<BatchOutcome> {
        self.limiter.acquire().await;
        let records = self.catalog.list_replicas(batch, true).await;
        self.limiter.release();

        let by_file: HashMap<FileId, ReplicaRecord> = records?
            .into_iter()
            .map(|record| (record.file.clone(), record))
            .collect();

        let mut outcome = BatchOutcome::default();
        for file in batch {
            let Some(record) = by_file.get(file) else {
                warn!(file = %file, "No replica information found");
                outcome.gaps += 1;
                continue;
            };

            self.aggregator.increment(Counter::FilesChecked, 1);
            outcome.checked += 1;

            if is_unique(&self.target, record) {
                outcome.unique += 1;
                if self.aggregator.record_unique(&file.scope, &file.name) {
                    info!(file = %file, "Found unique file");
                } else {
                    debug!(file = %file, "Unique file already recorded");
                }
            } else {
                debug!(
                    file = %file,
                    local_state = record.state_at(&self.target).map_or("absent", |s| s.as_str()),
                    available_at = ?record.available_endpoints().collect::<Vec<_>>(),
                    "File is not unique"
                );
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use urc_core::CatalogError;
    use urc_ratelimit::SlidingWindow;
    use urc_testkit::{Fault, MockCatalog, fixtures};

    use super::*;

    fn worker(catalog: MockCatalog, config: &AuditConfig) -> (DatasetWorker, Arc<Aggregator>) {
        let aggregator = Arc::new(Aggregator::new());
        let limiter = Arc::new(SlidingWindow::new(1_000, Duration::from_secs(1)).unwrap());
        let worker =
            DatasetWorker::new(config, Arc::new(catalog), limiter, Arc::clone(&aggregator));
        (worker, aggregator)
    }

    #[tokio::test]
    async fn classifies_files_in_batches() {
        let files = fixtures::files("mc16", "f", 250);
        let catalog = MockCatalog::new()
            .with_dataset("X", fixtures::dataset("mc16", "ds"), files.clone())
            .with_available(&files[..200], &["X"])
            .with_available(&files[200..], &["X", "Y"]);
        let config = AuditConfig::new("X");
        let (worker, agg) = worker(catalog, &config);

        let outcome = worker.process(&fixtures::dataset("mc16", "ds")).await;

        assert_eq!(outcome.status, DatasetStatus::Processed);
        assert_eq!(outcome.files_checked, 250);
        assert_eq!(outcome.unique_found, 200);
        let stats = agg.stats();
        assert_eq!(stats.datasets_processed, 1);
        assert_eq!(stats.files_checked, 250);
        assert_eq!(stats.unique_files_found, 200);
    }

    #[tokio::test]
    async fn omitted_file_is_neither_checked_nor_an_error() {
        let a = fixtures::file("s", "a");
        let b = fixtures::file("s", "b");
        let catalog = MockCatalog::new()
            .with_dataset("X", fixtures::dataset("s", "ds"), [a.clone(), b.clone()])
            .with_available(&[a.clone(), b.clone()], &["X"])
            .omit_from_replica_answers(b);
        let (worker, agg) = worker(catalog, &AuditConfig::new("X"));

        let outcome = worker.process(&fixtures::dataset("s", "ds")).await;

        assert_eq!(outcome.files_checked, 1);
        let stats = agg.stats();
        assert_eq!(stats.files_checked, 1);
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.unique_files_found, 1);
    }

    #[tokio::test]
    async fn missing_dataset_is_skipped() {
        let catalog = MockCatalog::new().with_file_listing_fault(
            fixtures::dataset("s", "gone"),
            Fault::Error(CatalogError::DatasetNotFound {
                scope: "s".into(),
                name: "gone".into(),
            }),
        );
        let (worker, agg) = worker(catalog, &AuditConfig::new("X"));

        let outcome = worker.process(&fixtures::dataset("s", "gone")).await;

        assert_eq!(outcome.status, DatasetStatus::Skipped);
        let stats = agg.stats();
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.datasets_processed, 0);
    }

    #[tokio::test]
    async fn transient_listing_failure_counts_one_error() {
        let catalog = MockCatalog::new().with_file_listing_fault(
            fixtures::dataset("s", "ds"),
            Fault::Error(CatalogError::transient("503")),
        );
        let (worker, agg) = worker(catalog, &AuditConfig::new("X"));

        let outcome = worker.process(&fixtures::dataset("s", "ds")).await;

        assert_eq!(outcome.status, DatasetStatus::Failed);
        assert_eq!(agg.stats().errors, 1);
        assert_eq!(agg.stats().skipped, 0);
    }

    #[tokio::test]
    async fn consecutive_batch_failures_abort_the_dataset() {
        let files = fixtures::files("s", "f", 40);
        let catalog = MockCatalog::new()
            .with_dataset("X", fixtures::dataset("s", "ds"), files.clone())
            .with_available(&files, &["X"])
            .fail_replica_batches_containing(files[0].clone())
            .fail_replica_batches_containing(files[10].clone());
        let config = AuditConfig::new("X")
            .with_batch_size(10)
            .with_max_consecutive_batch_failures(2);
        let (worker, agg) = worker(catalog, &config);

        let outcome = worker.process(&fixtures::dataset("s", "ds")).await;

        assert_eq!(outcome.status, DatasetStatus::Aborted);
        let stats = agg.stats();
        assert_eq!(stats.errors, 40, "failed batches plus abandoned files");
        assert_eq!(stats.files_checked, 0);
        assert_eq!(stats.datasets_processed, 0);
    }
}
