//! Audit run orchestration.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{error, info, warn};
use urc_core::{CatalogClient, CatalogError, DatasetId};
use urc_ratelimit::{RateLimiter, SlidingWindow};

use crate::{
    Aggregator, AuditConfig, AuditError, AuditResult, Counter, DatasetWorker, FanOut,
    FanOutSummary, ProgressSink, RunReport, scheduler::shutdown_requested,
};

/// Everything a finished (or interrupted) run produced.
#[derive(Debug, Clone)]
pub struct AuditOutcome {
    /// Report built from the final aggregator state.
    pub report: RunReport,
    /// Whether a shutdown request cut the run short.
    pub interrupted: bool,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
    /// Task accounting from the fan-out.
    pub fanout: FanOutSummary,
}

/// Drives one audit of one endpoint.
pub struct Auditor {
    config: AuditConfig,
    catalog: Arc<dyn CatalogClient>,
    limiter: Arc<SlidingWindow>,
    aggregator: Arc<Aggregator>,
}

impl Auditor {
    /// Validate `config` and prepare a run against `catalog`.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Configuration`] if the configuration is unusable.
    pub fn new(config: AuditConfig, catalog: Arc<dyn CatalogClient>) -> AuditResult<Self> {
        config.validate()?;
        let limiter = Arc::new(SlidingWindow::from_config(&config.rate_limit)?);
        Ok(Self {
            config,
            catalog,
            limiter,
            aggregator: Arc::new(Aggregator::new()),
        })
    }

    /// Run configuration.
    #[must_use]
    pub const fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Shared aggregator, readable while the run is in progress.
    #[must_use]
    pub const fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    /// Report of whatever has been accumulated so far.
    #[must_use]
    pub fn report(&self) -> RunReport {
        RunReport::from_snapshot(&self.config.target_rse, &self.aggregator.snapshot())
    }

    /// Audit every dataset at the endpoint.
    ///
    /// Returns normally when `shutdown` fires mid-run; the outcome is then
    /// marked interrupted and holds the partial results.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::EndpointNotFound`] or [`AuditError::Enumeration`]
    /// if the datasets at the endpoint cannot be listed.
    pub async fn run(
        &self,
        mut shutdown: watch::Receiver<bool>,
        progress: &dyn ProgressSink,
    ) -> AuditResult<AuditOutcome> {
        let started = Instant::now();
        let target = self.config.target_rse.as_str();
        info!(
            rse = target,
            workers = self.config.workers,
            batch_size = self.config.batch_size,
            rate_limit = self.limiter.limit(),
            window_secs = self.limiter.window().as_secs_f64(),
            "Starting unique replica check"
        );

        let datasets = tokio::select! {
            biased;
            () = shutdown_requested(&mut shutdown) => {
                warn!("Shutdown requested before datasets were listed");
                let fanout = FanOutSummary {
                    interrupted: true,
                    ..FanOutSummary::default()
                };
                return Ok(self.finish(started, fanout));
            }
            listed = self.list_datasets() => listed?,
        };

        self.aggregator
            .increment(Counter::DatasetsFound, datasets.len() as u64);
        info!(datasets = datasets.len(), "Found datasets at endpoint");
        if datasets.is_empty() {
            warn!(rse = target, "No datasets found at endpoint");
        }

        let worker = Arc::new(DatasetWorker::new(
            &self.config,
            Arc::clone(&self.catalog),
            Arc::clone(&self.limiter) as Arc<dyn RateLimiter>,
            Arc::clone(&self.aggregator),
        ));
        let fanout = FanOut::new(self.config.workers, self.config.progress_interval)
            .run(worker, datasets, &self.aggregator, shutdown, progress)
            .await;

        Ok(self.finish(started, fanout))
    }

    async fn list_datasets(&self) -> AuditResult<Vec<DatasetId>> {
        let target = &self.config.target_rse;
        info!(rse = %target, "Listing datasets at endpoint");

        self.limiter.acquire().await;
        let listed = self.catalog.list_datasets_at(target).await;
        self.limiter.release();

        listed.map_err(|err| match err {
            CatalogError::EndpointNotFound { endpoint } => {
                error!(rse = %endpoint, "Endpoint not found");
                AuditError::EndpointNotFound(endpoint)
            }
            source => {
                error!(rse = %target, error = %source, "Failed to list datasets");
                AuditError::Enumeration {
                    endpoint: target.clone(),
                    source,
                }
            }
        })
    }

    fn finish(&self, started: Instant, fanout: FanOutSummary) -> AuditOutcome {
        let elapsed = started.elapsed();
        let report = self.report();
        let stats = report.statistics;

        info!(
            datasets_found = stats.datasets_found,
            datasets_processed = stats.datasets_processed,
            files_checked = stats.files_checked,
            unique_files_found = stats.unique_files_found,
            errors = stats.errors,
            skipped = stats.skipped,
            elapsed_secs = elapsed.as_secs_f64(),
            interrupted = fanout.interrupted,
            "Unique replica check finished"
        );
        for scope in report.summary().scopes {
            info!(scope = %scope.scope, files = scope.files, "Unique files in scope");
        }

        AuditOutcome {
            report,
            interrupted: fanout.interrupted,
            elapsed,
            fanout,
        }
    }
}
