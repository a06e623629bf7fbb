//! `urc check` command implementation.
//!
//! # Usage
//!
//! ```text
//! # Check CERN-PROD with defaults
//! urc check --rse CERN-PROD --rucio-host https://rucio.cern.ch
//!
//! # Debug logging and a custom output file
//! urc check --rse TIER2_US_MIT --output results_mit.json --log-level DEBUG
//!
//! # Conservative rate limiting for busy servers
//! urc check --rse BUSY_RSE --rate-limit 5 --time-window 10
//! ```
//!
//! The report is saved on normal completion and on Ctrl-C. An interrupted run
//! exits with status 1.

mod catalog;
mod progress;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio::sync::watch;
use tracing::{error, info, warn};
use urc_audit::{AuditConfig, Auditor, FileReportWriter, ReportSink};
use urc_ratelimit::RateLimitConfig;
use urc_rucio::RucioClient;
use urc_telemetry::{LogConfig, LogLevel, init_logging};

pub use catalog::RucioArgs;
use progress::CheckpointProgress;

const PROGRESS_INTERVAL: usize = 10;

/// Arguments for the `urc check` command.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// RSE to check for unique replicas.
    #[arg(long)]
    pub rse: String,

    /// JSON report path; a CSV is written next to it.
    #[arg(long, default_value = "unique_replicas.json")]
    pub output: PathBuf,

    /// Datasets processed in parallel.
    #[arg(long, default_value_t = 5)]
    pub workers: usize,

    /// Maximum catalog calls per time window.
    #[arg(long, default_value_t = 10, allow_negative_numbers = true)]
    pub rate_limit: i64,

    /// Rate limit window in seconds.
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    pub time_window: f64,

    /// Files per replica lookup.
    #[arg(long, default_value_t = 100)]
    pub batch_size: usize,

    /// Give up on a dataset after this many consecutive failed lookups.
    #[arg(long)]
    pub max_batch_failures: Option<u32>,

    /// Rewrite the report every N finished datasets.
    #[arg(long, value_name = "N")]
    pub checkpoint_every: Option<usize>,

    /// Log level: DEBUG, INFO, WARNING or ERROR. `RUST_LOG` takes precedence.
    #[arg(long, default_value = "INFO")]
    pub log_level: String,

    /// Directory for the per-run log file.
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,

    /// Write logs as JSON lines.
    #[arg(long, default_value_t = false)]
    pub log_json: bool,

    #[command(flatten)]
    pub rucio: RucioArgs,
}

impl CheckArgs {
    fn audit_config(&self) -> Result<AuditConfig> {
        let rate_limit = RateLimitConfig::from_parts(self.rate_limit, self.time_window)?;
        let progress_interval = self
            .checkpoint_every
            .filter(|n| *n > 0)
            .map_or(PROGRESS_INTERVAL, |n| n.min(PROGRESS_INTERVAL));

        let mut config = AuditConfig::new(&self.rse)
            .with_workers(self.workers)
            .with_batch_size(self.batch_size)
            .with_rate_limit(rate_limit)
            .with_progress_interval(progress_interval);
        if let Some(failures) = self.max_batch_failures {
            config = config.with_max_consecutive_batch_failures(failures);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Run the check command.
pub async fn run(args: CheckArgs) -> Result<ExitCode> {
    let level: LogLevel = args.log_level.parse()?;
    let config = args.audit_config()?;
    let rucio = args.rucio.resolve()?;

    let log_path = init_logging(
        &LogConfig::new(&args.rse)
            .with_level(level)
            .with_log_dir(&args.log_dir)
            .with_json(args.log_json),
    )?;
    info!(path = %log_path.display(), "Log file created");

    let result = audit(&args, config, rucio).await;
    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "Fatal error");
    }
    result
}

async fn audit(
    args: &CheckArgs,
    config: AuditConfig,
    rucio: urc_rucio::RucioConfig,
) -> Result<ExitCode> {
    let client = RucioClient::new(rucio).context("creating Rucio client")?;
    info!(
        host = %client.config().host,
        account = client.config().account.as_deref().unwrap_or("-"),
        "Rucio client initialized"
    );
    let auditor = Auditor::new(config, Arc::new(client))?;

    let writer = FileReportWriter::new(&args.output);
    let progress = CheckpointProgress::new(&args.rse, writer.clone(), args.checkpoint_every);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(forward_interrupt(shutdown_tx));

    let outcome = auditor.run(shutdown_rx, &progress).await?;
    progress.finish().await;
    writer
        .write(&outcome.report)
        .with_context(|| format!("saving results to {}", writer.json_path().display()))?;

    if outcome.interrupted {
        warn!(
            unique_files = outcome.report.statistics.unique_files_found,
            "Run interrupted, partial results saved"
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

async fn forward_interrupt(shutdown: watch::Sender<bool>) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("Received interrupt signal, shutting down");
        let _ = shutdown.send(true);
    }
}
