//! URC Audit - Single-copy audit engine
//!
//! Finds the files whose only AVAILABLE replica in the federation sits at one
//! storage endpoint:
//!
//! - [`Auditor`] enumerates the datasets at the endpoint and drives the run
//! - [`FanOut`] runs one [`DatasetWorker`] per dataset with bounded parallelism
//! - [`DatasetWorker`] lists files, batches replica lookups, and classifies files
//! - [`Aggregator`] accumulates unique files and run statistics atomically
//! - [`FileReportWriter`] persists the result as JSON plus a flat CSV
//!
//! Every catalog call passes through one shared [`urc_ratelimit::SlidingWindow`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use urc_audit::{AuditConfig, Auditor, FileReportWriter, LogProgress, ReportSink};
//!
//! let auditor = Auditor::new(AuditConfig::new("CERN-PROD"), catalog)?;
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let outcome = auditor.run(shutdown_rx, &LogProgress).await?;
//! FileReportWriter::new("unique_replicas.json").write(&outcome.report)?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod aggregator;
mod auditor;
mod config;
mod error;
mod report;
mod scheduler;
mod worker;

pub use aggregator::*;
pub use auditor::*;
pub use config::*;
pub use error::*;
pub use report::*;
pub use scheduler::*;
pub use worker::*;
