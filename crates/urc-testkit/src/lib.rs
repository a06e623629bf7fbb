//! URC Test Kit - Mock infrastructure for testing the audit engine
//!
//! - [`MockCatalog`] - in-memory catalog with scripted faults, latency, and call accounting
//! - Test fixtures for dataset and file identifiers
//! - Tracing configuration for test output
//!
//! # Example
//!
//! ```rust,ignore
//! use urc_testkit::{MockCatalog, fixtures};
//!
//! let catalog = MockCatalog::new()
//!     .with_dataset("X", fixtures::dataset("mc16", "ds1"), [fixtures::file("mc16", "a")])
//!     .with_replicas(fixtures::file("mc16", "a"), [("X", "AVAILABLE")]);
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod fixtures;
mod mock_catalog;
mod tracing_config;

pub use mock_catalog::*;
pub use tracing_config::*;

// Re-export core types for convenience
pub use urc_core::{CatalogClient, CatalogError, CatalogResult, DatasetId, FileId, ReplicaRecord};
