//! URC Core - Core types and traits for the unique replica checker
//!
//! This crate provides the vocabulary shared by every other crate:
//!
//! - **Identifiers**: namespace-qualified dataset and file identifiers
//! - **Replica records**: per-endpoint replica state maps returned by the catalog
//! - **Uniqueness**: the pure predicate deciding whether an endpoint holds the
//!   sole AVAILABLE copy of a file
//! - **Catalog facade**: the read-only operations the audit consumes, and the
//!   error taxonomy they fail with

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod catalog;
mod error;
mod ids;
mod replica;
mod uniqueness;

pub use catalog::*;
pub use error::*;
pub use ids::*;
pub use replica::*;
pub use uniqueness::*;

// Re-export commonly used external types
pub use async_trait::async_trait;
