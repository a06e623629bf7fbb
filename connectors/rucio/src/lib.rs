//! URC Rucio Connector
//!
//! Catalog client for the Rucio data management REST API, used to audit an
//! RSE for single-copy files.
//!
//! ## Operations
//! - `GET /replicas/rse/{rse}` - datasets with a replica at the RSE
//! - `GET /dids/{scope}/{name}/files` - files of a dataset
//! - `POST /replicas/list` - replica locations and states for a batch of files
//!
//! All three answer with a JSON stream (one object per line).
//!
//! ## Authentication
//! A configured token is sent as `X-Rucio-Auth-Token`. With userpass
//! credentials the client obtains a token from `/auth/userpass` on first use
//! and again when the server rejects the cached one.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod client;
mod config;
mod error;
pub mod types;

pub use client::{AUTH_TOKEN_HEADER, RucioClient};
pub use config::{RetryConfig, RucioConfig};
pub use error::{RucioError, RucioResult, Subject};
