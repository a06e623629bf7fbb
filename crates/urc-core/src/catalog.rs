//! Catalog client facade.
//!
//! The audit engine consumes the replica catalog through this trait only. It is
//! a black box with its own latency, failure modes, and session state;
//! implementations must be safe to call from many tasks at once.

use async_trait::async_trait;

use crate::{CatalogResult, DatasetId, FileId, ReplicaRecord};

/// Read-only operations against the replica catalog.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// List every dataset with a replica at `endpoint`.
    ///
    /// Fails with [`CatalogError::EndpointNotFound`](crate::CatalogError) if the
    /// endpoint is unknown.
    async fn list_datasets_at(&self, endpoint: &str) -> CatalogResult<Vec<DatasetId>>;

    /// List the files contained in a dataset.
    ///
    /// Fails with [`CatalogError::DatasetNotFound`](crate::CatalogError) if the
    /// dataset no longer exists.
    async fn list_files(&self, dataset: &DatasetId) -> CatalogResult<Vec<FileId>>;

    /// Look up replica locations for a batch of files.
    ///
    /// With `include_all_states` every replica is reported regardless of its
    /// state. Files the catalog knows nothing about may be omitted from the
    /// answer.
    async fn list_replicas(
        &self,
        files: &[FileId],
        include_all_states: bool,
    ) -> CatalogResult<Vec<ReplicaRecord>>;
}
