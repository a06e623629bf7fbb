//! In-memory catalog for testing the audit engine.
//!
//! Answers the three catalog operations from scripted data and lets tests inject
//! the failure modes a real catalog exhibits: missing endpoints and datasets,
//! transient batch failures, omitted replica entries, panics, and latency.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use urc_core::{
    CatalogClient, CatalogError, CatalogResult, DatasetId, FileId, ReplicaRecord, ReplicaState,
};

/// Scripted behavior of a file-listing call.
#[derive(Debug, Clone)]
pub enum Fault {
    /// Return this error.
    Error(CatalogError),
    /// Panic inside the call.
    Panic,
}

#[derive(Debug, Default)]
struct MockState {
    endpoints: BTreeMap<String, Vec<DatasetId>>,
    files: HashMap<DatasetId, Vec<FileId>>,
    replicas: HashMap<FileId, BTreeMap<String, ReplicaState>>,
    file_listing_faults: HashMap<DatasetId, Fault>,
    failing_files: HashSet<FileId>,
    omitted: HashSet<FileId>,
    endpoint_fault: Option<CatalogError>,
    replica_batches: Vec<usize>,
}

/// A mock replica catalog.
///
/// Safe to share between tasks; call counts and peak concurrency are recorded
/// for assertions.
#[derive(Debug, Default)]
pub struct MockCatalog {
    state: Mutex<MockState>,
    latency: Duration,
    dataset_calls: AtomicUsize,
    file_calls: AtomicUsize,
    replica_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Tracks one in-flight call; decrements on drop, including on panic or abort.
struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scripting
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a dataset at `endpoint` with its file list.
    #[must_use]
    pub fn with_dataset(
        self,
        endpoint: &str,
        dataset: DatasetId,
        files: impl IntoIterator<Item = FileId>,
    ) -> Self {
        {
            let mut state = self.state.lock();
            state
                .endpoints
                .entry(endpoint.to_string())
                .or_default()
                .push(dataset.clone());
            state.files.insert(dataset, files.into_iter().collect());
        }
        self
    }

    /// Register an endpoint with no datasets.
    #[must_use]
    pub fn with_endpoint(self, endpoint: &str) -> Self {
        self.state
            .lock()
            .endpoints
            .entry(endpoint.to_string())
            .or_default();
        self
    }

    /// Set the replica locations of a file.
    #[must_use]
    pub fn with_replicas<'s>(
        self,
        file: FileId,
        locations: impl IntoIterator<Item = (&'s str, &'s str)>,
    ) -> Self {
        let locations = locations
            .into_iter()
            .map(|(endpoint, state)| (endpoint.to_string(), ReplicaState::parse(state)))
            .collect();
        self.state.lock().replicas.insert(file, locations);
        self
    }

    /// Make every file of `files` AVAILABLE at each of `endpoints`.
    #[must_use]
    pub fn with_available(self, files: &[FileId], endpoints: &[&str]) -> Self {
        {
            let mut state = self.state.lock();
            for file in files {
                let locations = endpoints
                    .iter()
                    .map(|e| ((*e).to_string(), ReplicaState::Available))
                    .collect();
                state.replicas.insert(file.clone(), locations);
            }
        }
        self
    }

    /// Script the file-listing call of one dataset.
    #[must_use]
    pub fn with_file_listing_fault(self, dataset: DatasetId, fault: Fault) -> Self {
        self.state.lock().file_listing_faults.insert(dataset, fault);
        self
    }

    /// Fail, transiently, every replica batch that contains `file`.
    #[must_use]
    pub fn fail_replica_batches_containing(self, file: FileId) -> Self {
        self.state.lock().failing_files.insert(file);
        self
    }

    /// Leave `file` out of replica answers even though it was asked for.
    #[must_use]
    pub fn omit_from_replica_answers(self, file: FileId) -> Self {
        self.state.lock().omitted.insert(file);
        self
    }

    /// Fail the dataset enumeration call.
    #[must_use]
    pub fn with_endpoint_fault(self, error: CatalogError) -> Self {
        self.state.lock().endpoint_fault = Some(error);
        self
    }

    /// Delay every call by `latency`.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accounting
    // ─────────────────────────────────────────────────────────────────────────

    /// Number of dataset enumeration calls.
    #[must_use]
    pub fn dataset_calls(&self) -> usize {
        self.dataset_calls.load(Ordering::SeqCst)
    }

    /// Number of file-listing calls.
    #[must_use]
    pub fn file_calls(&self) -> usize {
        self.file_calls.load(Ordering::SeqCst)
    }

    /// Number of replica lookups.
    #[must_use]
    pub fn replica_calls(&self) -> usize {
        self.replica_calls.load(Ordering::SeqCst)
    }

    /// Total calls of any kind.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.dataset_calls() + self.file_calls() + self.replica_calls()
    }

    /// Highest number of calls that were in progress at the same time.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Size of every replica batch received, in call order.
    #[must_use]
    pub fn replica_batch_sizes(&self) -> Vec<usize> {
        self.state.lock().replica_batches.clone()
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl CatalogClient for MockCatalog {
    async fn list_datasets_at(&self, endpoint: &str) -> CatalogResult<Vec<DatasetId>> {
        self.dataset_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight::enter(&self.in_flight, &self.max_in_flight);
        self.delay().await;

        let state = self.state.lock();
        if let Some(error) = &state.endpoint_fault {
            return Err(error.clone());
        }
        state
            .endpoints
            .get(endpoint)
            .cloned()
            .ok_or_else(|| CatalogError::EndpointNotFound {
                endpoint: endpoint.to_string(),
            })
    }

    async fn list_files(&self, dataset: &DatasetId) -> CatalogResult<Vec<FileId>> {
        self.file_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight::enter(&self.in_flight, &self.max_in_flight);
        self.delay().await;

        let fault = self.state.lock().file_listing_faults.get(dataset).cloned();
        match fault {
            Some(Fault::Error(error)) => return Err(error),
            Some(Fault::Panic) => panic!("scripted panic while listing {dataset}"),
            None => {}
        }

        self.state
            .lock()
            .files
            .get(dataset)
            .cloned()
            .ok_or_else(|| CatalogError::DatasetNotFound {
                scope: dataset.scope.clone(),
                name: dataset.name.clone(),
            })
    }

    async fn list_replicas(
        &self,
        files: &[FileId],
        include_all_states: bool,
    ) -> CatalogResult<Vec<ReplicaRecord>> {
        self.replica_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight::enter(&self.in_flight, &self.max_in_flight);
        self.delay().await;

        let mut state = self.state.lock();
        state.replica_batches.push(files.len());

        if let Some(bad) = files.iter().find(|f| state.failing_files.contains(*f)) {
            return Err(CatalogError::transient(format!(
                "scripted failure for batch containing {bad}"
            )));
        }

        let records = files
            .iter()
            .filter(|f| !state.omitted.contains(*f))
            .filter_map(|f| {
                let locations = state.replicas.get(f)?;
                let locations = locations
                    .iter()
                    .filter(|(_, s)| include_all_states || s.is_available())
                    .map(|(e, s)| (e.clone(), s.clone()))
                    .collect();
                Some(ReplicaRecord {
                    file: f.clone(),
                    locations,
                })
            })
            .collect();
        Ok(records)
    }
}
