//! Thread-safe accumulation of unique files and run statistics.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Run counters.
///
/// Field order is alphabetical so serialized reports have sorted keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Datasets enumerated at the endpoint.
    pub datasets_found: u64,
    /// Datasets whose batches were all attempted.
    pub datasets_processed: u64,
    /// Failed catalog calls, weighted by the files they covered.
    pub errors: u64,
    /// Files for which a replica record was evaluated.
    pub files_checked: u64,
    /// Datasets with no files, or that no longer exist.
    pub skipped: u64,
    /// Distinct files whose only AVAILABLE copy is at the endpoint.
    pub unique_files_found: u64,
}

/// Counters that may be bumped directly.
///
/// `unique_files_found` is absent on purpose: it only moves together with a
/// registry insert, through [`Aggregator::record_unique`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    DatasetsFound,
    DatasetsProcessed,
    FilesChecked,
    Errors,
    Skipped,
}

impl RunStats {
    fn slot(&mut self, counter: Counter) -> &mut u64 {
        match counter {
            Counter::DatasetsFound => &mut self.datasets_found,
            Counter::DatasetsProcessed => &mut self.datasets_processed,
            Counter::FilesChecked => &mut self.files_checked,
            Counter::Errors => &mut self.errors,
            Counter::Skipped => &mut self.skipped,
        }
    }

    /// Read a counter.
    #[must_use]
    pub const fn get(&self, counter: Counter) -> u64 {
        match counter {
            Counter::DatasetsFound => self.datasets_found,
            Counter::DatasetsProcessed => self.datasets_processed,
            Counter::FilesChecked => self.files_checked,
            Counter::Errors => self.errors,
            Counter::Skipped => self.skipped,
        }
    }
}

/// Point-in-time copy of everything the aggregator holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditSnapshot {
    /// Counters.
    pub stats: RunStats,
    /// Scope to unique file names.
    pub unique_files: BTreeMap<String, BTreeSet<String>>,
}

impl AuditSnapshot {
    /// Number of unique files across all scopes.
    #[must_use]
    pub fn unique_count(&self) -> usize {
        self.unique_files.values().map(BTreeSet::len).sum()
    }
}

#[derive(Debug, Default)]
struct Inner {
    stats: RunStats,
    unique_files: BTreeMap<String, BTreeSet<String>>,
}

/// Owner of the unique-file registry and run statistics.
///
/// Every mutation happens inside one critical section, so a reader never sees
/// a unique-file count without the matching registry entry.
#[derive(Debug, Default)]
pub struct Aggregator {
    inner: Mutex<Inner>,
}

impl Aggregator {
    /// Create an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a unique file.
    ///
    /// Returns `true` if the file was not yet registered. Inserting the same
    /// file again changes nothing, so `unique_files_found` always equals the
    /// registry size.
    pub fn record_unique(&self, scope: &str, name: &str) -> bool {
        let mut inner = self.inner.lock();
        let inserted = inner
            .unique_files
            .entry(scope.to_string())
            .or_default()
            .insert(name.to_string());
        if inserted {
            inner.stats.unique_files_found += 1;
        }
        inserted
    }

    /// Add `delta` to a counter.
    pub fn increment(&self, counter: Counter, delta: u64) {
        if delta == 0 {
            return;
        }
        let mut inner = self.inner.lock();
        let slot = inner.stats.slot(counter);
        *slot = slot.saturating_add(delta);
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> RunStats {
        self.inner.lock().stats
    }

    /// Consistent copy of counters and registry.
    #[must_use]
    pub fn snapshot(&self) -> AuditSnapshot {
        let inner = self.inner.lock();
        AuditSnapshot {
            stats: inner.stats,
            unique_files: inner.unique_files.clone(),
        }
    }
}
