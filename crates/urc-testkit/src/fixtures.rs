//! Test fixtures for dataset and file identifiers.

use urc_core::{DatasetId, FileId};

/// Create a dataset identifier.
#[must_use]
pub fn dataset(scope: &str, name: &str) -> DatasetId {
    DatasetId::new(scope, name)
}

/// Create a file identifier.
#[must_use]
pub fn file(scope: &str, name: &str) -> FileId {
    FileId::new(scope, name)
}

/// Create `count` files named `<prefix>_<index>` in `scope`.
#[must_use]
pub fn files(scope: &str, prefix: &str, count: usize) -> Vec<FileId> {
    (0..count)
        .map(|i| FileId::new(scope, format!("{prefix}_{i:05}")))
        .collect()
}
