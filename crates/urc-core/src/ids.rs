//! Namespace-qualified identifiers for datasets and files.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a dataset: a `(scope, name)` pair supplied by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DatasetId {
    /// Owning namespace.
    pub scope: String,
    /// Dataset name, unique within its scope.
    pub name: String,
}

impl DatasetId {
    /// Create a new dataset identifier.
    #[must_use]
    pub fn new(scope: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.name)
    }
}

/// Identifier of one file in the federation: a `(scope, name)` pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId {
    /// Owning namespace.
    pub scope: String,
    /// File name, unique within its scope.
    pub name: String,
}

impl FileId {
    /// Create a new file identifier.
    #[must_use]
    pub fn new(scope: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.name)
    }
}
