//! Replica states and per-file replica records.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::FileId;

/// Availability state of one replica at one endpoint.
///
/// Parsed from the catalog's state names or their single-letter codes.
/// States this crate does not know are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReplicaState {
    Available,
    Unavailable,
    Copying,
    BeingDeleted,
    Bad,
    TemporaryUnavailable,
    Other(String),
}

impl ReplicaState {
    /// Parse a state name or code.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "AVAILABLE" | "A" => Self::Available,
            "UNAVAILABLE" | "U" => Self::Unavailable,
            "COPYING" | "C" => Self::Copying,
            "BEING_DELETED" | "B" => Self::BeingDeleted,
            "BAD" | "D" => Self::Bad,
            "TEMPORARY_UNAVAILABLE" | "T" => Self::TemporaryUnavailable,
            _ => Self::Other(raw.to_string()),
        }
    }

    /// Canonical name as used by the catalog.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Available => "AVAILABLE",
            Self::Unavailable => "UNAVAILABLE",
            Self::Copying => "COPYING",
            Self::BeingDeleted => "BEING_DELETED",
            Self::Bad => "BAD",
            Self::TemporaryUnavailable => "TEMPORARY_UNAVAILABLE",
            Self::Other(s) => s,
        }
    }

    /// Whether the replica is currently readable.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

impl fmt::Display for ReplicaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ReplicaState {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl Serialize for ReplicaState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ReplicaState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Replica locations of one file across the federation.
///
/// Produced fresh per catalog query and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaRecord {
    /// The file these replicas belong to.
    pub file: FileId,
    /// Endpoint name to replica state.
    pub locations: BTreeMap<String, ReplicaState>,
}

impl ReplicaRecord {
    /// Create a record from `(endpoint, state)` pairs.
    pub fn new<I, E, S>(file: FileId, locations: I) -> Self
    where
        I: IntoIterator<Item = (E, S)>,
        E: Into<String>,
        S: Into<ReplicaState>,
    {
        Self {
            file,
            locations: locations
                .into_iter()
                .map(|(endpoint, state)| (endpoint.into(), state.into()))
                .collect(),
        }
    }

    /// State at the given endpoint, if the file has a replica there.
    #[must_use]
    pub fn state_at(&self, endpoint: &str) -> Option<&ReplicaState> {
        self.locations.get(endpoint)
    }

    /// Endpoints holding an AVAILABLE replica, in name order.
    pub fn available_endpoints(&self) -> impl Iterator<Item = &str> {
        self.locations
            .iter()
            .filter(|(_, state)| state.is_available())
            .map(|(endpoint, _)| endpoint.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_codes() {
        assert_eq!(ReplicaState::parse("AVAILABLE"), ReplicaState::Available);
        assert_eq!(ReplicaState::parse("a"), ReplicaState::Available);
        assert_eq!(ReplicaState::parse("COPYING"), ReplicaState::Copying);
        assert_eq!(
            ReplicaState::parse("TEMPORARY_UNAVAILABLE"),
            ReplicaState::TemporaryUnavailable
        );
        assert_eq!(
            ReplicaState::parse("QUARANTINED"),
            ReplicaState::Other("QUARANTINED".into())
        );
    }

    #[test]
    fn serde_uses_catalog_names() {
        let json = serde_json::to_string(&ReplicaState::BeingDeleted).unwrap();
        assert_eq!(json, "\"BEING_DELETED\"");
        let back: ReplicaState = serde_json::from_str("\"UNAVAILABLE\"").unwrap();
        assert_eq!(back, ReplicaState::Unavailable);
    }

    #[test]
    fn available_endpoints_filters_by_state() {
        let record = ReplicaRecord::new(
            FileId::new("mc16", "f1"),
            [("X", "AVAILABLE"), ("Y", "COPYING"), ("Z", "AVAILABLE")],
        );
        let available: Vec<_> = record.available_endpoints().collect();
        assert_eq!(available, vec!["X", "Z"]);
        assert_eq!(record.state_at("Y"), Some(&ReplicaState::Copying));
        assert_eq!(record.state_at("W"), None);
    }
}
