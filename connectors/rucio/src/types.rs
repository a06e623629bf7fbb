//! Rucio wire types.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use urc_core::{DatasetId, FileId, ReplicaRecord, ReplicaState};

use crate::error::{RucioError, RucioResult};

/// Data identifier as sent and received by the REST API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Did {
    pub scope: String,
    pub name: String,
}

impl From<&FileId> for Did {
    fn from(file: &FileId) -> Self {
        Self {
            scope: file.scope.clone(),
            name: file.name.clone(),
        }
    }
}

/// One line of `GET /replicas/rse/{rse}`.
///
/// Only the identifier is used; byte and file counts are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetReplica {
    pub scope: String,
    pub name: String,
}

impl From<DatasetReplica> for DatasetId {
    fn from(replica: DatasetReplica) -> Self {
        Self::new(replica.scope, replica.name)
    }
}

/// One line of `GET /dids/{scope}/{name}/files`.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetContent {
    pub scope: String,
    pub name: String,
}

impl From<DatasetContent> for FileId {
    fn from(content: DatasetContent) -> Self {
        Self::new(content.scope, content.name)
    }
}

/// Body of `POST /replicas/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ListReplicasRequest {
    pub dids: Vec<Did>,
    pub all_states: bool,
    pub ignore_availability: bool,
}

/// One line of `POST /replicas/list`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicaAnswer {
    pub scope: String,
    pub name: String,
    /// Endpoint to access URLs.
    #[serde(default)]
    pub rses: BTreeMap<String, Vec<String>>,
    /// Endpoint to replica state.
    #[serde(default)]
    pub states: BTreeMap<String, String>,
}

impl From<ReplicaAnswer> for ReplicaRecord {
    /// Endpoints listed under `rses` without a state are recorded as `UNKNOWN`.
    fn from(answer: ReplicaAnswer) -> Self {
        let mut locations: BTreeMap<String, ReplicaState> = answer
            .states
            .into_iter()
            .map(|(endpoint, state)| (endpoint, ReplicaState::parse(&state)))
            .collect();
        for endpoint in answer.rses.into_keys() {
            locations
                .entry(endpoint)
                .or_insert_with(|| ReplicaState::Other("UNKNOWN".into()));
        }
        Self {
            file: FileId::new(answer.scope, answer.name),
            locations,
        }
    }
}

/// Error body returned alongside non-2xx answers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(rename = "ExceptionClass")]
    pub exception_class: Option<String>,
    #[serde(rename = "ExceptionMessage")]
    pub exception_message: Option<String>,
}

/// Decode a JSON stream with one object per line. Blank lines are skipped.
///
/// # Errors
///
/// Returns [`RucioError::Decode`] with the offending line number.
pub fn parse_json_lines<T: DeserializeOwned>(body: &[u8]) -> RucioResult<Vec<T>> {
    body.split(|b| *b == b'\n')
        .enumerate()
        .filter(|(_, line)| !line.trim_ascii().is_empty())
        .map(|(index, line)| {
            serde_json::from_slice(line).map_err(|source| RucioError::Decode {
                line: index + 1,
                source,
            })
        })
        .collect()
}
