//! HTTP DTOs for process endpoints.

use serde::{Deserialize, Serialize};

use crate::adapters::http::error::ErrorDetail;
use crate::application::{DeleteResult, UpsertResult};
use crate::domain::process::ProcessDefinition;

/// `DELETE /api/processes?id=..` or `?all=true`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteProcessesQuery {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub all: Option<bool>,
}

/// Which deletion a query asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    One(String),
    All,
}

impl DeleteProcessesQuery {
    /// `None` when the query names neither an id nor `all=true`.
    pub fn target(&self) -> Option<DeleteTarget> {
        if let Some(id) = self.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            return Some(DeleteTarget::One(id.to_string()));
        }
        match self.all {
            Some(true) => Some(DeleteTarget::All),
            _ => None,
        }
    }
}

/// Delete reply. On failure nothing is removed and `processes` is the
/// collection as it stands.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteProcessesResponse {
    pub success: bool,
    pub removed: usize,
    pub processes: Vec<ProcessDefinition>,
    #[serde(flatten)]
    pub error: Option<ErrorDetail>,
}

impl DeleteProcessesResponse {
    pub fn failed(processes: Vec<ProcessDefinition>, error: ErrorDetail) -> Self {
        Self {
            success: false,
            removed: 0,
            processes,
            error: Some(error),
        }
    }
}

impl From<DeleteResult> for DeleteProcessesResponse {
    fn from(result: DeleteResult) -> Self {
        Self {
            success: true,
            removed: result.removed,
            processes: result.processes,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpsertProcessesResponse {
    pub success: bool,
    pub inserted: usize,
    pub replaced: usize,
    pub upserted: Vec<ProcessDefinition>,
    pub processes: Vec<ProcessDefinition>,
    #[serde(flatten)]
    pub error: Option<ErrorDetail>,
}

impl UpsertProcessesResponse {
    pub fn failed(processes: Vec<ProcessDefinition>, error: ErrorDetail) -> Self {
        Self {
            success: false,
            inserted: 0,
            replaced: 0,
            upserted: Vec::new(),
            processes,
            error: Some(error),
        }
    }
}

impl From<UpsertResult> for UpsertProcessesResponse {
    fn from(result: UpsertResult) -> Self {
        Self {
            success: true,
            inserted: result.inserted,
            replaced: result.replaced,
            upserted: result.upserted,
            processes: result.processes,
            error: None,
        }
    }
}
