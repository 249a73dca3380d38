//! Read-only projections for status queries and observability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::TaskFailure;
use super::ids::TaskId;
use super::record::TaskRecord;
use super::state::TaskState;

/// What a polling client sees.
///
/// Carries `result` only for completed tasks and `error` only for failed
/// ones; the raw document bytes never appear here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskView {
    pub id: TaskId,
    pub state: TaskState,
    pub attempts: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskFailure>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&TaskRecord> for TaskView {
    fn from(record: &TaskRecord) -> Self {
        Self {
            id: record.id,
            state: record.state,
            attempts: record.attempts,
            filename: record.document.filename.clone(),
            result: record.result.clone(),
            error: record.error.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Store-wide counts by state, for logs and dashboards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}
