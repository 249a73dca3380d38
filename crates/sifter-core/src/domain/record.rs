//! Task record: metadata + stored document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::document::StoredDocument;
use super::errors::TaskFailure;
use super::ids::TaskId;
use super::state::TaskState;

/// The authoritative record for one extraction task.
///
/// Design:
/// - This is the single source of truth for task state; it lives in the
///   store and nowhere else.
/// - Queue structures hold TaskId only; workers re-read the record from the
///   store before acting.
/// - Mutation goes through [`super::transition::Transition::apply`], which is
///   the only caller of the `pub(crate)` methods below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub state: TaskState,

    /// Raw upload; immutable once set.
    pub document: StoredDocument,

    /// Number of processing attempts started so far (including the one in
    /// flight while Processing).
    pub attempts: u32,

    /// Attempt budget; reaching it forces a terminal Failed state.
    pub max_attempts: u32,

    /// Present only when `state == Completed`.
    pub result: Option<serde_json::Value>,

    /// Present only when `state == Failed`.
    pub error: Option<TaskFailure>,

    /// Most recent attempt failure, kept while the task is still retrying.
    /// Diagnostic only; status views never expose it for non-failed tasks.
    pub last_error: Option<TaskFailure>,

    /// Set while Processing. Once it passes, the sweeper may reclaim the
    /// task from a dead worker.
    pub lease_expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn new(
        id: TaskId,
        document: StoredDocument,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            state: TaskState::Pending,
            document,
            attempts: 0,
            max_attempts,
            result: None,
            error: None,
            last_error: None,
            lease_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark as processing (increments attempts, issues a lease).
    pub(crate) fn begin_attempt(&mut self, lease_until: DateTime<Utc>, now: DateTime<Utc>) {
        self.state = TaskState::Processing;
        self.attempts += 1;
        self.lease_expires_at = Some(lease_until);
        self.updated_at = now;
    }

    /// Mark as completed with the extraction result.
    pub(crate) fn complete(&mut self, result: serde_json::Value, now: DateTime<Utc>) {
        self.state = TaskState::Completed;
        self.result = Some(result);
        self.lease_expires_at = None;
        self.updated_at = now;
    }

    /// Move back to pending for another attempt.
    pub(crate) fn requeue(&mut self, error: TaskFailure, now: DateTime<Utc>) {
        self.state = TaskState::Pending;
        self.last_error = Some(error);
        self.lease_expires_at = None;
        self.updated_at = now;
    }

    /// Mark as failed permanently.
    pub(crate) fn fail(&mut self, error: TaskFailure, now: DateTime<Utc>) {
        self.state = TaskState::Failed;
        self.last_error = Some(error.clone());
        self.error = Some(error);
        self.lease_expires_at = None;
        self.updated_at = now;
    }

    /// Has this task's processing lease expired?
    pub fn lease_expired(&self, now: DateTime<Utc>) -> bool {
        self.state == TaskState::Processing && self.lease_expires_at.is_some_and(|at| at <= now)
    }
}
