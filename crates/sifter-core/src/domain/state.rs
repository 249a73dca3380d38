//! Task state machine.

use serde::{Deserialize, Serialize};

/// Task state.
///
/// State transitions:
/// - Pending -> Processing -> Completed
/// - Pending -> Processing -> Pending (bounded retry, attempts < max_attempts)
/// - Pending -> Processing -> Failed (attempts exhausted, or a lease expires
///   with no attempt budget left)
///
/// Design note: Using an enum ensures exhaustive matching and prevents invalid
/// states. The transition table itself lives in [`super::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting in the queue for a worker.
    Pending,

    /// Claimed by a worker, attempt in flight.
    Processing,

    /// Extraction succeeded; the record carries a result.
    Completed,

    /// Failed permanently; the record carries a structured error.
    Failed,
}

impl TaskState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }

    /// Is this task claimable by a worker?
    pub fn is_claimable(self) -> bool {
        matches!(self, TaskState::Pending)
    }
}
