//! Error taxonomy.
//!
//! 同期的にクライアントへ返るもの（submit/status）と、ワーカー内で回収される
//! もの（claim 競合・処理失敗）をここで分類します。
//!
//! - [`SubmitError`], [`StatusError`]: surfaced synchronously to callers.
//! - [`StoreError::Conflict`]: recovered locally by workers and the sweeper,
//!   never surfaced.
//! - [`ProcessingError`]: folded into the retry policy; after the attempt
//!   budget is spent it becomes the task's terminal [`TaskFailure`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use super::ids::TaskId;
use super::state::TaskState;
use super::transition::InvalidTransition;

/// Task store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("task {0} already exists")]
    AlreadyExists(TaskId),

    /// Another actor changed the record first. Exactly one conditional update
    /// wins under a race; losers see this and abandon their iteration.
    #[error("state changed concurrently (expected {expected:?}, found {actual:?})")]
    Conflict {
        expected: TaskState,
        actual: TaskState,
    },

    #[error("refused transition: {0}")]
    InvalidTransition(#[from] InvalidTransition),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Task queue errors.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue is shut down")]
    Closed,

    #[error("queue unavailable: {0}")]
    Unavailable(String),
}

/// Synchronous submission errors (the caller's 4xx/5xx equivalents).
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("unsupported media type \"{0}\" (accepted: application/pdf, text/plain)")]
    UnsupportedMediaType(String),

    #[error("received empty document")]
    EmptyDocument,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Synchronous status-query errors.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error(transparent)]
    Store(StoreError),
}

/// Text extraction (normalization) errors.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("no text could be extracted from the document")]
    NoText,

    #[error("failed to read PDF content: {0}")]
    Pdf(String),
}

/// Structured-extraction (language model) errors.
///
/// Transport details stay as strings so the port does not leak a particular
/// HTTP client into the domain.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("transport: {0}")]
    Transport(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("model returned invalid JSON: {0}")]
    InvalidJson(String),

    #[error("extraction did not match the invoice schema: {0}")]
    Schema(String),

    #[error("malformed completion payload: {0}")]
    MalformedResponse(String),
}

/// One failed processing attempt, as seen by the worker loop.
///
/// Collaborator errors never escape the worker; they are converted to a
/// [`TaskFailure`] and fed to the retry policy.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("normalize: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("extraction: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("attempt timed out after {0:?}")]
    AttemptTimeout(Duration),
}

/// Classification of a terminal failure, for clients and operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Normalize,
    Extraction,
    Timeout,
    LeaseExpired,
}

/// Structured error recorded on a failed task (and kept as `last_error`
/// between retries).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TaskFailure {
    pub fn lease_expired() -> Self {
        Self {
            kind: FailureKind::LeaseExpired,
            message: "worker lease expired before a terminal state was recorded".to_string(),
        }
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl From<ProcessingError> for TaskFailure {
    fn from(err: ProcessingError) -> Self {
        let kind = match &err {
            ProcessingError::Normalize(_) => FailureKind::Normalize,
            ProcessingError::Extraction(_) => FailureKind::Extraction,
            ProcessingError::AttemptTimeout(_) => FailureKind::Timeout,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}
