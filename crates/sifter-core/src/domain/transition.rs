//! The task state-machine transition table.
//!
//! リトライの判断を I/O から切り離すため、遷移そのものをデータにしています。
//! ワーカーやスイーパーは「どの遷移を適用したいか」を [`Transition`] として
//! ストアに渡し、ストアが conditional update の中で [`Transition::apply`] を
//! 呼びます。テーブルはここだけで完結しているので、ストアやワーカー抜きで
//! 単体テストできます。
//!
//! Table:
//! - Pending    --BeginAttempt--> Processing   (attempts += 1, lease issued)
//! - Processing --Complete------> Completed    (terminal, result recorded)
//! - Processing --Requeue-------> Pending      (only while attempts < max)
//! - Processing --Fail----------> Failed       (terminal, error recorded)

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::errors::TaskFailure;
use super::record::TaskRecord;
use super::state::TaskState;

/// One requested state transition, applied atomically by the store.
#[derive(Debug, Clone)]
pub enum Transition {
    /// Claim the task for one processing attempt.
    BeginAttempt { lease_until: DateTime<Utc> },

    /// Record the extraction result and finish.
    Complete { result: serde_json::Value },

    /// Give the task back to the queue for another attempt.
    Requeue { error: TaskFailure },

    /// Record the terminal error and finish.
    Fail { error: TaskFailure },
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::BeginAttempt { .. } => "begin_attempt",
            Transition::Complete { .. } => "complete",
            Transition::Requeue { .. } => "requeue",
            Transition::Fail { .. } => "fail",
        }
    }

    /// Apply this transition to a record, refusing anything outside the
    /// table above. Timestamps advance to `now` on success.
    pub fn apply(
        self,
        record: &mut TaskRecord,
        now: DateTime<Utc>,
    ) -> Result<(), InvalidTransition> {
        match (record.state, self) {
            (TaskState::Pending, Transition::BeginAttempt { lease_until }) => {
                if record.attempts >= record.max_attempts {
                    return Err(InvalidTransition::AttemptsExhausted {
                        attempts: record.attempts,
                        max_attempts: record.max_attempts,
                    });
                }
                record.begin_attempt(lease_until, now);
                Ok(())
            }
            (TaskState::Processing, Transition::Complete { result }) => {
                record.complete(result, now);
                Ok(())
            }
            (TaskState::Processing, Transition::Requeue { error }) => {
                if record.attempts >= record.max_attempts {
                    return Err(InvalidTransition::AttemptsExhausted {
                        attempts: record.attempts,
                        max_attempts: record.max_attempts,
                    });
                }
                record.requeue(error, now);
                Ok(())
            }
            (TaskState::Processing, Transition::Fail { error }) => {
                record.fail(error, now);
                Ok(())
            }
            (from, transition) => Err(InvalidTransition::Refused {
                from,
                attempted: transition.name(),
            }),
        }
    }
}

/// A transition outside the table. Terminal states are sinks; a task past
/// its attempt budget cannot be claimed or requeued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidTransition {
    #[error("cannot {attempted} a task in state {from:?}")]
    Refused {
        from: TaskState,
        attempted: &'static str,
    },

    #[error("attempt budget exhausted ({attempts}/{max_attempts})")]
    AttemptsExhausted { attempts: u32, max_attempts: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::{MediaType, StoredDocument};
    use crate::domain::errors::FailureKind;
    use crate::domain::ids::TaskId;
    use chrono::TimeZone;
    use rstest::rstest;
    use ulid::Ulid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn fresh_record(max_attempts: u32) -> TaskRecord {
        let doc = StoredDocument::new(MediaType::PlainText, None, b"three\nline\ninvoice".to_vec());
        TaskRecord::new(TaskId::from_ulid(Ulid::new()), doc, max_attempts, now())
    }

    fn processing_record(max_attempts: u32) -> TaskRecord {
        let mut record = fresh_record(max_attempts);
        Transition::BeginAttempt {
            lease_until: now() + chrono::Duration::seconds(90),
        }
        .apply(&mut record, now())
        .unwrap();
        record
    }

    fn failure() -> TaskFailure {
        TaskFailure {
            kind: FailureKind::Extraction,
            message: "provider error: status 503".to_string(),
        }
    }

    #[test]
    fn begin_attempt_claims_and_counts() {
        let mut record = fresh_record(3);
        let lease_until = now() + chrono::Duration::seconds(90);
        let later = now() + chrono::Duration::seconds(1);

        Transition::BeginAttempt { lease_until }
            .apply(&mut record, later)
            .unwrap();

        assert_eq!(record.state, TaskState::Processing);
        assert_eq!(record.attempts, 1);
        assert_eq!(record.lease_expires_at, Some(lease_until));
        assert_eq!(record.updated_at, later);
    }

    #[test]
    fn complete_records_result_and_clears_lease() {
        let mut record = processing_record(3);
        let result = serde_json::json!({"vendor": {"name": "ACME"}});

        Transition::Complete {
            result: result.clone(),
        }
        .apply(&mut record, now())
        .unwrap();

        assert_eq!(record.state, TaskState::Completed);
        assert_eq!(record.result, Some(result));
        assert!(record.error.is_none());
        assert!(record.lease_expires_at.is_none());
    }

    #[test]
    fn requeue_keeps_the_error_as_diagnostic_only() {
        let mut record = processing_record(3);

        Transition::Requeue { error: failure() }
            .apply(&mut record, now())
            .unwrap();

        assert_eq!(record.state, TaskState::Pending);
        assert_eq!(record.attempts, 1); // attempts count claims, not requeues
        assert!(record.error.is_none());
        assert_eq!(record.last_error, Some(failure()));
    }

    #[test]
    fn fail_records_the_error() {
        let mut record = processing_record(1);

        Transition::Fail { error: failure() }
            .apply(&mut record, now())
            .unwrap();

        assert_eq!(record.state, TaskState::Failed);
        assert_eq!(record.error, Some(failure()));
        assert!(record.result.is_none());
    }

    #[test]
    fn requeue_is_refused_once_the_budget_is_spent() {
        let mut record = processing_record(1);

        let err = Transition::Requeue { error: failure() }
            .apply(&mut record, now())
            .unwrap_err();

        assert_eq!(
            err,
            InvalidTransition::AttemptsExhausted {
                attempts: 1,
                max_attempts: 1
            }
        );
        // 遷移は拒否されてもレコードは無傷
        assert_eq!(record.state, TaskState::Processing);
    }

    #[test]
    fn claim_is_refused_once_the_budget_is_spent() {
        let mut record = fresh_record(1);
        record.attempts = 1; // as if a lease expired after the only attempt

        let err = Transition::BeginAttempt {
            lease_until: now() + chrono::Duration::seconds(90),
        }
        .apply(&mut record, now())
        .unwrap_err();

        assert!(matches!(err, InvalidTransition::AttemptsExhausted { .. }));
    }

    #[rstest]
    #[case::claim_completed(TaskState::Completed)]
    #[case::claim_failed(TaskState::Failed)]
    #[case::claim_processing(TaskState::Processing)]
    fn terminal_and_claimed_tasks_cannot_be_claimed(#[case] from: TaskState) {
        let mut record = fresh_record(3);
        record.state = from;

        let err = Transition::BeginAttempt {
            lease_until: now() + chrono::Duration::seconds(90),
        }
        .apply(&mut record, now())
        .unwrap_err();

        assert_eq!(
            err,
            InvalidTransition::Refused {
                from,
                attempted: "begin_attempt"
            }
        );
    }

    #[rstest]
    #[case::complete_pending(TaskState::Pending)]
    #[case::complete_completed(TaskState::Completed)]
    #[case::complete_failed(TaskState::Failed)]
    fn only_processing_tasks_can_finish(#[case] from: TaskState) {
        let mut record = fresh_record(3);
        record.state = from;

        let err = Transition::Complete {
            result: serde_json::json!({}),
        }
        .apply(&mut record, now())
        .unwrap_err();

        assert!(matches!(err, InvalidTransition::Refused { .. }));
    }
}
