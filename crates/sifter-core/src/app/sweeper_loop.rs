//! Lease sweeper: reclaims tasks from dead workers.
//!
//! ワーカーが claim の後・終端遷移の前に死ぬと、タスクは Processing のまま
//! 残ります。lease の期限が切れたものを見つけて、予算が残っていれば Pending に
//! 戻して再配送し、残っていなければ Failed で締めます。
//!
//! 「まだ生きている遅いワーカー」と競合しても問題ありません。どちらの遷移も
//! conditional update なので、勝つのはちょうど一人です。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::{StoreError, TaskFailure, TaskState, Transition};
use crate::ports::{Clock, TaskQueue, TaskStore};

/// Background loop handle, same shape as the worker pool.
pub struct LeaseSweeper {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl LeaseSweeper {
    pub fn spawn(
        store: Arc<dyn TaskStore>,
        queue: Arc<dyn TaskQueue>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                sweep_once(store.as_ref(), queue.as_ref(), clock.as_ref()).await;
            }
            debug!("lease sweeper exited");
        });

        Self { shutdown_tx, join }
    }

    pub async fn shutdown_and_join(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.join.await;
    }
}

/// One sweep over the store. Returns how many expired leases were acted on.
///
/// Public so tests (and operators' tooling) can run a sweep without the
/// timer loop.
pub async fn sweep_once(
    store: &dyn TaskStore,
    queue: &dyn TaskQueue,
    clock: &dyn Clock,
) -> usize {
    let now = clock.now();
    let expired = match store.expired_leases(now).await {
        Ok(ids) => ids,
        Err(e) => {
            warn!(error = %e, "lease sweep could not list expired leases");
            return 0;
        }
    };

    let mut handled = 0;
    for id in expired {
        let record = match store.get(id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(task_id = %id, error = %e, "lease sweep lost a record");
                continue;
            }
        };

        let failure = TaskFailure::lease_expired();
        if record.attempts < record.max_attempts {
            match store
                .compare_and_set(id, TaskState::Processing, Transition::Requeue { error: failure })
                .await
            {
                Ok(_) => {
                    warn!(task_id = %id, attempts = record.attempts, "expired lease, task requeued");
                    if let Err(e) = queue.enqueue(id).await {
                        warn!(task_id = %id, error = %e, "could not requeue reclaimed task");
                    }
                    handled += 1;
                }
                Err(StoreError::Conflict { actual, .. }) => {
                    // 競合はワーカーが先に終端を書いた形。それで正しい。
                    debug!(task_id = %id, state = ?actual, "lease sweep lost the race");
                }
                Err(e) => warn!(task_id = %id, error = %e, "lease sweep transition failed"),
            }
        } else {
            match store
                .compare_and_set(id, TaskState::Processing, Transition::Fail { error: failure })
                .await
            {
                Ok(_) => {
                    warn!(task_id = %id, attempts = record.attempts, "expired lease with no budget left, task failed");
                    handled += 1;
                }
                Err(StoreError::Conflict { actual, .. }) => {
                    debug!(task_id = %id, state = ?actual, "lease sweep lost the race");
                }
                Err(e) => warn!(task_id = %id, error = %e, "lease sweep transition failed"),
            }
        }
    }
    handled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FailureKind, MediaType, StoredDocument, TaskId, TaskRecord};
    use crate::impls::{InMemoryTaskQueue, InMemoryTaskStore};
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};
    use ulid::Ulid;

    struct Fixture {
        store: Arc<InMemoryTaskStore>,
        queue: Arc<InMemoryTaskQueue>,
        clock: Arc<FixedClock>,
    }

    fn fixture() -> Fixture {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(start));
        Fixture {
            store: Arc::new(InMemoryTaskStore::new(clock.clone())),
            queue: Arc::new(InMemoryTaskQueue::new()),
            clock,
        }
    }

    /// Create a task and claim it, as if a worker dequeued it and died.
    async fn abandoned_task(fx: &Fixture, attempts_used: u32, max_attempts: u32) -> TaskId {
        let id = TaskId::from_ulid(Ulid::new());
        let document = StoredDocument::new(MediaType::PlainText, None, b"invoice".to_vec());
        let mut record = TaskRecord::new(id, document, max_attempts, fx.clock.now());
        record.attempts = attempts_used.saturating_sub(1);
        fx.store.create(record).await.unwrap();
        fx.store
            .compare_and_set(
                id,
                TaskState::Pending,
                Transition::BeginAttempt {
                    lease_until: fx.clock.now() + chrono::Duration::seconds(90),
                },
            )
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn live_leases_are_left_alone() {
        let fx = fixture();
        let id = abandoned_task(&fx, 1, 3).await;

        let handled =
            sweep_once(fx.store.as_ref(), fx.queue.as_ref(), fx.clock.as_ref()).await;

        assert_eq!(handled, 0);
        assert_eq!(fx.store.get(id).await.unwrap().state, TaskState::Processing);
    }

    #[tokio::test]
    async fn expired_lease_with_budget_is_requeued() {
        let fx = fixture();
        let id = abandoned_task(&fx, 1, 3).await;

        fx.clock.advance(chrono::Duration::seconds(120));
        let handled =
            sweep_once(fx.store.as_ref(), fx.queue.as_ref(), fx.clock.as_ref()).await;

        assert_eq!(handled, 1);
        let record = fx.store.get(id).await.unwrap();
        assert_eq!(record.state, TaskState::Pending);
        assert_eq!(record.last_error.unwrap().kind, FailureKind::LeaseExpired);
        // 再配送されている
        assert_eq!(fx.queue.dequeue().await, Some(id));
    }

    #[tokio::test]
    async fn expired_lease_with_no_budget_fails_terminally() {
        let fx = fixture();
        let id = abandoned_task(&fx, 3, 3).await;

        fx.clock.advance(chrono::Duration::seconds(120));
        let handled =
            sweep_once(fx.store.as_ref(), fx.queue.as_ref(), fx.clock.as_ref()).await;

        assert_eq!(handled, 1);
        let record = fx.store.get(id).await.unwrap();
        assert_eq!(record.state, TaskState::Failed);
        assert_eq!(record.error.unwrap().kind, FailureKind::LeaseExpired);
    }

    #[tokio::test]
    async fn sweeping_twice_is_idempotent() {
        let fx = fixture();
        let id = abandoned_task(&fx, 1, 3).await;

        fx.clock.advance(chrono::Duration::seconds(120));
        sweep_once(fx.store.as_ref(), fx.queue.as_ref(), fx.clock.as_ref()).await;
        let second =
            sweep_once(fx.store.as_ref(), fx.queue.as_ref(), fx.clock.as_ref()).await;

        assert_eq!(second, 0);
        assert_eq!(fx.store.get(id).await.unwrap().state, TaskState::Pending);
    }
}
