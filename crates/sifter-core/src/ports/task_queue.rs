//! TaskQueue port - ペンディングな TaskId の受け渡し
//!
//! Queue は TaskId のみを流します（状態や payload は含まない）。
//! ワーカーは必ずストアからレコードを読み直してから動くので、Queue に
//! 古い ID が残っていても害はありません（claim が Conflict で落ちるだけ）。

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::{QueueError, TaskId};

/// FIFO hand-off of task identifiers from submission to workers.
///
/// Ordering is approximate FIFO: a retried task lands at the back, never the
/// front. Delivery is at-least-once when combined with the lease sweeper, so
/// workers must tolerate re-runs.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue a task id. Never blocks; fails only after shutdown.
    async fn enqueue(&self, id: TaskId) -> Result<(), QueueError>;

    /// Enqueue a task id to become visible after `delay` (retry backoff).
    /// Once due it lands behind whatever is ready at that moment.
    async fn enqueue_after(&self, id: TaskId, delay: Duration) -> Result<(), QueueError>;

    /// Take the next task id, suspending the caller while the queue is
    /// empty. Returns `None` once the queue is shut down.
    async fn dequeue(&self) -> Option<TaskId>;

    /// Shut down: wake all blocked dequeuers with `None` and refuse further
    /// enqueues.
    async fn shutdown(&self);
}
