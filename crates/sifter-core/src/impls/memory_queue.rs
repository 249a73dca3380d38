//! In-memory task queue.

use std::collections::{BinaryHeap, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::domain::{QueueError, TaskId};
use crate::ports::TaskQueue;

/// Scheduled entry for the retry-backoff heap.
///
/// We use Reverse ordering so BinaryHeap acts as a min-heap (earliest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScheduledEntry {
    due: Instant,
    id: TaskId,
}

impl PartialOrd for ScheduledEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse ordering: earlier times have higher priority
        other.due.cmp(&self.due)
    }
}

struct QueueState {
    /// Ready ids, FIFO.
    ready: VecDeque<TaskId>,

    /// Delayed ids (retry backoff); promoted to `ready` once due, so they
    /// land behind whatever is ready at that moment.
    scheduled: BinaryHeap<ScheduledEntry>,

    closed: bool,
}

impl QueueState {
    fn new() -> Self {
        Self {
            ready: VecDeque::new(),
            scheduled: BinaryHeap::new(),
            closed: false,
        }
    }

    /// Move scheduled ids into the ready queue if their time has come.
    fn promote_scheduled(&mut self, now: Instant) {
        while let Some(entry) = self.scheduled.peek() {
            if entry.due > now {
                break; // Heap is sorted, so we can stop
            }
            let entry = self.scheduled.pop().expect("peeked entry must exist");
            self.ready.push_back(entry.id);
        }
    }
}

/// Mutex + Notify based queue for a single process.
///
/// Only identifiers travel through here; the store remains the source of
/// truth for everything else.
pub struct InMemoryTaskQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::new()),
            notify: Notify::new(),
        }
    }
}

impl Default for InMemoryTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, id: TaskId) -> Result<(), QueueError> {
        {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(QueueError::Closed);
            }
            state.ready.push_back(id);
        }
        // Notify outside the lock
        self.notify.notify_one();
        Ok(())
    }

    async fn enqueue_after(&self, id: TaskId, delay: Duration) -> Result<(), QueueError> {
        {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(QueueError::Closed);
            }
            state.scheduled.push(ScheduledEntry {
                due: Instant::now() + delay,
                id,
            });
        }
        // 眠っている dequeuer に起床時刻を計算し直させる
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self) -> Option<TaskId> {
        loop {
            // Register interest before checking state, so a shutdown or
            // enqueue between the check and the await cannot be missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next_due = {
                let mut state = self.state.lock().await;
                if state.closed {
                    return None;
                }
                state.promote_scheduled(Instant::now());
                if let Some(id) = state.ready.pop_front() {
                    return Some(id);
                }
                state.scheduled.peek().map(|entry| entry.due)
            };

            // Wait for a notification OR the next scheduled due time
            match next_due {
                Some(due) => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = tokio::time::sleep_until(due.into()) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    async fn shutdown(&self) {
        {
            let mut state = self.state.lock().await;
            state.closed = true;
        }
        self.notify.notify_waiters();
    }
}
