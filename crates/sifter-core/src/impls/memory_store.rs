//! In-memory task store.
//!
//! The default store for tests and single-process deployments. The trait in
//! `ports::task_store` is the seam for a durable backend; everything the
//! orchestration core relies on (the conditional update in particular) is
//! expressed there, not here.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{StoreError, TaskCounts, TaskId, TaskRecord, TaskState, Transition};
use crate::ports::{Clock, TaskStore};

/// HashMap-backed store. One lock guards the whole map; `compare_and_set`
/// does its read-verify-apply-write under that lock, which is what makes the
/// conditional update atomic here.
pub struct InMemoryTaskStore {
    clock: Arc<dyn Clock>,
    records: Mutex<HashMap<TaskId, TaskRecord>>,
}

impl InMemoryTaskStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            records: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, record: TaskRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        if records.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(record.id));
        }
        records.insert(record.id, record);
        Ok(())
    }

    async fn get(&self, id: TaskId) -> Result<TaskRecord, StoreError> {
        let records = self.records.lock().await;
        records.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    async fn compare_and_set(
        &self,
        id: TaskId,
        expected: TaskState,
        transition: Transition,
    ) -> Result<TaskRecord, StoreError> {
        let now = self.clock.now();
        let mut records = self.records.lock().await;
        let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if record.state != expected {
            return Err(StoreError::Conflict {
                expected,
                actual: record.state,
            });
        }

        transition.apply(record, now)?;
        Ok(record.clone())
    }

    async fn counts_by_state(&self) -> Result<TaskCounts, StoreError> {
        let records = self.records.lock().await;
        let mut counts = TaskCounts::default();
        for record in records.values() {
            match record.state {
                TaskState::Pending => counts.pending += 1,
                TaskState::Processing => counts.processing += 1,
                TaskState::Completed => counts.completed += 1,
                TaskState::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }

    async fn expired_leases(&self, now: DateTime<Utc>) -> Result<Vec<TaskId>, StoreError> {
        let records = self.records.lock().await;
        Ok(records
            .values()
            .filter(|record| record.lease_expired(now))
            .map(|record| record.id)
            .collect())
    }
}
