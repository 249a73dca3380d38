//! Orchestrator: task creation and status queries.
//!
//! HTTP 層はこの外側にあり、ここには `submit` / `get_status` の2つの操作だけが
//! 見えています。どちらも処理の完了を待ちません。

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::{
    MediaType, StatusError, StoreError, StoredDocument, SubmitError, TaskId, TaskRecord, TaskView,
};
use crate::ports::{Clock, IdGenerator, TaskQueue, TaskStore};

/// Creates tasks and answers status queries by reading the store.
///
/// All collaborators are injected at construction time; there is no hidden
/// process-wide state.
pub struct Orchestrator {
    store: Arc<dyn TaskStore>,
    queue: Arc<dyn TaskQueue>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn TaskStore>,
        queue: Arc<dyn TaskQueue>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        max_attempts: u32,
    ) -> Self {
        Self {
            store,
            queue,
            ids,
            clock,
            max_attempts,
        }
    }

    /// Validate, persist a pending record, and enqueue its id.
    ///
    /// Returns as soon as the id is on the queue; processing happens in the
    /// worker pool. One new record, one enqueue, nothing else.
    pub async fn submit(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        filename: Option<String>,
    ) -> Result<TaskId, SubmitError> {
        let media_type = MediaType::parse(content_type)
            .ok_or_else(|| SubmitError::UnsupportedMediaType(content_type.to_string()))?;

        if bytes.is_empty() {
            return Err(SubmitError::EmptyDocument);
        }

        let id = self.ids.generate_task_id();
        let document = StoredDocument::new(media_type, filename, bytes);
        let record = TaskRecord::new(id, document, self.max_attempts, self.clock.now());

        self.store.create(record).await?;
        if let Err(e) = self.queue.enqueue(id).await {
            // レコードは残るが、キューに乗らなかったことは submit の失敗
            warn!(task_id = %id, error = %e, "task stored but could not be queued");
            return Err(e.into());
        }

        info!(task_id = %id, media_type = %media_type, "task accepted");
        Ok(id)
    }

    /// Read-only projection of the current record. Never blocks on
    /// processing.
    pub async fn get_status(&self, id: TaskId) -> Result<TaskView, StatusError> {
        match self.store.get(id).await {
            Ok(record) => Ok(TaskView::from(&record)),
            Err(StoreError::NotFound(_)) => Err(StatusError::NotFound(id)),
            Err(e) => Err(StatusError::Store(e)),
        }
    }
}
