//! TaskStore port - タスクレコードの正本（source of truth）
//!
//! # 設計原則
//! - 状態・結果・エラー・attempts の正本はここ。Queue は TaskId しか持たない。
//! - すべての状態遷移は `compare_and_set` を通る（read-then-blind-write 禁止）。
//!   これが並行制御の背骨で、複数ワーカーや「ワーカー + lease スイーパー」が
//!   同じタスクを取り合っても、勝者はちょうど一人になります。
//! - 本番実装を別クレートに置けるよう、trait は外部技術に依存しません。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{StoreError, TaskCounts, TaskId, TaskRecord, TaskState, Transition};

/// Authoritative store for task records.
///
/// `compare_and_set` is the concurrency backbone: it atomically re-reads the
/// record, verifies it is still in `expected` state, applies one
/// [`Transition`], and writes the record back. If another actor transitioned
/// the record first, it fails with [`StoreError::Conflict`] and changes
/// nothing.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persist a freshly created record. Ids are never reused, so an existing
    /// record with the same id is an error.
    async fn create(&self, record: TaskRecord) -> Result<(), StoreError>;

    /// Read the current record.
    async fn get(&self, id: TaskId) -> Result<TaskRecord, StoreError>;

    /// Conditional update: verify `expected` state, apply `transition`,
    /// return the updated record.
    async fn compare_and_set(
        &self,
        id: TaskId,
        expected: TaskState,
        transition: Transition,
    ) -> Result<TaskRecord, StoreError>;

    /// Observability hook: counts per state.
    async fn counts_by_state(&self) -> Result<TaskCounts, StoreError>;

    /// Processing tasks whose lease expired at or before `now`
    /// (sweeper support).
    async fn expired_leases(&self, now: DateTime<Utc>) -> Result<Vec<TaskId>, StoreError>;
}
