//! Worker pool: claim → normalize → extract → finalize.
//!
//! ワーカーは対称でステートレス。1イテレーションで1タスクだけを扱い、
//! 途中の状態は全部ストア側にあります。クラッシュしてもタスクは lease 切れで
//! スイーパーが回収するので、ここでは「やりかけを抱え込まない」ことだけを
//! 守ります。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::retry::RetryPolicy;
use crate::domain::{
    ProcessingError, StoreError, TaskFailure, TaskId, TaskRecord, TaskState, Transition,
};
use crate::ports::{Clock, DocumentNormalizer, ExtractionClient, TaskQueue, TaskStore};

/// Everything a worker needs, injected once at spawn time.
pub struct WorkerContext {
    pub store: Arc<dyn TaskStore>,
    pub queue: Arc<dyn TaskQueue>,
    pub normalizer: Arc<dyn DocumentNormalizer>,
    pub extractor: Arc<dyn ExtractionClient>,
    pub clock: Arc<dyn Clock>,
    pub retry: RetryPolicy,

    /// Budget for one normalize+extract attempt. A hung provider call must
    /// not hold a worker indefinitely.
    pub attempt_timeout: Duration,

    /// How long a claim stays valid before the sweeper may reclaim it.
    pub lease_timeout: chrono::Duration,
}

/// Worker pool handle.
/// - `request_shutdown()` を呼ぶと新しい dequeue を止める
/// - `shutdown_and_join()` で全ワーカーの終了を待てる
pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `n` workers.
    pub fn spawn(n: usize, ctx: Arc<WorkerContext>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let ctx = Arc::clone(&ctx);
            let mut rx = shutdown_rx.clone();

            let join = tokio::spawn(async move {
                worker_loop(worker_id, ctx, &mut rx).await;
            });
            joins.push(join);
        }

        Self { shutdown_tx, joins }
    }

    /// Request shutdown for all workers.
    /// This does not forcibly cancel in-flight attempts; they finish (or
    /// time out) and then the worker exits.
    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            let _ = join.await;
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    ctx: Arc<WorkerContext>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // dequeue は「待つ」ので select で shutdown と競合させる
        let id = tokio::select! {
            _ = shutdown_rx.changed() => {
                continue;
            }
            id = ctx.queue.dequeue() => id,
        };

        let Some(id) = id else {
            // Queue が shut down した
            break;
        };

        process_one(worker_id, &ctx, id).await;
    }
    debug!(worker = worker_id, "worker exited");
}

/// Handle one dequeued id. Every failure path ends in a store transition;
/// nothing propagates to submit/status callers.
async fn process_one(worker_id: usize, ctx: &WorkerContext, id: TaskId) {
    // Claim: Pending -> Processing. Losing the race just means another
    // worker (or the sweeper already requeued and someone else) got it.
    let lease_until = ctx.clock.now() + ctx.lease_timeout;
    let claimed = match ctx
        .store
        .compare_and_set(id, TaskState::Pending, Transition::BeginAttempt { lease_until })
        .await
    {
        Ok(record) => record,
        Err(StoreError::Conflict { actual, .. }) => {
            debug!(worker = worker_id, task_id = %id, state = ?actual, "claim lost, abandoning");
            return;
        }
        Err(e) => {
            warn!(worker = worker_id, task_id = %id, error = %e, "claim failed");
            return;
        }
    };

    let attempt = claimed.attempts;
    debug!(
        worker = worker_id,
        task_id = %id,
        attempt,
        max_attempts = claimed.max_attempts,
        extractor = ctx.extractor.name(),
        "attempt started"
    );

    match run_attempt(ctx, &claimed).await {
        Ok(result) => {
            match ctx
                .store
                .compare_and_set(id, TaskState::Processing, Transition::Complete { result })
                .await
            {
                Ok(_) => info!(worker = worker_id, task_id = %id, attempt, "task completed"),
                Err(StoreError::Conflict { actual, .. }) => {
                    // lease 切れでスイーパーに回収された後に attempt が成功した形。
                    // 結果は捨てる（再実行側が勝つ）。
                    debug!(worker = worker_id, task_id = %id, state = ?actual, "finalize lost");
                }
                Err(e) => warn!(worker = worker_id, task_id = %id, error = %e, "finalize failed"),
            }
        }
        Err(err) => {
            let failure = TaskFailure::from(err);
            finalize_failure(worker_id, ctx, id, attempt, claimed.max_attempts, failure).await;
        }
    }
}

/// One normalize+extract attempt under the per-attempt timeout.
async fn run_attempt(
    ctx: &WorkerContext,
    record: &TaskRecord,
) -> Result<serde_json::Value, ProcessingError> {
    let pipeline = async {
        let text = ctx
            .normalizer
            .extract_text(&record.document)
            .map_err(ProcessingError::Normalize)?;
        ctx.extractor
            .extract_structured(&text)
            .await
            .map_err(ProcessingError::Extraction)
    };

    match tokio::time::timeout(ctx.attempt_timeout, pipeline).await {
        Ok(result) => result,
        Err(_) => Err(ProcessingError::AttemptTimeout(ctx.attempt_timeout)),
    }
}

/// Failed attempt: requeue with backoff while budget remains, else fail
/// terminally.
async fn finalize_failure(
    worker_id: usize,
    ctx: &WorkerContext,
    id: TaskId,
    attempt: u32,
    max_attempts: u32,
    failure: TaskFailure,
) {
    if attempt < max_attempts {
        match ctx
            .store
            .compare_and_set(
                id,
                TaskState::Processing,
                Transition::Requeue {
                    error: failure.clone(),
                },
            )
            .await
        {
            Ok(_) => {
                let delay = ctx.retry.next_delay(attempt);
                info!(
                    worker = worker_id,
                    task_id = %id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %failure,
                    "attempt failed, retrying"
                );
                if let Err(e) = ctx.queue.enqueue_after(id, delay).await {
                    warn!(worker = worker_id, task_id = %id, error = %e, "requeue failed");
                }
            }
            Err(StoreError::Conflict { actual, .. }) => {
                debug!(worker = worker_id, task_id = %id, state = ?actual, "requeue lost");
            }
            Err(e) => warn!(worker = worker_id, task_id = %id, error = %e, "requeue failed"),
        }
    } else {
        match ctx
            .store
            .compare_and_set(
                id,
                TaskState::Processing,
                Transition::Fail {
                    error: failure.clone(),
                },
            )
            .await
        {
            Ok(_) => {
                warn!(worker = worker_id, task_id = %id, attempt, error = %failure, "task failed permanently");
            }
            Err(StoreError::Conflict { actual, .. }) => {
                debug!(worker = worker_id, task_id = %id, state = ?actual, "fail transition lost");
            }
            Err(e) => warn!(worker = worker_id, task_id = %id, error = %e, "fail transition failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExtractionError, FailureKind, MediaType, StoredDocument};
    use crate::impls::{CannedExtractionClient, DefaultNormalizer, InMemoryTaskQueue, InMemoryTaskStore};
    use crate::ports::SystemClock;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use ulid::Ulid;

    /// Fails the first `n` calls, then succeeds with the canned payload.
    struct FlakyExtractor {
        remaining_failures: AtomicU32,
    }

    impl FlakyExtractor {
        fn new(n: u32) -> Self {
            Self {
                remaining_failures: AtomicU32::new(n),
            }
        }
    }

    #[async_trait]
    impl ExtractionClient for FlakyExtractor {
        async fn extract_structured(
            &self,
            _text: &str,
        ) -> Result<serde_json::Value, ExtractionError> {
            let left = self.remaining_failures.load(Ordering::Relaxed);
            if left > 0 {
                self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
                return Err(ExtractionError::Provider(format!(
                    "intentional failure (left={left})"
                )));
            }
            Ok(crate::impls::canned::sample_result())
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    /// Never answers within any reasonable attempt timeout.
    struct HungExtractor;

    #[async_trait]
    impl ExtractionClient for HungExtractor {
        async fn extract_structured(
            &self,
            _text: &str,
        ) -> Result<serde_json::Value, ExtractionError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!("the attempt timeout must fire first")
        }

        fn name(&self) -> &str {
            "hung"
        }
    }

    fn context(extractor: Arc<dyn ExtractionClient>) -> Arc<WorkerContext> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Arc::new(WorkerContext {
            store: Arc::new(InMemoryTaskStore::new(clock.clone())),
            queue: Arc::new(InMemoryTaskQueue::new()),
            normalizer: Arc::new(DefaultNormalizer::new()),
            extractor,
            clock,
            retry: RetryPolicy::immediate(),
            attempt_timeout: Duration::from_millis(200),
            lease_timeout: chrono::Duration::seconds(90),
        })
    }

    async fn seed_task(ctx: &WorkerContext, max_attempts: u32) -> TaskId {
        let id = TaskId::from_ulid(Ulid::new());
        let document = StoredDocument::new(
            MediaType::PlainText,
            Some("invoice-042.txt".to_string()),
            b"ACME Tools Ltd.\nWidget x3 @ 19.90\nTotal: 59.70 EUR".to_vec(),
        );
        let record = TaskRecord::new(id, document, max_attempts, ctx.clock.now());
        ctx.store.create(record).await.unwrap();
        ctx.queue.enqueue(id).await.unwrap();
        id
    }

    async fn wait_terminal(ctx: &WorkerContext, id: TaskId) -> TaskRecord {
        for _ in 0..400 {
            let record = ctx.store.get(id).await.unwrap();
            if record.state.is_terminal() {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task never reached a terminal state");
    }

    #[tokio::test]
    async fn completes_a_task_end_to_end() {
        let ctx = context(Arc::new(CannedExtractionClient::sample_invoice()));
        let pool = WorkerPool::spawn(2, Arc::clone(&ctx));

        let id = seed_task(&ctx, 3).await;
        let record = wait_terminal(&ctx, id).await;

        assert_eq!(record.state, TaskState::Completed);
        assert_eq!(record.attempts, 1);
        let result = record.result.unwrap();
        assert!(result["vendor"].is_object());
        assert_eq!(result["total"], 453.53);
        assert!(result["line_items"].is_array());

        ctx.queue.shutdown().await;
        pool.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn always_failing_extraction_fails_after_exactly_max_attempts() {
        // u32::MAX 回失敗する = 常に失敗
        let ctx = context(Arc::new(FlakyExtractor::new(u32::MAX)));
        let pool = WorkerPool::spawn(1, Arc::clone(&ctx));

        let id = seed_task(&ctx, 3).await;
        let record = wait_terminal(&ctx, id).await;

        assert_eq!(record.state, TaskState::Failed);
        assert_eq!(record.attempts, 3); // never fewer, never more
        let error = record.error.unwrap();
        assert_eq!(error.kind, FailureKind::Extraction);

        ctx.queue.shutdown().await;
        pool.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn success_on_second_attempt_reports_two_attempts() {
        let ctx = context(Arc::new(FlakyExtractor::new(1)));
        let pool = WorkerPool::spawn(1, Arc::clone(&ctx));

        let id = seed_task(&ctx, 3).await;
        let record = wait_terminal(&ctx, id).await;

        assert_eq!(record.state, TaskState::Completed);
        assert_eq!(record.attempts, 2);

        ctx.queue.shutdown().await;
        pool.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn success_on_the_last_allowed_attempt_still_completes() {
        let ctx = context(Arc::new(FlakyExtractor::new(2)));
        let pool = WorkerPool::spawn(1, Arc::clone(&ctx));

        let id = seed_task(&ctx, 3).await;
        let record = wait_terminal(&ctx, id).await;

        assert_eq!(record.state, TaskState::Completed);
        assert_eq!(record.attempts, 3);

        ctx.queue.shutdown().await;
        pool.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn hung_provider_times_out_and_fails_the_task() {
        let ctx = context(Arc::new(HungExtractor));
        let pool = WorkerPool::spawn(1, Arc::clone(&ctx));

        let id = seed_task(&ctx, 1).await;
        let record = wait_terminal(&ctx, id).await;

        assert_eq!(record.state, TaskState::Failed);
        assert_eq!(record.error.unwrap().kind, FailureKind::Timeout);

        ctx.queue.shutdown().await;
        pool.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn unextractable_document_fails_with_normalize_error() {
        let ctx = context(Arc::new(CannedExtractionClient::sample_invoice()));
        let pool = WorkerPool::spawn(1, Arc::clone(&ctx));

        // 空白だけのテキスト: submit の空チェックは通るが normalize で落ちる
        let id = TaskId::from_ulid(Ulid::new());
        let document = StoredDocument::new(MediaType::PlainText, None, b"  \n\t\n ".to_vec());
        let record = TaskRecord::new(id, document, 2, ctx.clock.now());
        ctx.store.create(record).await.unwrap();
        ctx.queue.enqueue(id).await.unwrap();

        let record = wait_terminal(&ctx, id).await;
        assert_eq!(record.state, TaskState::Failed);
        assert_eq!(record.error.unwrap().kind, FailureKind::Normalize);

        ctx.queue.shutdown().await;
        pool.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn claim_conflict_abandons_the_iteration() {
        let ctx = context(Arc::new(CannedExtractionClient::sample_invoice()));

        // 先にタスクを Processing にしてから id を流す（他ワーカーが取った形）
        let id = seed_task(&ctx, 3).await;
        assert_eq!(ctx.queue.dequeue().await, Some(id));
        ctx.store
            .compare_and_set(
                id,
                TaskState::Pending,
                Transition::BeginAttempt {
                    lease_until: ctx.clock.now() + chrono::Duration::seconds(90),
                },
            )
            .await
            .unwrap();
        ctx.queue.enqueue(id).await.unwrap();

        let pool = WorkerPool::spawn(1, Arc::clone(&ctx));
        tokio::time::sleep(Duration::from_millis(100)).await;

        // ワーカーは手を出していない: まだ Processing のまま、attempt も1回分だけ
        let record = ctx.store.get(id).await.unwrap();
        assert_eq!(record.state, TaskState::Processing);
        assert_eq!(record.attempts, 1);

        ctx.queue.shutdown().await;
        pool.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn pool_shuts_down_cleanly() {
        let ctx = context(Arc::new(CannedExtractionClient::sample_invoice()));
        let pool = WorkerPool::spawn(4, Arc::clone(&ctx));

        ctx.queue.shutdown().await;
        tokio::time::timeout(Duration::from_secs(1), pool.shutdown_and_join())
            .await
            .expect("workers must exit after queue shutdown");
    }
}
