//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - 依存はここで一度だけ注入（process-wide singleton は作らない）
//! - build() 時に設定を検証し、動かない組み合わせは BuildError で即座に返す

use std::sync::Arc;

use crate::app::orchestrator::Orchestrator;
use crate::app::retry::RetryPolicy;
use crate::app::sweeper_loop::LeaseSweeper;
use crate::app::worker_loop::{WorkerContext, WorkerPool};
use crate::config::SifterConfig;
use crate::domain::{StatusError, StoreError, SubmitError, TaskCounts, TaskId, TaskView};
use crate::impls::{DefaultNormalizer, HttpExtractionClient, InMemoryTaskQueue, InMemoryTaskStore};
use crate::ports::{
    Clock, DocumentNormalizer, ExtractionClient, IdGenerator, SystemClock, TaskQueue, TaskStore,
    UlidGenerator,
};

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("worker pool size must be at least 1")]
    NoWorkers,

    #[error("max_attempts must be at least 1")]
    NoAttempts,

    #[error("per-attempt timeout must be non-zero")]
    ZeroAttemptTimeout,

    #[error(
        "lease timeout ({lease_secs}s) must exceed the attempt timeout ({attempt_secs}s); \
         otherwise the sweeper reclaims tasks from workers that are still running"
    )]
    LeaseInsideAttempt { lease_secs: u64, attempt_secs: u64 },
}

/// AppBuilder はアプリケーションを構築
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new(SifterConfig::from_env())
///     .extractor(Arc::new(CannedExtractionClient::sample_invoice()))
///     .build()?;
/// let id = app.submit(bytes, "text/plain", None).await?;
/// ```
///
/// 省略した依存にはデフォルトが入ります:
/// in-memory store/queue, PDF+text normalizer, HTTP extraction client,
/// system clock, ULID id generator.
pub struct AppBuilder {
    config: SifterConfig,
    store: Option<Arc<dyn TaskStore>>,
    queue: Option<Arc<dyn TaskQueue>>,
    normalizer: Option<Arc<dyn DocumentNormalizer>>,
    extractor: Option<Arc<dyn ExtractionClient>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl AppBuilder {
    pub fn new(config: SifterConfig) -> Self {
        Self {
            config,
            store: None,
            queue: None,
            normalizer: None,
            extractor: None,
            clock: None,
            ids: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn queue(mut self, queue: Arc<dyn TaskQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn normalizer(mut self, normalizer: Arc<dyn DocumentNormalizer>) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn ExtractionClient>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Validate the configuration, wire the components, and start the
    /// worker pool and lease sweeper. Must be called inside a tokio runtime.
    pub fn build(self) -> Result<App, BuildError> {
        let config = self.config;

        if config.workers == 0 {
            return Err(BuildError::NoWorkers);
        }
        if config.max_attempts == 0 {
            return Err(BuildError::NoAttempts);
        }
        if config.attempt_timeout_secs == 0 {
            return Err(BuildError::ZeroAttemptTimeout);
        }
        if config.lease_timeout_secs <= config.attempt_timeout_secs {
            return Err(BuildError::LeaseInsideAttempt {
                lease_secs: config.lease_timeout_secs,
                attempt_secs: config.attempt_timeout_secs,
            });
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryTaskStore::new(Arc::clone(&clock))));
        let queue = self
            .queue
            .unwrap_or_else(|| Arc::new(InMemoryTaskQueue::new()));
        let normalizer = self
            .normalizer
            .unwrap_or_else(|| Arc::new(DefaultNormalizer::new()));
        let extractor = self
            .extractor
            .unwrap_or_else(|| Arc::new(HttpExtractionClient::new(&config.provider)));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));

        let orchestrator = Orchestrator::new(
            Arc::clone(&store),
            Arc::clone(&queue),
            ids,
            Arc::clone(&clock),
            config.max_attempts,
        );

        let ctx = Arc::new(WorkerContext {
            store: Arc::clone(&store),
            queue: Arc::clone(&queue),
            normalizer,
            extractor,
            clock: Arc::clone(&clock),
            retry: RetryPolicy::from_config(&config),
            attempt_timeout: config.attempt_timeout(),
            lease_timeout: config.lease_timeout(),
        });
        let pool = WorkerPool::spawn(config.workers, ctx);
        let sweeper = LeaseSweeper::spawn(
            Arc::clone(&store),
            Arc::clone(&queue),
            clock,
            config.sweep_interval(),
        );

        Ok(App {
            orchestrator,
            store,
            queue,
            pool,
            sweeper,
        })
    }
}

/// The wired, running system: orchestrator API in front, worker pool and
/// lease sweeper behind.
pub struct App {
    orchestrator: Orchestrator,
    store: Arc<dyn TaskStore>,
    queue: Arc<dyn TaskQueue>,
    pool: WorkerPool,
    sweeper: LeaseSweeper,
}

impl App {
    pub async fn submit(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        filename: Option<String>,
    ) -> Result<TaskId, SubmitError> {
        self.orchestrator.submit(bytes, content_type, filename).await
    }

    pub async fn get_status(&self, id: TaskId) -> Result<TaskView, StatusError> {
        self.orchestrator.get_status(id).await
    }

    pub async fn counts(&self) -> Result<TaskCounts, StoreError> {
        self.store.counts_by_state().await
    }

    /// Graceful shutdown: close the queue (workers stop taking new leases),
    /// let in-flight attempts finish or time out, then stop the sweeper.
    pub async fn shutdown(self) {
        self.queue.shutdown().await;
        self.pool.shutdown_and_join().await;
        self.sweeper.shutdown_and_join().await;
    }
}
