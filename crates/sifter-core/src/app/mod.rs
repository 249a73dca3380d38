//! App - アプリケーション層
//!
//! ports を組み合わせてオーケストレーションを実装します。
//!
//! # 主要コンポーネント
//! - **Orchestrator**: submit / get_status
//! - **WorkerPool**: claim→normalize→extract→finalize のループ × N
//! - **LeaseSweeper**: lease 期限切れの回収（at-least-once の要）
//! - **RetryPolicy**: 失敗時のバックオフ
//! - **AppBuilder**: ワイヤリングと起動時検証

pub mod builder;
pub mod orchestrator;
pub mod retry;
pub mod sweeper_loop;
pub mod worker_loop;

pub use self::builder::{App, AppBuilder, BuildError};
pub use self::orchestrator::Orchestrator;
pub use self::retry::RetryPolicy;
pub use self::sweeper_loop::{sweep_once, LeaseSweeper};
pub use self::worker_loop::{WorkerContext, WorkerPool};
