//! sifter-core
//!
//! Asynchronous orchestration for document-extraction tasks: accept an
//! uploaded document, queue it, extract structured data in a bounded worker
//! pool, and answer status polls until the task reaches a terminal state.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, document, record, state, transition,
//!   view, invoice, errors）
//! - **ports**: 抽象化レイヤー（TaskStore, TaskQueue, DocumentNormalizer,
//!   ExtractionClient, Clock, IdGenerator）
//! - **impls**: 実装（in-memory store/queue, PDF/text normalizer,
//!   HTTP/canned extraction clients）
//! - **app**: アプリケーションロジック（orchestrator, worker pool,
//!   lease sweeper, retry policy, builder）
//! - **config**: 実行時設定（`SIFTER_*` 環境変数で上書き可能）
//!
//! # 並行制御の背骨
//! 可変な共有状態は TaskStore のレコードだけで、すべての遷移は
//! `compare_and_set`（期待状態を検証してから [`domain::Transition`] を適用）
//! を通ります。複数ワーカーや「ワーカー + lease スイーパー」が同じタスクを
//! 取り合っても、終端を書けるのはちょうど一人です。

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
