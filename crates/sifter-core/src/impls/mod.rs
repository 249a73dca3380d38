//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryTaskStore / InMemoryTaskQueue**: 単一プロセス用（開発・テスト）
//! - **DefaultNormalizer**: PDF / plain text のテキスト抽出
//! - **HttpExtractionClient**: OpenAI 互換 chat-completions プロバイダ
//! - **CannedExtractionClient**: 決定的なスタブ
//!
//! # 本番用実装
//! 永続ストアや Redis 系キューは ports の trait を実装した別クレートに
//! 置く想定です。

pub mod canned;
pub mod http_extraction;
pub mod memory_queue;
pub mod memory_store;
pub mod normalizer;

pub use self::canned::CannedExtractionClient;
pub use self::http_extraction::HttpExtractionClient;
pub use self::memory_queue::InMemoryTaskQueue;
pub use self::memory_store::InMemoryTaskStore;
pub use self::normalizer::DefaultNormalizer;
