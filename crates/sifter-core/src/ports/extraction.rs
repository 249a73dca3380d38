//! ExtractionClient port - text → structured JSON
//!
//! 言語モデル呼び出しの抽象化。レート制限やプロバイダ固有のリトライは実装側の
//! 内部事情で、ここには成功か失敗しか出てきません。呼び出しは I/O バウンドで
//! 長く停止しうるので、ワーカーが attempt 全体に timeout を掛けます。

use async_trait::async_trait;

use crate::domain::ExtractionError;

/// Trait for structured data extraction from document text.
///
/// Implementations:
/// - `HttpExtractionClient`: OpenAI-style chat-completions endpoint.
/// - `CannedExtractionClient`: fixed payload for demos and deterministic
///   tests.
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    /// Extract structured data from normalized document text.
    async fn extract_structured(&self, text: &str) -> Result<serde_json::Value, ExtractionError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}
