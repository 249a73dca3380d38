//! DocumentNormalizer port - bytes → text
//!
//! ワーカーが attempt の最初に呼ぶ純関数です。I/O を持たないので同期 trait で
//! 十分。失敗（壊れた PDF、空のテキスト）は processing failure として retry
//! policy に回ります。

use crate::domain::{NormalizeError, StoredDocument};

/// Turn a stored document into plain text.
pub trait DocumentNormalizer: Send + Sync {
    fn extract_text(&self, document: &StoredDocument) -> Result<String, NormalizeError>;
}
