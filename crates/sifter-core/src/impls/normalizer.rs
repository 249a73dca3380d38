//! Default document normalizer: PDF and plain text.

use crate::domain::{MediaType, NormalizeError, StoredDocument};
use crate::ports::DocumentNormalizer;

/// PDF text extraction plus tolerant plain-text decoding.
///
/// Plain text is decoded as UTF-8 first, falling back to Latin-1; uploads
/// from older accounting systems are routinely Latin-1.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNormalizer;

impl DefaultNormalizer {
    pub fn new() -> Self {
        Self
    }

    fn read_pdf(bytes: &[u8]) -> Result<String, NormalizeError> {
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| NormalizeError::Pdf(e.to_string()))
    }

    fn read_text(bytes: &[u8]) -> String {
        match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            // Latin-1 maps every byte to the code point of the same value.
            Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
        }
    }
}

impl DocumentNormalizer for DefaultNormalizer {
    fn extract_text(&self, document: &StoredDocument) -> Result<String, NormalizeError> {
        let text = match document.media_type {
            MediaType::Pdf => Self::read_pdf(&document.bytes)?,
            MediaType::PlainText => Self::read_text(&document.bytes),
        };

        if text.trim().is_empty() {
            return Err(NormalizeError::NoText);
        }
        Ok(text)
    }
}
