//! Uploaded document: raw bytes plus the declared media type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Media types accepted at submission.
///
/// Anything else is rejected synchronously, before a task is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Pdf,
    PlainText,
}

impl MediaType {
    /// Parse a declared Content-Type. Parameters (`; charset=...`) are
    /// ignored; matching is case-insensitive.
    pub fn parse(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next().unwrap_or(content_type).trim();
        match essence.to_ascii_lowercase().as_str() {
            "application/pdf" => Some(Self::Pdf),
            "text/plain" => Some(Self::PlainText),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::PlainText => "text/plain",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The raw document as submitted, owned by the task record.
///
/// Immutable once stored; workers re-read it from the store on every attempt.
/// The bytes never leave the store through the status path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    pub media_type: MediaType,

    /// Original filename, if the uploader declared one. Echoed in status
    /// responses for operator convenience.
    pub filename: Option<String>,

    pub bytes: Vec<u8>,
}

impl StoredDocument {
    pub fn new(media_type: MediaType, filename: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            media_type,
            filename,
            bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::pdf("application/pdf", Some(MediaType::Pdf))]
    #[case::plain("text/plain", Some(MediaType::PlainText))]
    #[case::plain_with_charset("text/plain; charset=utf-8", Some(MediaType::PlainText))]
    #[case::uppercase("Application/PDF", Some(MediaType::Pdf))]
    #[case::padded("  text/plain  ", Some(MediaType::PlainText))]
    #[case::png("image/png", None)]
    #[case::html("text/html", None)]
    #[case::empty("", None)]
    fn parses_declared_content_types(#[case] declared: &str, #[case] expected: Option<MediaType>) {
        assert_eq!(MediaType::parse(declared), expected);
    }

    #[test]
    fn display_round_trips() {
        assert_eq!(
            MediaType::parse(&MediaType::Pdf.to_string()),
            Some(MediaType::Pdf)
        );
    }

    #[test]
    fn empty_document_is_detectable() {
        let doc = StoredDocument::new(MediaType::PlainText, None, Vec::new());
        assert!(doc.is_empty());
    }
}
