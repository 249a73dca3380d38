//! Canned extraction client（開発用・テスト用）
//!
//! プロバイダなしでパイプライン全体を決定的に動かすためのスタブです。

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::ExtractionError;
use crate::ports::ExtractionClient;

/// Always returns the same payload, whatever the input text.
pub struct CannedExtractionClient {
    result: Value,
}

impl CannedExtractionClient {
    pub fn new(result: Value) -> Self {
        Self { result }
    }

    /// A representative extraction result for demos and tests.
    pub fn sample_invoice() -> Self {
        Self::new(sample_result())
    }
}

/// Fixture payload shaped like a real extraction.
pub fn sample_result() -> Value {
    serde_json::json!({
        "invoice_number": "123100401",
        "invoice_date": "1. März 2024",
        "vendor": {
            "name": "CPB Software (Germany) GmbH",
            "address": "Im Bruch 3 - 63897 Miltenberg/Main",
            "vat_id": "DE199378386",
            "contact_person": "Stefanie Müller"
        },
        "customer": {
            "name": "Musterkunde AG",
            "customer_id": "12345"
        },
        "line_items": [
            {"description": "Basic Fee wmView", "quantity": 1, "unit_price": 130.00, "line_total": 130.00},
            {"description": "Transaction Fee T1", "quantity": 14, "unit_price": 0.58, "line_total": 8.12},
            {"description": "Transaction Fee T3", "quantity": 162, "unit_price": 1.50, "line_total": 243.00}
        ],
        "subtotal": 381.12,
        "tax_amount": 72.41,
        "tax_rate": "19 %",
        "total": 453.53,
        "total_amount": 453.53,
        "currency": "€"
    })
}

#[async_trait]
impl ExtractionClient for CannedExtractionClient {
    async fn extract_structured(&self, _text: &str) -> Result<Value, ExtractionError> {
        Ok(self.result.clone())
    }

    fn name(&self) -> &str {
        "canned"
    }
}
