//! Generalized invoice shape: what structured extraction is expected to
//! produce.
//!
//! Every field is optional; real invoices differ wildly in language and
//! layout, and the model is instructed to emit `null` for anything it cannot
//! find. `other_data` maps catch values that do not fit a named field.
//!
//! This module is transport-agnostic: it only defines the shape and a
//! validation step that normalizes model output against it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::ExtractionError;

/// Contact details for either side of an invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    /// VAT identification number (e.g. USt-IdNr.), if stated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vat_id: Option<String>,

    /// Customer identification number (e.g. Kundennr.), if stated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_person: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_data: Option<Map<String, Value>>,
}

/// A quantity or rate as it appears on paper: `1`, `1.00`, or `"1 Stk."`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberOrText {
    Number(f64),
    Text(String),
}

/// One billed line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<NumberOrText>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,

    /// Total for this line before tax.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_total: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_data: Option<Map<String, Value>>,
}

/// A generalized, structured representation of common invoice data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,

    /// Issue date, in whatever format the document used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_period: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<ContactInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<ContactInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_items: Option<Vec<LineItem>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_amount: Option<f64>,

    /// Tax rate as stated: `19.0` or `"19 %"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<NumberOrText>,

    /// Final amount including tax.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,

    /// Payment terms, bank details (IBAN/BIC), and miscellaneous notes,
    /// concatenated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_terms_or_notes: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_data: Option<Map<String, Value>>,
}

/// Validate raw model output against the invoice shape.
///
/// Returns the normalized value (unknown top-level keys dropped, field types
/// checked). A mismatch is an extraction failure, so the retry policy gets a
/// chance to ask the model again.
pub fn validate_extraction(value: Value) -> Result<Value, ExtractionError> {
    let parsed: InvoiceData =
        serde_json::from_value(value).map_err(|e| ExtractionError::Schema(e.to_string()))?;
    serde_json::to_value(parsed).map_err(|e| ExtractionError::Schema(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_a_typical_extraction() {
        let value = json!({
            "invoice_number": "123100401",
            "invoice_date": "1. März 2024",
            "vendor": {
                "name": "CPB Software (Germany) GmbH",
                "vat_id": "DE199378386",
                "other_data": {"website": "https://www.examplevendor.com"}
            },
            "line_items": [
                {"description": "Basic Fee wmView", "quantity": 1, "unit_price": 130.00, "line_total": 130.00},
                {"description": "Transaction Fee T1", "quantity": 14, "unit_price": 0.58, "line_total": 8.12}
            ],
            "subtotal": 381.12,
            "tax_rate": "19 %",
            "total_amount": 453.53,
            "currency": "€"
        });

        let normalized = validate_extraction(value).unwrap();
        assert_eq!(normalized["invoice_number"], "123100401");
        assert_eq!(normalized["line_items"][1]["line_total"], 8.12);
        assert_eq!(normalized["tax_rate"], "19 %");
    }

    #[test]
    fn nulls_are_fine_anywhere() {
        let value = json!({
            "invoice_number": null,
            "vendor": null,
            "line_items": null
        });
        let normalized = validate_extraction(value).unwrap();
        // explicit nulls normalize to absent fields
        assert!(normalized.get("invoice_number").is_none());
    }

    #[test]
    fn quantity_may_be_text() {
        let value = json!({
            "line_items": [{"description": "Stundensatz", "quantity": "12 Std."}]
        });
        assert!(validate_extraction(value).is_ok());
    }

    #[test]
    fn rejects_wrongly_typed_fields() {
        let value = json!({"total_amount": "four hundred"});
        let err = validate_extraction(value).unwrap_err();
        assert!(matches!(err, ExtractionError::Schema(_)));
    }

    #[test]
    fn rejects_non_object_output() {
        let err = validate_extraction(json!("no JSON here, sorry")).unwrap_err();
        assert!(matches!(err, ExtractionError::Schema(_)));
    }
}
