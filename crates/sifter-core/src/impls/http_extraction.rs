//! HTTP extraction client for OpenAI-compatible chat-completions endpoints.
//!
//! The request asks for JSON mode, parses the first choice's message content
//! as JSON, and validates it against the invoice shape before it is accepted
//! as a result. Provider-side hiccups (5xx, invalid JSON, schema drift) all
//! surface as [`ExtractionError`] and feed the task's retry policy.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ProviderConfig;
use crate::domain::invoice::validate_extraction;
use crate::domain::ExtractionError;
use crate::ports::ExtractionClient;

/// Invoice document text beyond this many characters is not sent to the
/// model; the interesting fields sit at the top of real invoices.
const MAX_PROMPT_CHARS: usize = 8000;

const SYSTEM_PROMPT: &str = "You are an expert invoice data extraction assistant. \
You only output valid JSON matching the provided schema.";

/// Condensed JSON schema of [`crate::domain::InvoiceData`], embedded in the
/// prompt so the model knows the exact field names and nesting.
const INVOICE_SCHEMA_JSON: &str = r##"{
  "type": "object",
  "properties": {
    "invoice_number": {"type": ["string", "null"], "description": "Main invoice identifier (e.g. 'Invoice Number', 'Rechnungsnummer')."},
    "invoice_date": {"type": ["string", "null"], "description": "Issue date, in the original format."},
    "due_date": {"type": ["string", "null"], "description": "Payment due date; may be inferred from payment terms."},
    "invoice_period": {"type": ["string", "null"], "description": "Billing period covered, if stated."},
    "vendor": {"$ref": "#/definitions/contact", "description": "Sender of the invoice."},
    "customer": {"$ref": "#/definitions/contact", "description": "Recipient ('To', 'Bill To')."},
    "line_items": {"type": ["array", "null"], "items": {"$ref": "#/definitions/line_item"}},
    "subtotal": {"type": ["number", "null"], "description": "Total before taxes."},
    "tax_amount": {"type": ["number", "null"]},
    "tax_rate": {"type": ["number", "string", "null"], "description": "As stated, e.g. '19 %'."},
    "total_amount": {"type": ["number", "null"], "description": "Final total including tax."},
    "currency": {"type": ["string", "null"], "description": "Symbol or code; infer if possible."},
    "payment_status": {"type": ["string", "null"]},
    "order_number": {"type": ["string", "null"]},
    "payment_terms_or_notes": {"type": ["string", "null"], "description": "Payment terms, bank details (IBAN/BIC), and other notes, concatenated."},
    "other_data": {"type": ["object", "null"], "description": "Relevant values with no matching field."}
  },
  "definitions": {
    "contact": {
      "type": ["object", "null"],
      "properties": {
        "name": {"type": ["string", "null"]},
        "address": {"type": ["string", "null"]},
        "email": {"type": ["string", "null"]},
        "phone": {"type": ["string", "null"]},
        "vat_id": {"type": ["string", "null"], "description": "VAT id (e.g. USt-IdNr.)."},
        "customer_id": {"type": ["string", "null"], "description": "Customer number (e.g. Kundennr.)."},
        "contact_person": {"type": ["string", "null"]},
        "other_data": {"type": ["object", "null"]}
      }
    },
    "line_item": {
      "type": "object",
      "properties": {
        "description": {"type": ["string", "null"]},
        "quantity": {"type": ["number", "string", "null"]},
        "unit_price": {"type": ["number", "null"]},
        "line_total": {"type": ["number", "null"], "description": "Line total before tax."},
        "other_data": {"type": ["object", "null"]}
      }
    }
  }
}"##;

/// Truncate on a char boundary; invoices are routinely non-ASCII.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

fn build_prompt(document_text: &str) -> String {
    format!(
        "You are an expert AI assistant specializing in extracting structured data from \
invoice documents, regardless of language (e.g. English, German).\n\
\n\
Analyze the invoice text and extract information according to the JSON schema below.\n\
\n\
CRITICAL INSTRUCTIONS:\n\
1. Output ONLY a single valid JSON object. No introductions, explanations, or code fences.\n\
2. Adhere strictly to the schema's structure, field names, and types, including the \
nested vendor, customer, and line_items objects.\n\
3. Use the field descriptions to map information even when the document's wording or \
language differs.\n\
4. If a field cannot be reliably determined, set it to null explicitly; never omit the key.\n\
5. Infer currency, due_date, and payment_status only when clearly derivable; otherwise null.\n\
6. Concatenate payment instructions, deadlines, and bank details into \
payment_terms_or_notes.\n\
7. Extract every distinct line item; line_total is the per-line total before tax.\n\
8. Put relevant values that match no schema field into the nearest other_data object, \
keyed by the source wording.\n\
\n\
Target JSON Schema:\n{schema}\n\
\n\
Invoice Text to Analyze:\n{text}\n\
\n\
JSON Output:",
        schema = INVOICE_SCHEMA_JSON,
        text = truncate_chars(document_text, MAX_PROMPT_CHARS),
    )
}

/// Pull the first choice's message content out of a chat-completions
/// response body.
fn parse_completion(payload: &Value) -> Result<&str, ExtractionError> {
    payload
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ExtractionError::MalformedResponse(
                "missing choices[0].message.content".to_string(),
            )
        })
}

/// Chat-completions based extraction client.
pub struct HttpExtractionClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl HttpExtractionClient {
    pub fn new(provider: &ProviderConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: provider.endpoint.trim_end_matches('/').to_string(),
            api_key: provider.api_key.clone(),
            model: provider.model.clone(),
        }
    }
}

#[async_trait]
impl ExtractionClient for HttpExtractionClient {
    async fn extract_structured(&self, text: &str) -> Result<Value, ExtractionError> {
        let body = serde_json::json!({
            "model": self.model,
            "response_format": {"type": "json_object"},
            "temperature": 0.1,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": build_prompt(text)},
            ],
        });

        let mut request = self
            .http
            .post(format!("{}/chat/completions", self.endpoint))
            .json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExtractionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractionError::Provider(format!("status {status}")));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ExtractionError::Transport(e.to_string()))?;

        let raw = parse_completion(&payload)?;
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| ExtractionError::InvalidJson(e.to_string()))?;
        validate_extraction(value)
    }

    fn name(&self) -> &str {
        "http"
    }
}
