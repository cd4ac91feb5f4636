//! Receipt field extraction using a vision LLM.
//!
//! This module provides the `ReceiptExtractor` struct which sends a receipt image to a
//! vision-capable model and validates the reply against the receipt schema. Validation
//! fails closed: any mismatch is a `MalformedResponse` rather than a silently
//! defaulted field.

use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::error::ReceiptError;
use crate::models::{MAX_TOTAL_DIGITS, ReceiptRecord, is_valid_total};
use crate::openai::VisionClientTrait;
use crate::source::ReceiptImage;

/// Categories suggested to the model. Replies may still name others.
pub const SUGGESTED_CATEGORIES: [&str; 6] = [
    "Meals",
    "Transport",
    "Lodging",
    "Office Supplies",
    "Entertainment",
    "Other",
];

/// The exact key set a reply object must carry.
const FIELDS: [&str; 4] = ["vendor", "date", "total", "category"];

/// Prompt template for receipt extraction.
const PROMPT_TEMPLATE: &str = r#"You are an information extraction system.
Extract ONLY the following fields from the receipt image:

vendor: the merchant or vendor name, as a string
date: the receipt date as a string, formatted YYYY-MM-DD when the full date is legible
total: the total amount paid, as a number without currency symbols
category: one of [{categories}]

Return EXACTLY one JSON object with these four keys and NOTHING ELSE.
Do not include explanations, comments, or formatting.
Do not wrap the JSON in markdown.
If a field cannot be determined, use null.

The output must be valid JSON."#;

/// Builds the extraction prompt.
pub fn build_prompt() -> String {
    PROMPT_TEMPLATE.replace("{categories}", &SUGGESTED_CATEGORIES.join(", "))
}

/// Builder for constructing `ReceiptExtractor` instances.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use receipts::extractor::ReceiptExtractorBuilder;
/// use receipts::openai::OpenAiClientBuilder;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = OpenAiClientBuilder::new().build()?;
/// let extractor = ReceiptExtractorBuilder::new()
///     .client(Arc::new(client))
///     .build();
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct ReceiptExtractorBuilder {
    client: Option<Arc<dyn VisionClientTrait>>,
}

impl ReceiptExtractorBuilder {
    /// Creates a new `ReceiptExtractorBuilder` with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the vision client used for extraction requests.
    pub fn client(mut self, client: Arc<dyn VisionClientTrait>) -> Self {
        self.client = Some(client);
        self
    }

    /// Builds the `ReceiptExtractor`.
    ///
    /// # Panics
    ///
    /// Panics if `client()` was not called before `build()`.
    #[must_use]
    pub fn build(self) -> ReceiptExtractor {
        ReceiptExtractor::new(self.client.expect("client must be set via client() method"))
    }
}

/// Turns one receipt image into a validated `ReceiptRecord`.
///
/// Every call is an independent request; the extractor keeps no state between images.
pub struct ReceiptExtractor {
    client: Arc<dyn VisionClientTrait>,
    prompt: String,
}

impl ReceiptExtractor {
    /// Creates a new `ReceiptExtractor` with the specified client.
    #[must_use]
    pub fn new(client: Arc<dyn VisionClientTrait>) -> Self {
        Self {
            client,
            prompt: build_prompt(),
        }
    }

    /// Extracts receipt fields from one image.
    ///
    /// # Errors
    ///
    /// Returns `ReceiptError::MalformedResponse` if the reply does not satisfy the
    /// schema, and the classified transport error (`Transient`, `Rejected` or
    /// `Fatal`) if the request itself fails.
    pub fn extract(&self, image: &ReceiptImage) -> Result<ReceiptRecord, ReceiptError> {
        let reply = self.client.complete(&self.prompt, image)?;
        parse_reply(&reply)
    }
}

/// Decodes a model reply into a record.
pub fn parse_reply(reply: &str) -> Result<ReceiptRecord, ReceiptError> {
    let json_str = extract_json(reply)
        .ok_or_else(|| ReceiptError::malformed("no JSON object found in model reply"))?;
    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| ReceiptError::malformed(format!("invalid JSON: {e}")))?;
    validate_record(&value)
}

/// Extracts the outermost JSON object from a reply.
///
/// Tolerates markdown code fences and explanatory text around the object.
fn extract_json(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;

    if start <= end {
        Some(&response[start..=end])
    } else {
        None
    }
}

/// Validates an untyped reply against the receipt schema.
fn validate_record(value: &Value) -> Result<ReceiptRecord, ReceiptError> {
    let obj = value
        .as_object()
        .ok_or_else(|| ReceiptError::malformed("expected a JSON object"))?;

    if let Some(extra) = obj.keys().find(|k| !FIELDS.contains(&k.as_str())) {
        return Err(ReceiptError::malformed(format!("unexpected key '{extra}'")));
    }

    let vendor = optional_string(obj, "vendor")?;
    let date = optional_string(obj, "date")?;
    let total = optional_total(obj)?;
    let category = optional_string(obj, "category")?;

    ReceiptRecord::new(vendor, date, total, category)
        .ok_or_else(|| ReceiptError::malformed("'total' is out of range"))
}

fn required<'a>(obj: &'a Map<String, Value>, key: &str) -> Result<&'a Value, ReceiptError> {
    obj.get(key)
        .ok_or_else(|| ReceiptError::malformed(format!("missing key '{key}'")))
}

/// Reads a string-or-null field. Blank strings count as unknown.
fn optional_string(obj: &Map<String, Value>, key: &str) -> Result<Option<String>, ReceiptError> {
    match required(obj, key)? {
        Value::Null => Ok(None),
        Value::String(s) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        other => Err(ReceiptError::malformed(format!(
            "'{key}' must be a string or null, got {other}"
        ))),
    }
}

/// Reads the `total` field as a non-negative decimal.
fn optional_total(obj: &Map<String, Value>) -> Result<Option<Decimal>, ReceiptError> {
    let total = match required(obj, "total")? {
        Value::Null => return Ok(None),
        Value::Number(n) => decimal_from_number(n),
        Value::String(s) => parse_amount(s),
        other => {
            return Err(ReceiptError::malformed(format!(
                "'total' must be a number or null, got {other}"
            )));
        }
    };

    let total =
        total.ok_or_else(|| ReceiptError::malformed("'total' is not a numeric amount"))?;
    if total < Decimal::ZERO {
        return Err(ReceiptError::malformed("'total' must not be negative"));
    }
    if !is_valid_total(total) {
        return Err(ReceiptError::malformed(format!(
            "'total' has more than {MAX_TOTAL_DIGITS} significant digits"
        )));
    }
    Ok(Some(total))
}

fn decimal_from_number(n: &serde_json::Number) -> Option<Decimal> {
    let text = n.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Parses an amount string such as `"$1,234.50"`.
///
/// Strips one leading currency symbol and thousands separators. Blank strings
/// are not amounts.
fn parse_amount(s: &str) -> Option<Decimal> {
    let trimmed = s.trim();
    let trimmed = trimmed
        .strip_prefix(['$', '€', '£'])
        .unwrap_or(trimmed)
        .trim();
    let cleaned: String = trimmed.chars().filter(|c| *c != ',').collect();
    Decimal::from_str(&cleaned).ok()
}
