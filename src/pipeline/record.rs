// The `record` module defines the structured data extracted from a document
// and the decoding of raw LLM completions into it.

use chrono::Local;
use serde::{Deserialize, Serialize};

/// The document types the extraction prompt asks the model to choose from.
///
/// Anything the model invents outside this set collapses to [`DocumentType::Other`],
/// which classifies as `Uncategorized` downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    Invoice,
    Receipt,
    #[serde(rename = "Purchase Order", alias = "PurchaseOrder")]
    PurchaseOrder,
    #[serde(other)]
    Other,
}

/// A monetary total as reported by the model: a number, free text such as
/// `"N/A"`, or nothing at all.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Number(f64),
    Text(String),
    Missing,
}

impl Default for Amount {
    fn default() -> Self {
        Amount::Missing
    }
}

impl Amount {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Amount::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// The normalized record extracted from document text.
///
/// Every field is optional on the wire: the model may omit fields, emit
/// `null`, or emit junk types. Accessors apply the documented defaults so
/// consumers never have to handle absence themselves.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StructuredRecord {
    #[serde(default)]
    pub document_type: Option<DocumentType>,
    #[serde(default)]
    pub vendor_name: Option<String>,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub document_date: Option<String>,
    #[serde(default)]
    pub total_amount: Amount,
}

impl StructuredRecord {
    /// The vendor name, or `"UnknownVendor"` when the model gave none.
    pub fn vendor_name(&self) -> &str {
        self.vendor_name.as_deref().unwrap_or("UnknownVendor")
    }

    /// The document identifier, or `"NoID"` when the model gave none.
    pub fn document_id(&self) -> &str {
        self.document_id.as_deref().unwrap_or("NoID")
    }

    /// The document date as an ISO-8601 string, defaulting to today.
    pub fn document_date(&self) -> String {
        self.document_date
            .clone()
            .unwrap_or_else(|| Local::now().format("%Y-%m-%d").to_string())
    }
}

/// Strips a single markdown code fence wrapping `raw`, if present.
///
/// Models frequently return ```` ```json { ... } ``` ```` even when asked
/// for bare JSON. Only the outermost fence is removed; fence markers inside
/// the body are left alone.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // The opening fence line may carry an info string ("json").
    let Some(newline) = after_open.find('\n') else {
        return trimmed;
    };
    let body = after_open[newline + 1..].trim_end();
    body.strip_suffix("```").map(str::trim_end).unwrap_or(body)
}

/// Decodes a raw LLM completion into a [`StructuredRecord`].
pub fn parse_record(raw: &str) -> Result<StructuredRecord, serde_json::Error> {
    serde_json::from_str(strip_code_fence(raw))
}
