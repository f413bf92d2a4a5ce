// The `extract` module turns a downloaded file into text and text into a
// structured record.

use std::path::Path;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::llm::{LLM, LLMError};
use crate::pipeline::record::{StructuredRecord, parse_record};
use crate::utils::template::{TEngine, TEngineError};

/// The `ExtractError` enum covers both extraction stages. Every variant is
/// absorbed by the orchestrator as a degradation, never a crash.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to read document: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported document format: {0}")]
    Unsupported(String),
    #[error("Document is not valid text")]
    NotText,
    #[error(transparent)]
    Llm(#[from] LLMError),
    #[error("Malformed extraction response: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Template(#[from] TEngineError),
}

/// Converts a local file into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

/// Extracts text from documents that already are text.
///
/// Binary formats (pdf, images) need a hosted extraction service behind the
/// same trait; here they are an extraction failure and the document files
/// as `Uncategorized` under its original name.
pub struct PlainTextExtractor;

const TEXT_EXTENSIONS: [&str; 7] = ["txt", "md", "csv", "json", "xml", "html", "htm"];

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !TEXT_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ExtractError::Unsupported(extension));
        }

        let bytes = fs::read(path).await?;
        String::from_utf8(bytes).map_err(|_| ExtractError::NotText)
    }
}

/// The prompt asking the model for the structured record. Rendered with the
/// document text; the answer must be a bare JSON object, though fenced
/// answers are tolerated by the parser.
const EXTRACTION_TEMPLATE: &str = "\
You are a document data extractor. Read the document below and respond with \
a single JSON object and nothing else. Fields:
  \"document_type\": one of \"Invoice\", \"Receipt\", \"Purchase Order\", \"Other\"
  \"vendor_name\": the issuing company or person
  \"document_id\": the invoice/receipt/order number
  \"document_date\": the document date as YYYY-MM-DD
  \"total_amount\": the total as a number, or \"N/A\" if absent

Omit any field you cannot determine. Do not invent values.

DOCUMENT:
{{document_text}}";

/// Extracts a [`StructuredRecord`] from document text through an LLM.
pub struct StructuredExtractor {
    llm: Box<dyn LLM>,
    engine: TEngine,
}

impl StructuredExtractor {
    /// Creates a new `StructuredExtractor` around any [`LLM`].
    pub fn new(llm: Box<dyn LLM>) -> Result<Self, ExtractError> {
        let mut engine = TEngine::new();
        engine.register_template_string("extraction", EXTRACTION_TEMPLATE)?;
        Ok(Self { llm, engine })
    }

    /// Prompts the model with the document text and decodes the reply.
    pub async fn extract_record(&mut self, text: &str) -> Result<StructuredRecord, ExtractError> {
        let prompt = self
            .engine
            .render("extraction", &json!({ "document_text": text }))?;
        let raw = self.llm.prompt(prompt).await?;
        debug!(response_len = raw.len(), "Received extraction response");
        Ok(parse_record(&raw)?)
    }
}
