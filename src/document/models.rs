use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request to render a template into a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[serde(default)]
    pub template_name: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub receiver: Option<String>,
    #[serde(default)]
    pub callback_url: Option<String>,
    /// Route through the message pipeline instead of generating inline.
    #[serde(default, rename = "async")]
    pub is_async: bool,
    #[serde(default)]
    pub options: Option<PdfOptions>,
}

/// Page and metadata options honoured by the PDF generator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
}

/// Result of a synchronous generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDocument {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub filename: String,
}

/// Acknowledgement returned when a request is queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncDocumentResponse {
    pub event_id: String,
    pub status: String,
    pub message: String,
}

impl AsyncDocumentResponse {
    pub fn accepted(event_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            status: "ACCEPTED".to_string(),
            message: "Document generation request accepted".to_string(),
        }
    }
}

/// Outcome of [`DocumentService::process_request`](super::DocumentService::process_request).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    Generated(GeneratedDocument),
    Accepted(AsyncDocumentResponse),
}

/// Base64 envelope for clients that cannot take raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentResponse {
    pub filename: String,
    pub content_type: String,
    /// Base64 encoded document bytes.
    pub content: String,
    pub size: u64,
    pub template_name: String,
    pub generated_at: String,
    pub encoding: String,
    pub version: String,
}
