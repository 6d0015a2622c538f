use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CallbackStatus {
    Success,
    Error,
}

/// Value of the `X-Callback-Type` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
    Document,
    Error,
}

impl CallbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackKind::Document => "document",
            CallbackKind::Error => "error",
        }
    }
}

/// Body POSTed to the caller's callback URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    pub event_id: String,
    pub status: CallbackStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Base64 encoded document bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: String,
}

impl CallbackPayload {
    pub fn document(event_id: &str, encoded: String, filename: &str, content_type: &str) -> Self {
        Self {
            event_id: event_id.to_string(),
            status: CallbackStatus::Success,
            filename: Some(filename.to_string()),
            content_type: Some(content_type.to_string()),
            document: Some(encoded),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn error(event_id: &str, message: &str) -> Self {
        Self {
            event_id: event_id.to_string(),
            status: CallbackStatus::Error,
            filename: None,
            content_type: None,
            document: None,
            message: Some(message.to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_payload_omits_document_fields() {
        let body = serde_json::to_value(CallbackPayload::error("ev", "boom")).unwrap();
        assert_eq!(body["eventId"], "ev");
        assert_eq!(body["status"], "ERROR");
        assert_eq!(body["message"], "boom");
        assert!(body.get("document").is_none());
        assert!(body.get("filename").is_none());
    }

    #[test]
    fn test_document_payload_shape() {
        let body = serde_json::to_value(CallbackPayload::document(
            "ev",
            "JVBERg==".into(),
            "a.pdf",
            "application/pdf",
        ))
        .unwrap();
        assert_eq!(body["status"], "SUCCESS");
        assert_eq!(body["contentType"], "application/pdf");
        assert_eq!(body["document"], "JVBERg==");
        assert!(body.get("message").is_none());
    }
}
