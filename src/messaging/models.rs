use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::models::{GenerationRequest, PdfOptions};

/// Wire form of a queued generation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMessage {
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub template_name: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub receiver: Option<String>,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub options: Option<PdfOptions>,
}

impl GenerationMessage {
    pub fn from_request(event_id: &str, request: &GenerationRequest) -> Self {
        Self {
            event_id: Some(event_id.to_string()),
            template_name: Some(request.template_name.clone()),
            data: request.data.clone(),
            receiver: request.receiver.clone(),
            callback_url: request.callback_url.clone(),
            options: request.options.clone(),
        }
    }

    /// Rebuild the synchronous request the consumer regenerates from.
    pub fn to_request(&self) -> GenerationRequest {
        GenerationRequest {
            template_name: self.template_name.clone().unwrap_or_default(),
            data: self.data.clone(),
            receiver: self.receiver.clone(),
            callback_url: self.callback_url.clone(),
            is_async: false,
            options: self.options.clone(),
        }
    }

    /// The callback URL, when present and non-blank.
    pub fn callback_url(&self) -> Option<&str> {
        self.callback_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Reason this message can never be processed, if any.
    pub fn missing_required(&self) -> Option<&'static str> {
        let name_missing = self
            .template_name
            .as_deref()
            .map(|name| name.trim().is_empty())
            .unwrap_or(true);
        if name_missing {
            return Some("templateName is required");
        }

        if matches!(self.data, None | Some(Value::Null)) {
            return Some("data is required");
        }

        None
    }
}

/// Dead-letter record wrapping the undecoded original message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DlqRecord {
    pub original_event_id: String,
    /// The original message as JSON when it parses, otherwise the raw text.
    pub original_message: Value,
    pub error_reason: String,
    pub timestamp: String,
}

impl DlqRecord {
    pub fn new(event_id: &str, raw_message: &str, reason: &str) -> Self {
        let original_message = serde_json::from_str(raw_message)
            .unwrap_or_else(|_| Value::String(raw_message.to_string()));

        Self {
            original_event_id: event_id.to_string(),
            original_message,
            error_reason: reason.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_wire_shape() {
        let request = GenerationRequest {
            template_name: "simple-document".into(),
            data: Some(json!({ "header": "X" })),
            callback_url: Some("http://cb".into()),
            is_async: true,
            ..Default::default()
        };

        let wire = serde_json::to_value(GenerationMessage::from_request("ev-1", &request)).unwrap();
        assert_eq!(wire["eventId"], "ev-1");
        assert_eq!(wire["templateName"], "simple-document");
        assert_eq!(wire["data"]["header"], "X");
        assert_eq!(wire["callbackUrl"], "http://cb");
        assert!(wire.get("async").is_none());
    }

    #[test]
    fn test_missing_required() {
        let message: GenerationMessage = serde_json::from_value(json!({ "eventId": "e" })).unwrap();
        assert_eq!(message.missing_required(), Some("templateName is required"));

        let message: GenerationMessage =
            serde_json::from_value(json!({ "templateName": "t", "data": null })).unwrap();
        assert_eq!(message.missing_required(), Some("data is required"));

        let message: GenerationMessage =
            serde_json::from_value(json!({ "templateName": "t", "data": {} })).unwrap();
        assert_eq!(message.missing_required(), None);
    }

    #[test]
    fn test_dlq_record_keeps_raw_text_when_not_json() {
        let record = DlqRecord::new("e", "{not json", "parse error");
        assert_eq!(record.original_message, Value::String("{not json".into()));

        let record = DlqRecord::new("e", r#"{"templateName":"t"}"#, "boom");
        assert_eq!(record.original_message["templateName"], "t");

        let wire = serde_json::to_value(&record).unwrap();
        assert_eq!(wire["originalEventId"], "e");
        assert_eq!(wire["errorReason"], "boom");
    }
}
