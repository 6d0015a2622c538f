//! Email body generator.
//!
//! Addressing fields are read from the request data using alias lists, so
//! `to`, `email_to` and `recipient` are interchangeable. The output is a full
//! HTML document preceded by an `EMAIL METADATA` comment block.

use lazy_static::lazy_static;
use regex::Regex;

use super::common::{escape_html, extract_string_field, generated_at};
use super::traits::DocumentGenerator;
use super::GeneratorError;
use crate::document::models::GenerationRequest;
use crate::template::DocumentType;

pub const MAX_CONTENT_LENGTH: usize = 1_000_000;
pub const MAX_SUBJECT_LENGTH: usize = 200;
pub const DEFAULT_FROM: &str = "noreply@sistemplate.pt";
pub const DEFAULT_SUBJECT: &str = "Documento gerado automaticamente";

const TO_ALIASES: &[&str] = &["to", "email_to", "recipient"];
const SUBJECT_ALIASES: &[&str] = &["subject", "email_subject", "titulo"];
const FROM_ALIASES: &[&str] = &["from", "email_from", "sender"];
const CC_ALIASES: &[&str] = &["cc", "email_cc"];
const BCC_ALIASES: &[&str] = &["bcc", "email_bcc"];
const REPLY_TO_ALIASES: &[&str] = &["reply_to", "email_reply_to"];

lazy_static! {
    static ref EMAIL_ADDRESS: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
}

/// Addressing extracted from the request data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailEnvelope {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub reply_to: Option<String>,
}

impl EmailEnvelope {
    /// Extract and validate the envelope. Fails when `to` is absent.
    pub fn from_request(request: &GenerationRequest) -> Result<Self, GeneratorError> {
        let data = request.data.as_ref();

        let to = extract_string_field(data, TO_ALIASES).ok_or(GeneratorError::MissingRecipient)?;
        let envelope = Self {
            to,
            from: extract_string_field(data, FROM_ALIASES).unwrap_or_else(|| DEFAULT_FROM.to_string()),
            subject: extract_string_field(data, SUBJECT_ALIASES)
                .unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
            cc: extract_string_field(data, CC_ALIASES),
            bcc: extract_string_field(data, BCC_ALIASES),
            reply_to: extract_string_field(data, REPLY_TO_ALIASES),
        };

        log::debug!("Email envelope extracted - to: {}, subject: {}", envelope.to, envelope.subject);
        envelope.validate()?;
        Ok(envelope)
    }

    fn validate(&self) -> Result<(), GeneratorError> {
        check_address("to", Some(&self.to))?;
        check_address("from", Some(&self.from))?;
        check_address("cc", self.cc.as_deref())?;
        check_address("bcc", self.bcc.as_deref())?;
        check_address("reply_to", self.reply_to.as_deref())?;

        if self.subject.chars().count() > MAX_SUBJECT_LENGTH {
            return Err(GeneratorError::SubjectTooLong {
                limit: MAX_SUBJECT_LENGTH,
            });
        }

        Ok(())
    }
}

fn check_address(field: &'static str, value: Option<&str>) -> Result<(), GeneratorError> {
    match value {
        Some(address) if !EMAIL_ADDRESS.is_match(address) => Err(GeneratorError::InvalidAddress {
            field,
            value: address.to_string(),
        }),
        _ => Ok(()),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EmailGenerator;

impl DocumentGenerator for EmailGenerator {
    fn generate(&self, content: &str, request: &GenerationRequest) -> Result<Vec<u8>, GeneratorError> {
        log::info!("Starting email generation - content size: {} characters", content.len());

        let envelope = EmailEnvelope::from_request(request)?;
        self.validate_content(content)?;

        let html = build_email_html(content, &envelope);
        log::info!(
            "Email generated successfully - recipient: {}, size: {} characters",
            envelope.to,
            html.len()
        );
        Ok(html.into_bytes())
    }

    fn supported_type(&self) -> DocumentType {
        DocumentType::Email
    }

    fn validate_content(&self, content: &str) -> Result<(), GeneratorError> {
        if content.trim().is_empty() {
            return Err(GeneratorError::EmptyContent);
        }

        let actual = content.chars().count();
        if actual > MAX_CONTENT_LENGTH {
            return Err(GeneratorError::ContentTooLarge {
                kind: DocumentType::Email,
                limit: MAX_CONTENT_LENGTH,
                actual,
            });
        }

        Ok(())
    }
}

pub fn build_email_html(content: &str, envelope: &EmailEnvelope) -> String {
    let mut html = String::with_capacity(content.len() + 1024);

    html.push_str("<!-- EMAIL METADATA -->\n");
    html.push_str(&format!("<!-- TO: {} -->\n", envelope.to));
    html.push_str(&format!("<!-- FROM: {} -->\n", envelope.from));
    html.push_str(&format!("<!-- SUBJECT: {} -->\n", envelope.subject));
    if let Some(ref cc) = envelope.cc {
        html.push_str(&format!("<!-- CC: {} -->\n", cc));
    }
    if let Some(ref bcc) = envelope.bcc {
        html.push_str(&format!("<!-- BCC: {} -->\n", bcc));
    }
    if let Some(ref reply_to) = envelope.reply_to {
        html.push_str(&format!("<!-- REPLY-TO: {} -->\n", reply_to));
    }
    html.push_str(&format!("<!-- GENERATED: {} -->\n", generated_at()));
    html.push_str("<!-- END EMAIL METADATA -->\n\n");

    if is_full_document(content) {
        html.push_str(content);
        return html;
    }

    html.push_str("<!DOCTYPE html>\n");
    html.push_str("<html lang=\"pt\">\n");
    html.push_str("<head>\n");
    html.push_str("    <meta charset=\"UTF-8\">\n");
    html.push_str("    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    html.push_str(&format!("    <title>{}</title>\n", escape_html(&envelope.subject)));
    html.push_str("    <style>\n");
    html.push_str("        body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; }\n");
    html.push_str("        .email-container { max-width: 600px; margin: 0 auto; padding: 20px; }\n");
    html.push_str("    </style>\n");
    html.push_str("</head>\n");
    html.push_str("<body>\n");
    html.push_str("    <div class=\"email-container\">\n");
    html.push_str(content);
    html.push_str("\n    </div>\n");
    html.push_str("</body>\n");
    html.push_str("</html>");

    html
}

fn is_full_document(content: &str) -> bool {
    let head = content.trim_start().to_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}
