//! SMS body generator.
//!
//! Rendered content is reduced to plain text (tags stripped, entities
//! unescaped, whitespace collapsed) and prefixed with an `SMS METADATA` header.
//! Length limits depend on whether the text needs the unicode alphabet.

use lazy_static::lazy_static;
use regex::Regex;

use super::common::{clean_text, extract_string_field, generated_at};
use super::traits::DocumentGenerator;
use super::GeneratorError;
use crate::document::models::GenerationRequest;
use crate::template::DocumentType;

pub const SINGLE_LIMIT: usize = 160;
pub const MULTIPART_LIMIT: usize = 1600;
pub const UNICODE_SINGLE_LIMIT: usize = 70;
pub const UNICODE_MULTIPART_LIMIT: usize = 700;
pub const MAX_SENDER_LENGTH: usize = 11;
pub const DEFAULT_SENDER: &str = "SISTEMPLATE";

const TO_ALIASES: &[&str] = &["to", "phone", "telefone", "numero"];
const FROM_ALIASES: &[&str] = &["from", "sender", "remetente"];
const REFERENCE_ALIASES: &[&str] = &["reference", "ref", "referencia"];

lazy_static! {
    static ref PHONE: Regex = Regex::new(r"^(\+?[1-9]\d{1,14}|\d{9,15})$").unwrap();
    static ref UNICODE_CHARS: Regex = Regex::new(r"[^\x00-\x7F]").unwrap();
    static ref DIGITS: Regex = Regex::new(r"^\d+$").unwrap();
    static ref ALPHANUMERIC_SENDER: Regex = Regex::new(r"^[a-zA-Z0-9\s]+$").unwrap();
}

/// Addressing extracted from the request data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsEnvelope {
    /// Cleaned phone number (digits with an optional leading `+`).
    pub to: String,
    pub from: String,
    pub reference: Option<String>,
}

impl SmsEnvelope {
    pub fn from_request(request: &GenerationRequest) -> Result<Self, GeneratorError> {
        let data = request.data.as_ref();

        let raw_to = extract_string_field(data, TO_ALIASES).ok_or(GeneratorError::MissingPhone)?;
        let to = clean_phone_number(&raw_to);
        if !PHONE.is_match(&to) {
            return Err(GeneratorError::InvalidPhone(raw_to));
        }

        let from = extract_string_field(data, FROM_ALIASES).unwrap_or_else(|| DEFAULT_SENDER.to_string());
        validate_sender(&from)?;

        log::debug!("SMS envelope validated - phone: {}, sender: {}", to, from);
        Ok(Self {
            to,
            from,
            reference: extract_string_field(data, REFERENCE_ALIASES),
        })
    }
}

/// Keep digits and `+` signs.
///
/// A number that starts with `+` keeps only that one. Otherwise every `+` is
/// kept and the phone pattern rejects the number.
pub fn clean_phone_number(phone: &str) -> String {
    let cleaned: String = phone
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();

    match cleaned.strip_prefix('+') {
        Some(rest) => format!("+{}", rest.replace('+', "")),
        None => cleaned,
    }
}

fn validate_sender(sender: &str) -> Result<(), GeneratorError> {
    if sender.chars().count() > MAX_SENDER_LENGTH {
        return Err(GeneratorError::SenderTooLong(sender.to_string()));
    }

    let valid = if DIGITS.is_match(sender) {
        PHONE.is_match(sender)
    } else {
        ALPHANUMERIC_SENDER.is_match(sender)
    };

    if !valid {
        return Err(GeneratorError::InvalidSender(sender.to_string()));
    }
    Ok(())
}

pub fn is_unicode(text: &str) -> bool {
    UNICODE_CHARS.is_match(text)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SmsGenerator;

impl DocumentGenerator for SmsGenerator {
    fn generate(&self, content: &str, request: &GenerationRequest) -> Result<Vec<u8>, GeneratorError> {
        log::info!("Starting SMS generation - content size: {} characters", content.len());

        let envelope = SmsEnvelope::from_request(request)?;
        self.validate_content(content)?;

        let text = clean_text(content);
        warn_on_segmentation(&text);

        let mut sms = String::with_capacity(text.len() + 128);
        sms.push_str("# SMS METADATA\n");
        sms.push_str(&format!("# TO: {}\n", envelope.to));
        sms.push_str(&format!("# FROM: {}\n", envelope.from));
        if let Some(ref reference) = envelope.reference {
            sms.push_str(&format!("# REF: {}\n", reference));
        }
        sms.push_str(&format!("# GENERATED: {}\n", generated_at()));
        sms.push_str("# END METADATA\n\n");
        sms.push_str(&text);

        log::info!(
            "SMS generated successfully - recipient: {}, size: {} characters",
            envelope.to,
            text.chars().count()
        );
        Ok(sms.into_bytes())
    }

    fn supported_type(&self) -> DocumentType {
        DocumentType::Sms
    }

    fn validate_content(&self, content: &str) -> Result<(), GeneratorError> {
        if content.trim().is_empty() {
            return Err(GeneratorError::EmptyContent);
        }

        let text = clean_text(content);
        let limit = if is_unicode(&text) {
            UNICODE_MULTIPART_LIMIT
        } else {
            MULTIPART_LIMIT
        };

        let actual = text.chars().count();
        if actual > limit {
            return Err(GeneratorError::ContentTooLarge {
                kind: DocumentType::Sms,
                limit,
                actual,
            });
        }

        Ok(())
    }
}

fn warn_on_segmentation(text: &str) {
    let unicode = is_unicode(text);
    let single = if unicode { UNICODE_SINGLE_LIMIT } else { SINGLE_LIMIT };
    let length = text.chars().count();

    if length > single {
        let parts = length.div_ceil(single);
        log::warn!(
            "SMS will be sent in {} parts (length: {}, per-part limit: {})",
            parts,
            length,
            single
        );
    }
    if unicode {
        log::info!("SMS contains unicode characters - reduced limits applied");
    }
}
