//! Request-level validation.
//!
//! Checks run in a fixed order (template name, then data, then options) and
//! stop at the first violation.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use super::ValidationError;
use crate::document::models::{GenerationRequest, PdfOptions};

pub const MAX_TEMPLATE_NAME_LENGTH: usize = 100;
pub const MAX_DATA_LENGTH: usize = 10_000_000;
pub const MAX_FILENAME_LENGTH: usize = 255;
pub const MAX_AUTHOR_LENGTH: usize = 100;
pub const MAX_SUBJECT_LENGTH: usize = 200;
pub const MAX_KEYWORDS_LENGTH: usize = 500;

lazy_static! {
    static ref TEMPLATE_NAME: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
    static ref FORBIDDEN_FILENAME_CHARS: Regex = Regex::new(r#"[<>:"/\\|?*]"#).unwrap();
    static ref PAGE_SIZE: Regex = Regex::new(r"^(A[3-5]|LETTER|LEGAL)$").unwrap();
}

/// Stateless validator for incoming generation requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentValidator;

impl DocumentValidator {
    pub fn validate(&self, request: &GenerationRequest) -> Result<(), ValidationError> {
        log::debug!("Validating document request for template: {}", request.template_name);

        validate_template_name(&request.template_name)?;
        validate_data(request.data.as_ref())?;
        if let Some(ref options) = request.options {
            validate_options(options)?;
        }

        Ok(())
    }
}

pub fn validate_template_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::empty_field("templateName", "Template name"));
    }

    if name.chars().count() > MAX_TEMPLATE_NAME_LENGTH {
        return Err(ValidationError::too_long(
            "templateName",
            "Template name",
            MAX_TEMPLATE_NAME_LENGTH,
        ));
    }

    if !TEMPLATE_NAME.is_match(name) {
        return Err(
            ValidationError::new("templateName", "Template name contains invalid characters")
                .with_suggestion("Use only letters, digits, '_' and '-'"),
        );
    }

    Ok(())
}

pub fn validate_data(data: Option<&Value>) -> Result<(), ValidationError> {
    let data = match data {
        Some(value) if !value.is_null() => value,
        _ => return Err(ValidationError::empty_field("data", "Data")),
    };

    if is_empty_tree(data) {
        log::warn!("Empty data supplied for document generation");
    }

    let serialized = data.to_string();
    if serialized.chars().count() > MAX_DATA_LENGTH {
        return Err(ValidationError::new(
            "data",
            format!("Data is too large (limit: {} characters)", MAX_DATA_LENGTH),
        ));
    }

    Ok(())
}

pub fn validate_options(options: &PdfOptions) -> Result<(), ValidationError> {
    if let Some(ref filename) = options.filename {
        validate_filename(filename)?;
    }

    if let Some(ref orientation) = options.orientation {
        let orientation = orientation.to_lowercase();
        if orientation != "portrait" && orientation != "landscape" {
            return Err(ValidationError::new(
                "options.orientation",
                "Orientation must be 'portrait' or 'landscape'",
            ));
        }
    }

    if let Some(ref page_size) = options.page_size {
        if !PAGE_SIZE.is_match(&page_size.to_uppercase()) {
            return Err(ValidationError::new("options.pageSize", "Invalid page size")
                .with_suggestion("Accepted values: A3, A4, A5, LETTER, LEGAL"));
        }
    }

    check_length(options.author.as_deref(), "options.author", "Author", MAX_AUTHOR_LENGTH)?;
    check_length(options.subject.as_deref(), "options.subject", "Subject", MAX_SUBJECT_LENGTH)?;
    check_length(options.keywords.as_deref(), "options.keywords", "Keywords", MAX_KEYWORDS_LENGTH)?;

    Ok(())
}

fn validate_filename(filename: &str) -> Result<(), ValidationError> {
    if filename.trim().is_empty() {
        return Err(ValidationError::empty_field("options.filename", "Filename"));
    }

    if filename.chars().count() > MAX_FILENAME_LENGTH {
        return Err(ValidationError::too_long(
            "options.filename",
            "Filename",
            MAX_FILENAME_LENGTH,
        ));
    }

    if FORBIDDEN_FILENAME_CHARS.is_match(filename) {
        return Err(
            ValidationError::new("options.filename", "Filename contains invalid characters")
                .with_suggestion(r#"Remove any of < > : " / \ | ? *"#),
        );
    }

    Ok(())
}

fn check_length(
    value: Option<&str>,
    field: &str,
    label: &str,
    max: usize,
) -> Result<(), ValidationError> {
    match value {
        Some(v) if v.chars().count() > max => Err(ValidationError::too_long(field, label, max)),
        _ => Ok(()),
    }
}

fn is_empty_tree(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
