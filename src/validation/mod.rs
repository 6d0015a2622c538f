//! Input validation for generation requests.
//!
//! - `document` - shape checks on the request itself (name, data, options)
//! - `required_fields` - presence checks for the paths a template declares

pub mod document;
pub mod required_fields;

pub use document::DocumentValidator;
pub use required_fields::{RequiredFieldsError, RequiredFieldsValidator};

use std::fmt;

/// Validation error with the offending field and a hint for fixing it.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// The field that failed validation
    pub field: String,
    /// Human-readable error message
    pub message: String,
    /// Suggestion for how to fix the error
    pub suggestion: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Create error for a missing or blank required field
    pub fn empty_field(field: &str, label: &str) -> Self {
        Self::new(field, format!("{} is required", label))
    }

    /// Create error for a value longer than allowed
    pub fn too_long(field: &str, label: &str, max: usize) -> Self {
        Self::new(field, format!("{} is too long (maximum {} characters)", label, max))
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, ". {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}
