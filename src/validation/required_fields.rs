//! Required-field presence checks.
//!
//! Templates may declare dot-notation paths (e.g. `user.address.city`) that
//! must resolve to a non-null value in the request data. All missing paths are
//! collected and reported together.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::template::Template;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("missing required fields for template '{template_name}': {}", missing_fields.join(", "))]
pub struct RequiredFieldsError {
    pub template_name: String,
    pub missing_fields: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RequiredFieldsValidator;

impl RequiredFieldsValidator {
    /// Validate `data` against the template's declared required fields.
    ///
    /// Succeeds trivially when the template declares no metadata or an empty list.
    pub fn validate(
        &self,
        template: &Template,
        data: &Map<String, Value>,
    ) -> Result<(), RequiredFieldsError> {
        let required = template.required_fields();
        if required.is_empty() {
            log::debug!("Template '{}' declares no required fields", template.name);
            return Ok(());
        }

        let missing = find_missing_fields(required, data);
        if !missing.is_empty() {
            log::warn!(
                "Missing required fields for template '{}': {}",
                template.name,
                missing.join(", ")
            );
            return Err(RequiredFieldsError {
                template_name: template.name.clone(),
                missing_fields: missing,
            });
        }

        log::info!(
            "All {} required fields present for template '{}'",
            required.len(),
            template.name
        );
        Ok(())
    }
}

/// Paths from `required` that do not resolve to a non-null value, in order.
pub fn find_missing_fields(required: &[String], data: &Map<String, Value>) -> Vec<String> {
    required
        .iter()
        .filter(|path| !is_field_present(path, data))
        .cloned()
        .collect()
}

/// A path is present iff every segment is a key at its level and the final
/// value is not null. Walking through a non-object counts as missing.
pub fn is_field_present(path: &str, data: &Map<String, Value>) -> bool {
    if path.trim().is_empty() {
        return false;
    }

    let mut current = data;
    let mut segments = path.split('.').peekable();

    while let Some(segment) = segments.next() {
        let value = match current.get(segment) {
            Some(Value::Null) | None => return false,
            Some(value) => value,
        };

        if segments.peek().is_none() {
            return true;
        }

        match value.as_object() {
            Some(next) => current = next,
            None => return false,
        }
    }

    false
}
