//! Error taxonomy for the generation pipeline.

use actix_web::http::StatusCode;
use thiserror::Error;

use crate::generators::GeneratorError;
use crate::messaging::PublishError;
use crate::template::{RenderError, TemplateStoreError};
use crate::validation::{RequiredFieldsError, ValidationError};

/// Underlying cause of a failed generation attempt.
#[derive(Debug, Error)]
pub enum GenerationFailure {
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
    #[error("{0}")]
    Generator(#[from] GeneratorError),
    #[error("generation task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("template not found: {0}")]
    TemplateNotFound(String),
    #[error("template is inactive: {0}")]
    InactiveTemplate(String),
    #[error(transparent)]
    RequiredFields(#[from] RequiredFieldsError),
    #[error("data conversion failed: {0}")]
    DataConversion(String),
    #[error("document generation failed for template '{template_name}': {source}")]
    Generation {
        template_name: String,
        #[source]
        source: GenerationFailure,
    },
    #[error(transparent)]
    TemplateStore(#[from] TemplateStoreError),
    #[error("failed to enqueue generation request: {0}")]
    Publish(#[from] PublishError),
}

impl DocumentError {
    pub fn generation(template_name: &str, source: impl Into<GenerationFailure>) -> Self {
        DocumentError::Generation {
            template_name: template_name.to_string(),
            source: source.into(),
        }
    }

    /// Whether the consumer should try the same message again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DocumentError::Generation { .. } | DocumentError::TemplateStore(_)
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            DocumentError::Validation(_)
            | DocumentError::InactiveTemplate(_)
            | DocumentError::RequiredFields(_)
            | DocumentError::DataConversion(_) => StatusCode::BAD_REQUEST,
            DocumentError::TemplateNotFound(_) => StatusCode::NOT_FOUND,
            DocumentError::Generation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            DocumentError::TemplateStore(_) | DocumentError::Publish(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Short machine-readable error kind used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentError::Validation(_) => "ValidationError",
            DocumentError::TemplateNotFound(_) => "TemplateNotFound",
            DocumentError::InactiveTemplate(_) => "InactiveTemplate",
            DocumentError::RequiredFields(_) => "RequiredFieldsMissing",
            DocumentError::DataConversion(_) => "DataConversionError",
            DocumentError::Generation { .. } => "DocumentGenerationError",
            DocumentError::TemplateStore(_) => "TemplateStoreUnavailable",
            DocumentError::Publish(_) => "PublishError",
        }
    }
}
