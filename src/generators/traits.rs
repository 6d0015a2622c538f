//! Traits for generator system standardization.

use super::GeneratorError;
use crate::document::models::GenerationRequest;
use crate::template::DocumentType;

/// Trait for document generators.
///
/// `generate` receives the rendered template content together with the
/// original request, whose `data` carries type-specific metadata such as
/// recipients or phone numbers.
pub trait DocumentGenerator: Send + Sync {
    /// Produce the final document payload.
    fn generate(&self, content: &str, request: &GenerationRequest) -> Result<Vec<u8>, GeneratorError>;

    /// The document type this generator handles.
    fn supported_type(&self) -> DocumentType;

    /// Check rendered content against the generator's limits.
    fn validate_content(&self, content: &str) -> Result<(), GeneratorError> {
        if content.trim().is_empty() {
            return Err(GeneratorError::EmptyContent);
        }
        Ok(())
    }
}
