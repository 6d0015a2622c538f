//! Generator lookup by document type.

use std::collections::HashMap;
use std::sync::Arc;

use super::engine::HtmlToPdf;
use super::{DocumentGenerator, EmailGenerator, GeneratorError, PdfGenerator, SmsGenerator};
use crate::template::DocumentType;

/// Immutable registry built once at start-up.
pub struct GeneratorFactory {
    generators: HashMap<DocumentType, Arc<dyn DocumentGenerator>>,
}

impl GeneratorFactory {
    /// Register each generator under its supported type. Later entries win on duplicates.
    pub fn new(generators: Vec<Arc<dyn DocumentGenerator>>) -> Self {
        let generators: HashMap<_, _> = generators
            .into_iter()
            .map(|generator| {
                log::debug!("Registered generator for type {}", generator.supported_type());
                (generator.supported_type(), generator)
            })
            .collect();

        log::info!("Generator factory ready with {} generators", generators.len());
        Self { generators }
    }

    /// PDF, Email and SMS generators, with PDFs produced by `converter`.
    pub fn with_defaults(converter: Arc<dyn HtmlToPdf>) -> Self {
        Self::new(vec![
            Arc::new(PdfGenerator::new(converter)),
            Arc::new(EmailGenerator),
            Arc::new(SmsGenerator),
        ])
    }

    pub fn get_generator(&self, kind: DocumentType) -> Result<Arc<dyn DocumentGenerator>, GeneratorError> {
        self.generators
            .get(&kind)
            .cloned()
            .ok_or(GeneratorError::UnsupportedType(kind))
    }

    pub fn supported_types(&self) -> Vec<DocumentType> {
        self.generators.keys().copied().collect()
    }
}
