//! Document generation orchestration.
//!
//! Synchronous path: validate, resolve template, check active, render, check
//! required fields, generate. Asynchronous path: validate, publish, acknowledge.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::models::{AsyncDocumentResponse, DocumentOutcome, DocumentResponse, GeneratedDocument, GenerationRequest};
use crate::error::{DocumentError, GenerationFailure};
use crate::generators::GeneratorFactory;
use crate::messaging::DocumentProducer;
use crate::template::{DocumentType, Template, TemplateRenderer, TemplateStore};
use crate::validation::{DocumentValidator, RequiredFieldsValidator};

pub struct DocumentService {
    templates: Arc<dyn TemplateStore>,
    renderer: Arc<dyn TemplateRenderer>,
    generators: Arc<GeneratorFactory>,
    producer: Arc<DocumentProducer>,
    validator: DocumentValidator,
    required_fields: RequiredFieldsValidator,
}

impl DocumentService {
    pub fn new(
        templates: Arc<dyn TemplateStore>,
        renderer: Arc<dyn TemplateRenderer>,
        generators: Arc<GeneratorFactory>,
        producer: Arc<DocumentProducer>,
    ) -> Self {
        Self {
            templates,
            renderer,
            generators,
            producer,
            validator: DocumentValidator,
            required_fields: RequiredFieldsValidator,
        }
    }

    /// Route to the async pipeline when `request.is_async`, otherwise generate inline.
    pub async fn process_request(&self, request: &GenerationRequest) -> Result<DocumentOutcome, DocumentError> {
        if request.is_async {
            log::info!("Processing async request for template: {}", request.template_name);
            return self.generate_async(request).await.map(DocumentOutcome::Accepted);
        }

        log::info!("Processing sync request for template: {}", request.template_name);
        self.generate(request).await.map(DocumentOutcome::Generated)
    }

    /// Generate the document bytes for `request`.
    pub async fn generate_document(&self, request: &GenerationRequest) -> Result<Vec<u8>, DocumentError> {
        let (template, bytes) = self.render_and_generate(request).await?;
        log::info!(
            "Document generated - template: {}, type: {}, size: {} bytes",
            template.name,
            template.kind,
            bytes.len()
        );
        Ok(bytes)
    }

    /// Generate and attach the filename and content type derived from the template.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedDocument, DocumentError> {
        let (template, bytes) = self.render_and_generate(request).await?;
        Ok(GeneratedDocument {
            bytes,
            content_type: template.kind.content_type().to_string(),
            filename: filename_for(request, template.kind),
        })
    }

    pub async fn generate_base64_document(&self, request: &GenerationRequest) -> Result<DocumentResponse, DocumentError> {
        let document = self.generate(request).await?;

        Ok(DocumentResponse {
            size: document.bytes.len() as u64,
            content: BASE64.encode(&document.bytes),
            filename: document.filename,
            content_type: document.content_type,
            template_name: request.template_name.clone(),
            generated_at: Utc::now().to_rfc3339(),
            encoding: "base64".to_string(),
            version: "1.0".to_string(),
        })
    }

    /// Validate and enqueue. Template existence is not checked here; a missing
    /// template surfaces later through the error callback and the DLQ.
    pub async fn generate_async(&self, request: &GenerationRequest) -> Result<AsyncDocumentResponse, DocumentError> {
        self.validator.validate(request)?;
        let event_id = self.producer.publish(request).await?;
        log::info!("Request accepted - event: {}, template: {}", event_id, request.template_name);
        Ok(AsyncDocumentResponse::accepted(event_id))
    }

    /// User-facing filename: `options.filename` or the template name, with the type's extension.
    pub async fn build_filename(&self, request: &GenerationRequest) -> String {
        let kind = self.resolve_type(&request.template_name).await;
        filename_for(request, kind)
    }

    pub async fn content_type_for(&self, template_name: &str) -> &'static str {
        self.resolve_type(template_name).await.content_type()
    }

    pub async fn extension_for(&self, template_name: &str) -> &'static str {
        self.resolve_type(template_name).await.extension()
    }

    /// Template type with a PDF fallback when the lookup fails.
    async fn resolve_type(&self, template_name: &str) -> DocumentType {
        match self.templates.find_by_name(template_name).await {
            Ok(Some(template)) => template.kind,
            Ok(None) => {
                log::warn!("Template '{}' not found, using PDF conventions", template_name);
                DocumentType::Pdf
            }
            Err(e) => {
                log::warn!("Template lookup for '{}' failed ({}), using PDF conventions", template_name, e);
                DocumentType::Pdf
            }
        }
    }

    async fn render_and_generate(&self, request: &GenerationRequest) -> Result<(Template, Vec<u8>), DocumentError> {
        self.validator.validate(request)?;

        let template = self
            .templates
            .find_by_name(&request.template_name)
            .await?
            .ok_or_else(|| DocumentError::TemplateNotFound(request.template_name.clone()))?;

        if !template.active {
            log::warn!("Rejected request for inactive template: {}", template.name);
            return Err(DocumentError::InactiveTemplate(template.name));
        }

        let data = data_map(request.data.as_ref())?;
        let rendered = self
            .renderer
            .render(&template.content, &data)
            .map_err(|e| DocumentError::generation(&template.name, e))?;

        self.required_fields.validate(&template, &data)?;

        let generator = self
            .generators
            .get_generator(template.kind)
            .map_err(|e| DocumentError::generation(&template.name, e))?;

        // Generators may shell out to the PDF converter.
        let owned_request = request.clone();
        let bytes = tokio::task::spawn_blocking(move || generator.generate(&rendered, &owned_request))
            .await
            .map_err(|e| DocumentError::generation(&template.name, GenerationFailure::Task(e.to_string())))?
            .map_err(|e| DocumentError::generation(&template.name, e))?;

        Ok((template, bytes))
    }
}

fn data_map(data: Option<&Value>) -> Result<Map<String, Value>, DocumentError> {
    match data {
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(other) => Err(DocumentError::DataConversion(format!(
            "expected a JSON object, got {}",
            json_kind(other)
        ))),
        None => Err(DocumentError::DataConversion("data is missing".to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn filename_for(request: &GenerationRequest, kind: DocumentType) -> String {
    let base = request
        .options
        .as_ref()
        .and_then(|o| o.filename.as_deref())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(request.template_name.as_str());

    let extension = kind.extension();
    if base.to_lowercase().ends_with(extension) {
        base.to_string()
    } else {
        format!("{}{}", base, extension)
    }
}
