//! Template module - template definitions, lookup, and rendering.
//!
//! Templates are owned by an external store; this crate only reads them by
//! name. Rendering is delegated to a [`TemplateRenderer`] implementation.

pub mod renderer;
pub mod store;

pub use renderer::{PlaceholderRenderer, RenderError, TemplateRenderer};
pub use store::{CachedTemplateStore, InMemoryTemplateStore, TemplateStore, TemplateStoreError};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of document a template produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentType {
    Pdf,
    Email,
    Sms,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Pdf => "PDF",
            DocumentType::Email => "EMAIL",
            DocumentType::Sms => "SMS",
        }
    }

    /// Media type of the generated payload.
    pub fn content_type(&self) -> &'static str {
        match self {
            DocumentType::Pdf => "application/pdf",
            DocumentType::Email => "text/html",
            DocumentType::Sms => "text/plain",
        }
    }

    /// File extension (with leading dot) of the generated payload.
    pub fn extension(&self) -> &'static str {
        match self {
            DocumentType::Pdf => ".pdf",
            DocumentType::Email => ".html",
            DocumentType::Sms => ".txt",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata attached to a template definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMetadata {
    /// Dot-separated paths that must be present and non-null in request data.
    #[serde(default)]
    pub required_fields: Vec<String>,
}

/// A named template as stored by the template store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DocumentType,
    /// Renderer source text.
    pub content: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Option<TemplateMetadata>,
}

fn default_active() -> bool {
    true
}

impl Template {
    pub fn new(name: impl Into<String>, kind: DocumentType, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            content: content.into(),
            active: true,
            description: None,
            metadata: None,
        }
    }

    pub fn with_required_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata = Some(TemplateMetadata {
            required_fields: fields.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Required field paths, empty when the template declares none.
    pub fn required_fields(&self) -> &[String] {
        self.metadata
            .as_ref()
            .map(|m| m.required_fields.as_slice())
            .unwrap_or(&[])
    }
}
