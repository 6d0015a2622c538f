//! Generators module - turns rendered template output into final document bytes.
//!
//! One generator per document type:
//! - `PdfGenerator` - HTML to PDF through an [`HtmlToPdf`] converter
//! - `EmailGenerator` - self-contained HTML with an email metadata header
//! - `SmsGenerator` - plain text with an SMS metadata header
//!
//! [`GeneratorFactory`] resolves a [`DocumentType`] to its generator.

pub mod common;
pub mod email;
pub mod engine;
pub mod factory;
pub mod pdf;
pub mod sms;
pub mod traits;

pub use email::EmailGenerator;
pub use engine::{HtmlToPdf, Orientation, PageSettings, PageSize, PdfMetadata, WkhtmltopdfEngine};
pub use factory::GeneratorFactory;
pub use pdf::PdfGenerator;
pub use sms::SmsGenerator;
pub use traits::DocumentGenerator;

use thiserror::Error;

use crate::template::DocumentType;

/// Errors that can occur during document generation.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("content must not be empty")]
    EmptyContent,
    #[error("content too large for {kind} (limit: {limit} characters, actual: {actual})")]
    ContentTooLarge {
        kind: DocumentType,
        limit: usize,
        actual: usize,
    },
    #[error("email recipient ('to') is required")]
    MissingRecipient,
    #[error("invalid email address in '{field}': {value}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("email subject too long (maximum {limit} characters)")]
    SubjectTooLong { limit: usize },
    #[error("phone number ('to') is required for SMS generation")]
    MissingPhone,
    #[error("invalid phone number: {0}")]
    InvalidPhone(String),
    #[error("SMS sender too long (maximum 11 characters): {0}")]
    SenderTooLong(String),
    #[error("invalid SMS sender: {0}")]
    InvalidSender(String),
    #[error("unsupported document type: {0}")]
    UnsupportedType(DocumentType),
    #[error("failed to create temporary directory: {0}")]
    TempDir(#[source] std::io::Error),
    #[error("failed to write HTML source: {0}")]
    WriteHtml(#[source] std::io::Error),
    #[error("PDF converter execution failed: {0}")]
    ConverterIo(#[source] std::io::Error),
    #[error("PDF converter exited with status {0}")]
    ConverterExit(i32),
    #[error("failed to read generated PDF: {0}")]
    ReadPdf(#[source] std::io::Error),
}
