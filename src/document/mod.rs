//! Document module - request models, the generation service, and HTTP handlers.

pub mod handlers;
pub mod models;
pub mod service;

pub use models::{
    AsyncDocumentResponse, DocumentOutcome, DocumentResponse, GeneratedDocument, GenerationRequest,
    PdfOptions,
};
pub use service::DocumentService;
