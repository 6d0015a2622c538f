//! PDF generator.
//!
//! Stamps document metadata into the rendered HTML and hands it to the
//! configured [`HtmlToPdf`] converter with the requested page settings.

use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;

use super::common::escape_html;
use super::engine::{HtmlToPdf, Orientation, PageSettings, PageSize, PdfMetadata};
use super::traits::DocumentGenerator;
use super::GeneratorError;
use crate::document::models::{GenerationRequest, PdfOptions};
use crate::template::DocumentType;

pub const MAX_CONTENT_LENGTH: usize = 10_000_000;
pub const DEFAULT_AUTHOR: &str = "Sistema de Templates";
pub const DEFAULT_SUBJECT: &str = "Documento gerado automaticamente";
pub const DEFAULT_KEYWORDS: &str = "template,pdf,automatico";
pub const CREATOR: &str = "Sistema de Templates v1.0";
pub const DEFAULT_TITLE: &str = "Documento";

lazy_static! {
    static ref HEAD_OPEN: Regex = Regex::new(r"(?i)<head(\s[^>]*)?>").unwrap();
}

pub struct PdfGenerator {
    converter: Arc<dyn HtmlToPdf>,
}

impl PdfGenerator {
    pub fn new(converter: Arc<dyn HtmlToPdf>) -> Self {
        Self { converter }
    }
}

impl DocumentGenerator for PdfGenerator {
    fn generate(&self, content: &str, request: &GenerationRequest) -> Result<Vec<u8>, GeneratorError> {
        log::info!("Starting PDF generation - content size: {} characters", content.len());

        self.validate_content(content)?;
        warn_if_not_html(content);

        let options = request.options.clone().unwrap_or_else(default_options);
        let settings = page_settings(&options);
        let metadata = pdf_metadata(&options);

        let html = stamp_metadata(content, &metadata);
        let pdf = self.converter.convert(&html, &settings, &metadata)?;

        log::info!("PDF generated successfully - size: {} bytes", pdf.len());
        Ok(pdf)
    }

    fn supported_type(&self) -> DocumentType {
        DocumentType::Pdf
    }

    fn validate_content(&self, content: &str) -> Result<(), GeneratorError> {
        if content.trim().is_empty() {
            return Err(GeneratorError::EmptyContent);
        }

        let actual = content.chars().count();
        if actual > MAX_CONTENT_LENGTH {
            return Err(GeneratorError::ContentTooLarge {
                kind: DocumentType::Pdf,
                limit: MAX_CONTENT_LENGTH,
                actual,
            });
        }

        Ok(())
    }
}

/// Options used when the request carries none.
pub fn default_options() -> PdfOptions {
    PdfOptions {
        filename: None,
        orientation: Some("portrait".into()),
        page_size: Some("A4".into()),
        author: Some(DEFAULT_AUTHOR.into()),
        subject: Some(DEFAULT_SUBJECT.into()),
        keywords: Some(DEFAULT_KEYWORDS.into()),
    }
}

pub fn page_settings(options: &PdfOptions) -> PageSettings {
    let size = match options.page_size.as_deref() {
        None => PageSize::default(),
        Some(raw) => PageSize::parse(raw).unwrap_or_else(|| {
            log::warn!("Unknown page size '{}', using A4", raw);
            PageSize::A4
        }),
    };

    let orientation = options
        .orientation
        .as_deref()
        .map(Orientation::parse)
        .unwrap_or_default();

    PageSettings { size, orientation }
}

pub fn pdf_metadata(options: &PdfOptions) -> PdfMetadata {
    PdfMetadata {
        author: options.author.clone().unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
        subject: options.subject.clone(),
        keywords: options.keywords.clone(),
        creator: CREATOR.to_string(),
        title: options.filename.clone().unwrap_or_else(|| DEFAULT_TITLE.to_string()),
    }
}

/// Insert `<title>` and document `<meta>` tags into the HTML head.
///
/// Fragments without a `<head>` are wrapped in a minimal document first.
pub fn stamp_metadata(content: &str, metadata: &PdfMetadata) -> String {
    let mut tags = format!(
        "<meta charset=\"UTF-8\">\n<title>{}</title>\n<meta name=\"author\" content=\"{}\">\n<meta name=\"generator\" content=\"{}\">\n",
        escape_html(&metadata.title),
        escape_html(&metadata.author),
        escape_html(&metadata.creator),
    );
    if let Some(ref subject) = metadata.subject {
        tags.push_str(&format!("<meta name=\"subject\" content=\"{}\">\n", escape_html(subject)));
    }
    if let Some(ref keywords) = metadata.keywords {
        tags.push_str(&format!("<meta name=\"keywords\" content=\"{}\">\n", escape_html(keywords)));
    }

    if let Some(head) = HEAD_OPEN.find(content) {
        let insert_at = head.end();
        return format!("{}\n{}{}", &content[..insert_at], tags, &content[insert_at..]);
    }

    if content.to_lowercase().contains("<html") {
        log::debug!("HTML document has no <head>, metadata tags prepended");
        return format!("{}{}", tags, content);
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n{}</head>\n<body>\n{}\n</body>\n</html>",
        tags, content
    )
}

fn warn_if_not_html(content: &str) {
    let lower = content.trim().to_lowercase();
    if !lower.contains("<html") && !lower.contains("<body") && !lower.contains("<div") {
        log::warn!("Content may not be valid HTML, wrapping in a basic structure");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingConverter {
        calls: Mutex<Vec<(String, PageSettings, PdfMetadata)>>,
    }

    impl HtmlToPdf for RecordingConverter {
        fn convert(
            &self,
            html: &str,
            settings: &PageSettings,
            metadata: &PdfMetadata,
        ) -> Result<Vec<u8>, GeneratorError> {
            self.calls.lock().push((html.to_string(), *settings, metadata.clone()));
            Ok(b"%PDF-1.4 stub".to_vec())
        }
    }

    #[test]
    fn test_defaults_when_no_options() {
        let converter = Arc::new(RecordingConverter::default());
        let generator = PdfGenerator::new(converter.clone());

        let pdf = generator
            .generate("<div>Olá</div>", &GenerationRequest::default())
            .unwrap();
        assert!(pdf.starts_with(b"%PDF"));

        let calls = converter.calls.lock();
        let (html, settings, metadata) = &calls[0];
        assert_eq!(*settings, PageSettings::default());
        assert_eq!(metadata.author, DEFAULT_AUTHOR);
        assert_eq!(metadata.subject.as_deref(), Some(DEFAULT_SUBJECT));
        assert_eq!(metadata.keywords.as_deref(), Some(DEFAULT_KEYWORDS));
        assert_eq!(metadata.creator, CREATOR);
        assert_eq!(metadata.title, DEFAULT_TITLE);
        assert!(html.contains("<title>Documento</title>"));
        assert!(html.contains("<div>Olá</div>"));
    }

    #[test]
    fn test_options_map_to_page_settings() {
        let options = PdfOptions {
            filename: Some("relatorio".into()),
            orientation: Some("Landscape".into()),
            page_size: Some("legal".into()),
            author: None,
            subject: None,
            keywords: None,
        };
        assert_eq!(
            page_settings(&options),
            PageSettings {
                size: PageSize::Legal,
                orientation: Orientation::Landscape
            }
        );

        let metadata = pdf_metadata(&options);
        assert_eq!(metadata.author, DEFAULT_AUTHOR);
        assert_eq!(metadata.title, "relatorio");
        assert_eq!(metadata.subject, None);
    }

    #[test]
    fn test_unknown_page_size_falls_back_to_a4() {
        let options = PdfOptions {
            page_size: Some("B5".into()),
            ..Default::default()
        };
        assert_eq!(page_settings(&options).size, PageSize::A4);
    }

    #[test]
    fn test_stamp_metadata_into_existing_head() {
        let metadata = pdf_metadata(&default_options());
        let html = stamp_metadata("<html><HEAD><style></style></HEAD><body>x</body></html>", &metadata);
        let title_at = html.find("<title>").unwrap();
        assert!(title_at > html.find("<HEAD>").unwrap());
        assert!(title_at < html.find("<style>").unwrap());
        assert!(html.contains("content=\"template,pdf,automatico\""));

        let fragment = stamp_metadata("<header>Topo</header>", &metadata);
        assert!(fragment.starts_with("<!DOCTYPE html>"));
        assert!(fragment.contains("<body>\n<header>Topo</header>"));
    }

    #[test]
    fn test_content_limits() {
        let generator = PdfGenerator::new(Arc::new(RecordingConverter::default()));
        assert!(matches!(
            generator.validate_content("  \n "),
            Err(GeneratorError::EmptyContent)
        ));

        let oversized = "x".repeat(MAX_CONTENT_LENGTH + 1);
        assert!(matches!(
            generator.validate_content(&oversized),
            Err(GeneratorError::ContentTooLarge { limit: MAX_CONTENT_LENGTH, .. })
        ));
    }

    #[test]
    fn test_converter_errors_propagate() {
        struct Failing;
        impl HtmlToPdf for Failing {
            fn convert(&self, _: &str, _: &PageSettings, _: &PdfMetadata) -> Result<Vec<u8>, GeneratorError> {
                Err(GeneratorError::ConverterExit(2))
            }
        }

        let err = PdfGenerator::new(Arc::new(Failing))
            .generate("<p>x</p>", &GenerationRequest::default())
            .unwrap_err();
        assert!(matches!(err, GeneratorError::ConverterExit(2)));
    }
}
