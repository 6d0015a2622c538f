//! HTML to PDF conversion engine.
//!
//! Handles the low-level details of writing HTML to temporary files,
//! invoking the converter binary, and reading the output PDF.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tempfile::{tempdir, TempDir};

use super::GeneratorError;

/// Paper sizes accepted by the PDF generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSize {
    A3,
    #[default]
    A4,
    A5,
    Letter,
    Legal,
}

impl PageSize {
    /// Case-insensitive parse; `None` for unknown names.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "A3" => Some(PageSize::A3),
            "A4" => Some(PageSize::A4),
            "A5" => Some(PageSize::A5),
            "LETTER" => Some(PageSize::Letter),
            "LEGAL" => Some(PageSize::Legal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PageSize::A3 => "A3",
            PageSize::A4 => "A4",
            PageSize::A5 => "A5",
            PageSize::Letter => "Letter",
            PageSize::Legal => "Legal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("landscape") {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Portrait => "Portrait",
            Orientation::Landscape => "Landscape",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageSettings {
    pub size: PageSize,
    pub orientation: Orientation,
}

/// Document information stamped into the generated PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfMetadata {
    pub author: String,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: String,
    pub title: String,
}

/// External HTML to PDF capability.
pub trait HtmlToPdf: Send + Sync {
    fn convert(
        &self,
        html: &str,
        settings: &PageSettings,
        metadata: &PdfMetadata,
    ) -> Result<Vec<u8>, GeneratorError>;
}

/// Converter backed by the `wkhtmltopdf` command line tool.
#[derive(Debug, Clone)]
pub struct WkhtmltopdfEngine {
    binary: PathBuf,
}

impl WkhtmltopdfEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for WkhtmltopdfEngine {
    fn default() -> Self {
        Self::new("wkhtmltopdf")
    }
}

impl HtmlToPdf for WkhtmltopdfEngine {
    fn convert(
        &self,
        html: &str,
        settings: &PageSettings,
        metadata: &PdfMetadata,
    ) -> Result<Vec<u8>, GeneratorError> {
        let temp_dir = tempdir().map_err(GeneratorError::TempDir)?;
        let html_path = temp_dir.path().join("document.html");

        fs::write(&html_path, html).map_err(GeneratorError::WriteHtml)?;

        let pdf = self.compile_html_to_pdf(&temp_dir, settings, metadata)?;
        log::debug!("Converted {} bytes of HTML into {} bytes of PDF", html.len(), pdf.len());
        Ok(pdf)
    }
}

impl WkhtmltopdfEngine {
    fn compile_html_to_pdf(
        &self,
        temp_dir: &TempDir,
        settings: &PageSettings,
        metadata: &PdfMetadata,
    ) -> Result<Vec<u8>, GeneratorError> {
        let html_path = temp_dir.path().join("document.html");
        let output_path = temp_dir.path().join("document.pdf");

        let status = Command::new(&self.binary)
            .arg("--quiet")
            .arg("--encoding")
            .arg("utf-8")
            .arg("--page-size")
            .arg(settings.size.as_str())
            .arg("--orientation")
            .arg(settings.orientation.as_str())
            .arg("--title")
            .arg(&metadata.title)
            .arg(&html_path)
            .arg(&output_path)
            .current_dir(temp_dir.path())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(GeneratorError::ConverterIo)?;

        if !status.success() {
            let code = status.code().unwrap_or(-1);
            return Err(GeneratorError::ConverterExit(code));
        }

        fs::read(&output_path).map_err(GeneratorError::ReadPdf)
    }
}
