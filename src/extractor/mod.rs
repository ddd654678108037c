// Text extraction module
// Turns an uploaded file into plain text according to its declared format


use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported file format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Failed to extract text from {}: {message}", .path.display())]
    Failure { path: PathBuf, message: String },
}

impl ExtractionError {
    fn failure(path: &Path, message: impl Into<String>) -> Self {
        Self::Failure {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

/// Formats the default extractor understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    PlainText,
}

impl DocumentFormat {
    /// Match a file extension, with or without its leading dot, ignoring case
    #[inline]
    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" | "md" => Some(Self::PlainText),
            _ => None,
        }
    }
}

/// Lower-cased extension of a display name, empty when it has none
#[inline]
pub fn extension_of(display_name: &str) -> String {
    Path::new(display_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Source of plain text for ingestion
pub trait TextExtractor: Send + Sync {
    /// Extract the text of the file at `path`, interpreting it as `declared_extension`
    fn extract_text(&self, path: &Path, declared_extension: &str)
    -> Result<String, ExtractionError>;
}

/// Extractor for PDF, DOCX and UTF-8 text files
#[derive(Debug, Clone, Copy, Default)]
pub struct FileExtractor;

impl FileExtractor {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl TextExtractor for FileExtractor {
    #[inline]
    fn extract_text(
        &self,
        path: &Path,
        declared_extension: &str,
    ) -> Result<String, ExtractionError> {
        let format = DocumentFormat::from_extension(declared_extension)
            .ok_or_else(|| ExtractionError::UnsupportedFormat(declared_extension.to_string()))?;

        let bytes = fs::read(path).map_err(|e| ExtractionError::failure(path, e.to_string()))?;

        let text = match format {
            DocumentFormat::PlainText => String::from_utf8(bytes)
                .map_err(|e| ExtractionError::failure(path, format!("not valid UTF-8: {}", e)))?,
            DocumentFormat::Pdf => extract_pdf(path, &bytes)?,
            DocumentFormat::Docx => extract_docx(path, &bytes)?,
        };

        debug!(
            "Extracted {} chars from {} as {:?}",
            text.chars().count(),
            path.display(),
            format
        );
        Ok(text)
    }
}

fn extract_pdf(path: &Path, bytes: &[u8]) -> Result<String, ExtractionError> {
    // The PDF parser panics on some malformed inputs
    match panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(bytes)
    })) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(ExtractionError::failure(path, e.to_string())),
        Err(_) => Err(ExtractionError::failure(
            path,
            "PDF parser aborted on malformed input",
        )),
    }
}

fn extract_docx(path: &Path, bytes: &[u8]) -> Result<String, ExtractionError> {
    let document =
        docx_rs::read_docx(bytes).map_err(|e| ExtractionError::failure(path, e.to_string()))?;

    let mut text = String::new();
    for child in document.document.children {
        if let docx_rs::DocumentChild::Paragraph(paragraph) = child {
            for child in paragraph.children {
                if let docx_rs::ParagraphChild::Run(run) = child {
                    for child in run.children {
                        if let docx_rs::RunChild::Text(t) = child {
                            text.push_str(&t.text);
                        }
                    }
                }
            }
            text.push('\n');
        }
    }

    Ok(text)
}
