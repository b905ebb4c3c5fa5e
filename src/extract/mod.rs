//! Text extraction from uploaded transcripts.
//!
//! Accepts PDFs and plain text. Output is always whitespace-normalized: every
//! run of whitespace, including newlines and page breaks, becomes one space
//! and both ends are trimmed.

mod pdf;

#[cfg(test)]
pub(crate) use pdf::build_test_pdf;

use thiserror::Error;
use tracing::debug;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";

/// Errors that can occur during text extraction.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported file type: {0}. Only PDF and TXT are allowed.")]
    UnsupportedFormat(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),
}

/// Method used to extract text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    /// Embedded PDF text via lopdf.
    PdfText,
    /// UTF-8 decode of a text upload.
    PlainText,
}

/// Result of text extraction.
#[derive(Debug)]
pub struct ExtractionResult {
    /// Normalized text; may be empty for image-only PDFs.
    pub text: String,
    pub method: ExtractionMethod,
    /// Number of pages in the source (PDFs only).
    pub page_count: Option<u32>,
}

/// Format detected from the declared media type and filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    Pdf,
    Text,
}

impl UploadFormat {
    /// Classify an upload, or `None` if it is not an accepted type.
    pub fn detect(mime_type: &str, filename: &str) -> Option<Self> {
        let mime = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if mime == MIME_PDF {
            Some(Self::Pdf)
        } else if mime == MIME_TEXT || filename.to_ascii_lowercase().ends_with(".txt") {
            Some(Self::Text)
        } else {
            None
        }
    }
}

/// Stateless extractor turning an upload buffer into normalized text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextExtractor;

impl TextExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract normalized text from `buffer`.
    ///
    /// Returns an empty string rather than an error when a PDF decodes but
    /// carries no text layer.
    pub fn extract(
        &self,
        buffer: &[u8],
        mime_type: &str,
        filename: &str,
    ) -> Result<ExtractionResult, ExtractionError> {
        let format = UploadFormat::detect(mime_type, filename)
            .ok_or_else(|| ExtractionError::UnsupportedFormat(mime_type.to_string()))?;

        let result = match format {
            UploadFormat::Pdf => {
                let (raw, pages) = pdf::extract_pdf_text(buffer)?;
                ExtractionResult {
                    text: normalize_whitespace(&raw),
                    method: ExtractionMethod::PdfText,
                    page_count: Some(pages),
                }
            }
            UploadFormat::Text => {
                let raw = std::str::from_utf8(buffer).map_err(|e| {
                    ExtractionError::ExtractionFailed(format!("invalid UTF-8 text: {}", e))
                })?;
                ExtractionResult {
                    text: normalize_whitespace(raw),
                    method: ExtractionMethod::PlainText,
                    page_count: None,
                }
            }
        };

        debug!(
            "Extracted {} chars from {} ({:?})",
            result.text.len(),
            filename,
            result.method
        );
        Ok(result)
    }
}

/// Collapse every whitespace run to a single space and trim.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(UploadFormat::detect("application/pdf", "a.pdf"), Some(UploadFormat::Pdf));
        assert_eq!(
            UploadFormat::detect("text/plain; charset=utf-8", "a"),
            Some(UploadFormat::Text)
        );
        assert_eq!(
            UploadFormat::detect("application/octet-stream", "notes.TXT"),
            Some(UploadFormat::Text)
        );
        assert_eq!(UploadFormat::detect("image/png", "scan.png"), None);
    }

    #[test]
    fn test_plain_text_is_normalized() {
        let input = "  Good morning,\n\teveryone.\r\n\r\nRevenue   rose.  ";
        let result = TextExtractor::new()
            .extract(input.as_bytes(), "text/plain", "call.txt")
            .unwrap();
        assert_eq!(result.text, "Good morning, everyone. Revenue rose.");
        assert_eq!(result.method, ExtractionMethod::PlainText);
        assert_eq!(result.page_count, None);
    }

    #[test]
    fn test_whitespace_only_text_is_empty() {
        let result = TextExtractor::new()
            .extract(b" \n\t ", "text/plain", "blank.txt")
            .unwrap();
        assert!(result.text.is_empty());
    }

    #[test]
    fn test_invalid_utf8_fails() {
        let err = TextExtractor::new()
            .extract(&[0x66, 0xff, 0xfe], "text/plain", "bad.txt")
            .unwrap_err();
        assert!(matches!(err, ExtractionError::ExtractionFailed(_)));
    }

    #[test]
    fn test_unsupported_format() {
        let err = TextExtractor::new()
            .extract(b"GIF89a", "image/gif", "chart.gif")
            .unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedFormat(_)));
        assert_eq!(
            err.to_string(),
            "Unsupported file type: image/gif. Only PDF and TXT are allowed."
        );
    }

    #[test]
    fn test_garbage_pdf_fails() {
        let err = TextExtractor::new()
            .extract(b"not really a pdf", "application/pdf", "call.pdf")
            .unwrap_err();
        assert!(matches!(err, ExtractionError::ExtractionFailed(_)));
    }
}
