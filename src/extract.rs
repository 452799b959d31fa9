//! Text extraction from downloaded document bytes.
//!
//! Only PDF is supported. Bytes that do not carry the PDF signature, or that
//! the parser rejects, are reported as [`ExtractError`]s. A panic inside the
//! parser is caught and reported the same way.

use thiserror::Error;

/// Leading bytes of every PDF file.
const PDF_MAGIC: &[u8] = b"%PDF-";
/// How far into the payload the signature may appear.
const PDF_MAGIC_WINDOW: usize = 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("content is not a PDF document")]
    NotPdf,
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("document contains no extractable text")]
    Empty,
}

/// Converts raw document bytes into text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError>;
}

/// PDF text extractor backed by `pdf-extract`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        if !looks_like_pdf(bytes) {
            return Err(ExtractError::NotPdf);
        }

        let text = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
            .map_err(|_| ExtractError::Pdf("parser panicked on malformed input".to_string()))?
            .map_err(|e| ExtractError::Pdf(e.to_string()))?;

        let text = text.trim();
        if text.is_empty() {
            return Err(ExtractError::Empty);
        }
        Ok(text.to_string())
    }
}

/// Checks for the `%PDF-` signature near the start of the payload.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(PDF_MAGIC_WINDOW)];
    head.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC)
}
