//! Document parsers — pull the raw text layer out of a submitted file.
//!
//! A parser never fails loudly: a missing file, a corrupt PDF, or a PDF
//! without a text layer all come back as `None`.

use std::path::Path;

/// Extracts raw text from a document on disk.
pub trait DocumentParser: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Return the document's text, or `None` if it cannot be read.
    fn extract_text(&self, path: &Path) -> Option<String>;
}

/// PDF text-layer parser backed by `pdf-extract`.
pub struct PdfTextParser;

impl PdfTextParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfTextParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for PdfTextParser {
    fn name(&self) -> &str {
        "pdf"
    }

    fn extract_text(&self, path: &Path) -> Option<String> {
        // pdf-extract panics on some malformed inputs instead of returning Err.
        let result = std::panic::catch_unwind(|| pdf_extract::extract_text(path));

        match result {
            Ok(Ok(text)) if !text.trim().is_empty() => Some(text),
            Ok(Ok(_)) => {
                tracing::warn!(path = %path.display(), "PDF has no text layer");
                None
            }
            Ok(Err(e)) => {
                tracing::warn!(path = %path.display(), "Failed to read PDF: {}", e);
                None
            }
            Err(_) => {
                tracing::warn!(path = %path.display(), "PDF parser panicked");
                None
            }
        }
    }
}

/// Reads UTF-8 text files as-is. Used for text exports of the form and in tests.
pub struct PlainTextParser;

impl DocumentParser for PlainTextParser {
    fn name(&self) -> &str {
        "text"
    }

    fn extract_text(&self, path: &Path) -> Option<String> {
        match std::fs::read_to_string(path) {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Failed to read document: {}", e);
                None
            }
        }
    }
}
