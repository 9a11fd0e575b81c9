//! Linear text extraction for whole documents.

use std::path::Path;

use crate::model::Extraction;

use super::pdf_parser::PdfDocument;

/// Extract the linear text of a PDF, pages joined by line breaks.
///
/// This never fails: when the file cannot be opened the result is an empty
/// string marked degraded, and the reason is logged.
pub fn extract_document_text<P: AsRef<Path>>(path: P) -> Extraction<String> {
    let path = path.as_ref();
    match PdfDocument::open(path) {
        Ok(doc) => document_text(&doc),
        Err(e) => {
            log::warn!("Failed to read text from {}: {}", path.display(), e);
            Extraction::degraded(String::new(), e.to_string())
        }
    }
}

/// Extract the linear text of an already opened document.
pub fn document_text(doc: &PdfDocument) -> Extraction<String> {
    let text = doc.text();
    if let Some(reason) = &text.reason {
        log::warn!("Text extraction degraded: {}", reason);
    }
    text
}
