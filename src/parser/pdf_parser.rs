//! PDF document access using lopdf.

use std::io::Read;
use std::path::Path;

use lopdf::Document as LopdfDocument;

use crate::detect::detect_format_from_path;
use crate::error::Result;
use crate::model::Extraction;
use crate::normalize::compose_text;

use super::layout::{blocks_to_text, LayoutAnalyzer, PageContent};

/// An opened PDF document.
pub struct PdfDocument {
    doc: LopdfDocument,
}

impl PdfDocument {
    /// Open a PDF file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Verify it's a PDF
        detect_format_from_path(path)?;

        let doc = LopdfDocument::load(path)?;

        Ok(Self { doc })
    }

    /// Parse a PDF from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let doc = LopdfDocument::load_mem(data)?;

        Ok(Self { doc })
    }

    /// Parse a PDF from a reader.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(&data)
    }

    /// Get the number of pages.
    pub fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    /// 1-based page numbers in document order.
    pub fn page_numbers(&self) -> Vec<u32> {
        self.doc.get_pages().keys().copied().collect()
    }

    /// Check if the document is encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.doc.is_encrypted()
    }

    /// Get the PDF version string.
    pub fn version(&self) -> String {
        self.doc.version.clone()
    }

    /// Interpret one page into spans and painted segments.
    pub fn page_content(&self, page_num: u32) -> Result<PageContent> {
        LayoutAnalyzer::new(&self.doc).extract_page_content(page_num)
    }

    /// Extract the text of one page.
    ///
    /// Layout interpretation is tried first because it keeps paragraph
    /// breaks; lopdf's own text extraction is the fallback. The result is
    /// never an error: a page no path can read yields an empty, degraded
    /// value.
    pub fn page_text(&self, page_num: u32) -> Extraction<String> {
        let primary = LayoutAnalyzer::new(&self.doc)
            .extract_page_blocks(page_num)
            .map(|blocks| blocks_to_text(&blocks));

        let reason = match primary {
            Ok(text) if !text.trim().is_empty() => return Extraction::ok(compose_text(&text)),
            Ok(_) => None,
            Err(e) => Some(e.to_string()),
        };

        match self.doc.extract_text(&[page_num]) {
            Ok(text) if !text.trim().is_empty() => {
                let reason =
                    reason.unwrap_or_else(|| format!("page {}: no positioned text", page_num));
                log::debug!("Page {} text from fallback extractor: {}", page_num, reason);
                Extraction::degraded(compose_text(&text), reason)
            }
            // Both paths agree the page carries no text
            Ok(_) if reason.is_none() => Extraction::ok(String::new()),
            Ok(_) => Extraction::degraded(String::new(), reason.unwrap_or_default()),
            Err(e) => {
                let reason = match reason {
                    Some(primary) => format!("{}; fallback: {}", primary, e),
                    None => return Extraction::ok(String::new()),
                };
                log::warn!("Failed to extract text from page {}: {}", page_num, reason);
                Extraction::degraded(String::new(), reason)
            }
        }
    }

    /// Extract the text of every page, joined by line breaks in page order.
    pub fn text(&self) -> Extraction<String> {
        let mut pages = Vec::new();
        let mut result = Extraction::ok(String::new());

        for page_num in self.page_numbers() {
            let page = self.page_text(page_num);
            if let Some(reason) = page.reason {
                result.mark_degraded(reason);
            }
            pages.push(page.value);
        }

        result.value = pages.join("\n");
        result
    }
}
