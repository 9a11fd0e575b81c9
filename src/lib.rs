//! # ntrules
//!
//! Validation-rule extraction from NF-e technical bulletin PDFs.
//!
//! Technical bulletins ("Notas Técnicas") describe changes to the electronic
//! invoice schema. Each one carries a version history, a deployment schedule
//! and a section of validation rules, usually laid out as ruled tables. This
//! library reads those PDFs and produces one flat row per rule, ready to be
//! exported as CSV or JSON.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ntrules::{extract_batch, export, DocumentSource, ExtractOptions};
//!
//! fn main() -> ntrules::Result<()> {
//!     let sources = vec![DocumentSource::new("NT 2025.001", "data/pdfs/nt2025001.pdf")];
//!
//!     let batch = extract_batch(&sources, &ExtractOptions::default());
//!     let path = export::write_csv(&batch.rows, "output/resultado_nts.csv".as_ref())?;
//!     println!("{} rules written to {}", batch.rule_count, path.display());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Pipeline
//!
//! - **Text**: positioned text from the content stream, with lopdf's own
//!   extractor as a fallback
//! - **Version and schedule**: line-window scans after fixed section headers
//! - **Tables**: ruled-line detection (tolerant and strict) plus a
//!   text-alignment detector for borderless tables
//! - **Rules**: header-mapped table rows, or paragraph heuristics over the
//!   validation-rules section when no table yields a rule

pub mod detect;
pub mod error;
pub mod export;
pub mod extract;
pub mod model;
pub mod normalize;
pub mod options;
pub mod parser;
pub mod rules;

// Re-export commonly used types
pub use detect::{detect_format_from_bytes, detect_format_from_path, is_pdf, PdfFormat};
pub use error::{Error, Result};
pub use export::{write_csv, write_json, write_rows, OutputFormat};
pub use extract::{
    extract_batch, BatchReport, DocumentExtractor, DocumentReport, DocumentSource, RuleSource,
};
pub use model::{
    Extraction, HeaderMapping, OutputRow, RawTable, RuleField, RuleRecord, TableStrategy,
    VersionInfo, COLUMNS,
};
pub use normalize::normalize_text;
pub use options::{ErrorMode, ExtractOptions};
pub use parser::{PdfDocument, TableExtractor};
pub use rules::{parse_rule_table, parse_rule_tables, parse_rule_text, ScheduleScan, VersionScan};

use std::path::Path;

/// Extract the linear text of a PDF.
///
/// Never fails; see [`parser::extract_document_text`].
///
/// # Example
///
/// ```no_run
/// let text = ntrules::extract_text("nt2025001.pdf");
/// if text.degraded {
///     eprintln!("fallback used: {:?}", text.reason);
/// }
/// println!("{}", text.value);
/// ```
pub fn extract_text<P: AsRef<Path>>(path: P) -> Extraction<String> {
    parser::extract_document_text(path)
}

/// Extract every raw table of a PDF with the given strategies.
///
/// Pages whose content cannot be interpreted are skipped with a warning.
pub fn extract_tables<P: AsRef<Path>>(path: P, options: &ExtractOptions) -> Result<Vec<RawTable>> {
    let doc = PdfDocument::open(path)?;
    let extractor = TableExtractor::new(options.strategies.clone());

    let mut tables = Vec::new();
    for page_num in doc.page_numbers() {
        match doc.page_content(page_num) {
            Ok(content) => tables.extend(extractor.extract_page(&content).tables),
            Err(e) => log::warn!("Skipping page {}: {}", page_num, e),
        }
    }
    Ok(tables)
}

/// Extract version label and deployment dates from a PDF.
pub fn extract_version_info<P: AsRef<Path>>(path: P, options: &ExtractOptions) -> VersionInfo {
    let text = extract_text(path);
    rules::extract_version_info(&text.value, options).0
}

/// Process a single PDF with default options.
///
/// # Example
///
/// ```no_run
/// let report = ntrules::extract_document("NT 2025.001", "nt2025001.pdf");
/// for row in &report.rows {
///     println!("{:?}", row.to_record());
/// }
/// ```
pub fn extract_document<P: AsRef<Path>>(title: &str, path: P) -> DocumentReport {
    DocumentExtractor::default().extract(&DocumentSource::new(title, path.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_document_missing_file() {
        let report = extract_document("NT", "/nonexistent/nt.pdf");
        assert_eq!(report.rows.len(), 1);
        assert!(report.rows[0].is_metadata_only());
        assert_eq!(report.rule_source, RuleSource::None);
    }

    #[test]
    fn test_extract_tables_rejects_missing_file() {
        assert!(extract_tables("/nonexistent/nt.pdf", &ExtractOptions::default()).is_err());
    }
}
