//! Per-document orchestration and batch extraction.
//!
//! A bulletin goes through text extraction, the version and schedule scans,
//! the table path and, when the tables yield nothing, the text path. Every
//! document produces at least one output row, so a batch never loses a
//! bulletin because one of its steps failed.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;

use crate::model::{OutputRow, RuleRecord, VersionInfo};
use crate::options::ExtractOptions;
use crate::parser::{document_text, PdfDocument, StrategyFailure};
use crate::rules::{
    extract_version_info, parse_document_tables, parse_rule_text, ScheduleScan, VersionScan,
};

/// Date format of the "Publicada em" column.
pub const PUBLISHED_DATE_FORMAT: &str = "%d/%m/%Y";

/// One bulletin to process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSource {
    /// Bulletin title, copied to the "NT" column
    pub title: String,
    /// Publication date from the listing
    pub published: Option<NaiveDate>,
    /// Local PDF, or `None` when the bulletin could not be retrieved as a PDF
    pub pdf: Option<PathBuf>,
}

impl DocumentSource {
    /// Create a source backed by a local PDF.
    pub fn new(title: impl Into<String>, pdf: impl Into<PathBuf>) -> Self {
        Self {
            title: title.into(),
            published: None,
            pdf: Some(pdf.into()),
        }
    }

    /// Create a source whose PDF could not be retrieved.
    pub fn unavailable(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            published: None,
            pdf: None,
        }
    }

    /// Set the publication date.
    pub fn with_published(mut self, date: NaiveDate) -> Self {
        self.published = Some(date);
        self
    }

    /// Publication date as written to the output.
    pub fn published_label(&self) -> Option<String> {
        self.published
            .map(|d| d.format(PUBLISHED_DATE_FORMAT).to_string())
    }
}

/// Which path produced a document's rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSource {
    /// Detected tables
    Table,
    /// The validation-rules section of the text
    Text,
    /// No rule found
    #[default]
    None,
}

impl std::fmt::Display for RuleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RuleSource::Table => "table",
            RuleSource::Text => "text",
            RuleSource::None => "none",
        })
    }
}

/// Everything extracted from one bulletin, plus diagnostics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentReport {
    pub title: String,
    /// Output rows: one per rule, or a single metadata-only row
    pub rows: Vec<OutputRow>,
    pub rule_source: RuleSource,
    /// Why text extraction fell back, if it did
    pub text_degraded: Option<String>,
    pub version_scan: VersionScan,
    pub schedule_scan: ScheduleScan,
    /// Table strategies that failed on some page
    pub strategy_failures: Vec<StrategyFailure>,
    /// Why the document could not be processed normally
    pub failure: Option<String>,
}

impl DocumentReport {
    /// A report holding a single metadata-only row.
    fn metadata_only(source: &DocumentSource, info: &VersionInfo, failure: Option<String>) -> Self {
        Self {
            title: source.title.clone(),
            rows: vec![OutputRow::metadata_only(
                source.title.clone(),
                source.published_label(),
                info,
            )],
            failure,
            ..Default::default()
        }
    }

    /// Number of rows carrying a rule description.
    pub fn rule_count(&self) -> usize {
        self.rows.iter().filter(|r| r.has_description()).count()
    }
}

/// Extracts rules and version info from bulletins.
#[derive(Debug, Clone, Default)]
pub struct DocumentExtractor {
    options: ExtractOptions,
}

impl DocumentExtractor {
    /// Create an extractor with the given options.
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    /// Get the extraction options.
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Process one bulletin. Never fails: problems degrade the report.
    pub fn extract(&self, source: &DocumentSource) -> DocumentReport {
        let Some(path) = &source.pdf else {
            log::warn!("No PDF for \"{}\"; writing metadata only", source.title);
            return DocumentReport::metadata_only(
                source,
                &VersionInfo::default(),
                Some("PDF not available".to_string()),
            );
        };

        let doc = match PdfDocument::open(path) {
            Ok(doc) => Some(doc),
            Err(e) => {
                log::warn!("Failed to open {}: {}", path.display(), e);
                None
            }
        };

        let Some(doc) = doc else {
            return DocumentReport::metadata_only(
                source,
                &VersionInfo::default(),
                Some(format!("cannot open {}", path.display())),
            );
        };

        let text = document_text(&doc);
        let (info, version_scan, schedule_scan) = extract_version_info(&text.value, &self.options);

        let mut report = DocumentReport {
            title: source.title.clone(),
            text_degraded: text.reason.clone(),
            version_scan,
            schedule_scan,
            ..Default::default()
        };

        let mut records: Vec<RuleRecord> = match parse_document_tables(&doc, &self.options) {
            Ok(tables) => {
                report.strategy_failures = tables.failures;
                tables.records
            }
            Err(e) => {
                log::debug!("Table path failed for \"{}\": {}", source.title, e);
                Vec::new()
            }
        };

        if !records.is_empty() {
            report.rule_source = RuleSource::Table;
        } else {
            records = parse_rule_text(&text.value);
            if !records.is_empty() {
                report.rule_source = RuleSource::Text;
            }
        }

        log::info!(
            "\"{}\": {} rule(s) from {}",
            source.title,
            records.len(),
            report.rule_source
        );

        let published = source.published_label();
        report.rows = if records.is_empty() {
            vec![OutputRow::metadata_only(
                source.title.clone(),
                published,
                &info,
            )]
        } else {
            records
                .into_iter()
                .map(|rule| OutputRow::for_rule(source.title.clone(), published.clone(), &info, rule))
                .collect()
        };

        report
    }

    /// Process one bulletin, turning a panic into a metadata-only report.
    pub fn extract_guarded(&self, source: &DocumentSource) -> DocumentReport {
        guarded(source, |source| self.extract(source))
    }
}

/// Run `work` on one source; a panic degrades the source to a metadata-only
/// report carrying the panic message.
fn guarded<F>(source: &DocumentSource, work: F) -> DocumentReport
where
    F: FnOnce(&DocumentSource) -> DocumentReport,
{
    match catch_unwind(AssertUnwindSafe(|| work(source))) {
        Ok(report) => report,
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            log::error!("Extraction of \"{}\" panicked: {}", source.title, reason);
            DocumentReport::metadata_only(source, &VersionInfo::default(), Some(reason))
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Rows and per-document reports of a batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// All output rows, documents in input order
    pub rows: Vec<OutputRow>,
    pub documents: Vec<DocumentReport>,
    /// Rows carrying a rule description
    pub rule_count: usize,
}

/// Process a batch of bulletins.
///
/// Documents are processed in parallel when `options.parallel` is set; the
/// output order always follows the input order.
pub fn extract_batch(sources: &[DocumentSource], options: &ExtractOptions) -> BatchReport {
    let extractor = DocumentExtractor::new(options.clone());
    run_batch(sources, options.parallel, |source| extractor.extract(source))
}

fn run_batch<F>(sources: &[DocumentSource], parallel: bool, work: F) -> BatchReport
where
    F: Fn(&DocumentSource) -> DocumentReport + Sync,
{
    let documents: Vec<DocumentReport> = if parallel {
        sources
            .par_iter()
            .map(|source| guarded(source, &work))
            .collect()
    } else {
        sources
            .iter()
            .map(|source| guarded(source, &work))
            .collect()
    };

    let rows: Vec<OutputRow> = documents
        .iter()
        .flat_map(|d| d.rows.iter().cloned())
        .collect();
    let rule_count = rows.iter().filter(|r| r.has_description()).count();

    BatchReport {
        rows,
        documents,
        rule_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_source_yields_metadata_row() {
        let source = DocumentSource::unavailable("NT 2025.001")
            .with_published(NaiveDate::from_ymd_opt(2025, 3, 7).unwrap());
        let report = DocumentExtractor::default().extract(&source);

        assert_eq!(report.rows.len(), 1);
        let row = &report.rows[0];
        assert!(row.is_metadata_only());
        assert_eq!(row.title, "NT 2025.001");
        assert_eq!(row.published.as_deref(), Some("07/03/2025"));
        assert!(row.version.is_none());
        assert_eq!(report.rule_source, RuleSource::None);
        assert!(report.failure.is_some());

        let guarded = DocumentExtractor::default().extract_guarded(&source);
        assert_eq!(guarded.rows, report.rows);
        assert_eq!(guarded.failure, report.failure);
    }

    #[test]
    fn test_unreadable_pdf_yields_metadata_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4\nnot really a pdf").unwrap();

        let report = DocumentExtractor::default().extract(&DocumentSource::new("NT", &path));
        assert_eq!(report.rows.len(), 1);
        assert!(report.rows[0].is_metadata_only());
        assert!(report.failure.is_some());
    }

    #[test]
    fn test_batch_preserves_order() {
        let sources: Vec<DocumentSource> = (0..8)
            .map(|i| DocumentSource::unavailable(format!("NT {}", i)))
            .collect();

        for parallel in [false, true] {
            let options = ExtractOptions::default().with_parallel(parallel);
            let batch = extract_batch(&sources, &options);
            let titles: Vec<&str> = batch.rows.iter().map(|r| r.title.as_str()).collect();
            assert_eq!(
                titles,
                (0..8).map(|i| format!("NT {}", i)).collect::<Vec<_>>()
            );
            assert_eq!(batch.documents.len(), 8);
            assert_eq!(batch.rule_count, 0);
        }
    }

    #[test]
    fn test_panicking_document_does_not_stop_batch() {
        let sources: Vec<DocumentSource> = ["NT 1", "NT 2", "NT 3"]
            .into_iter()
            .map(DocumentSource::unavailable)
            .collect();
        let work = |source: &DocumentSource| {
            if source.title == "NT 2" {
                panic!("corrupt cross-reference table");
            }
            DocumentReport::metadata_only(source, &VersionInfo::default(), None)
        };

        for parallel in [false, true] {
            let batch = run_batch(&sources, parallel, work);

            assert_eq!(batch.documents.len(), 3);
            assert_eq!(batch.rows.len(), 3);
            let titles: Vec<&str> = batch.rows.iter().map(|r| r.title.as_str()).collect();
            assert_eq!(titles, ["NT 1", "NT 2", "NT 3"]);

            let failed = &batch.documents[1];
            assert_eq!(failed.rows.len(), 1);
            assert!(failed.rows[0].is_metadata_only());
            assert_eq!(
                failed.failure.as_deref(),
                Some("corrupt cross-reference table")
            );
            assert!(batch.documents[0].failure.is_none());
            assert!(batch.documents[2].failure.is_none());
        }
    }

    #[test]
    fn test_guarded_passes_report_through() {
        let source = DocumentSource::unavailable("NT 9");
        let report = guarded(&source, |s| {
            DocumentReport::metadata_only(s, &VersionInfo::default(), None)
        });
        assert!(report.failure.is_none());
        assert_eq!(report.rows[0].title, "NT 9");
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
