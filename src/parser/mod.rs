//! PDF parsing module.

mod layout;
mod pdf_parser;
mod ruling;
mod table_detector;
mod tables;
mod text;

pub use layout::{
    blocks_to_text, group_lines_into_blocks, group_spans_into_lines, LayoutAnalyzer, Matrix,
    PageContent, Segment, SegmentKind, TextBlock, TextLine, TextSpan,
};
pub use pdf_parser::PdfDocument;
pub use ruling::{RulingSettings, RulingTableFinder, MAX_EDGES};
pub use table_detector::{DetectedTable, TableDetector, TableDetectorConfig, TableRowData};
pub use tables::{PageTables, StrategyFailure, TableExtractor};
pub use text::{document_text, extract_document_text};
