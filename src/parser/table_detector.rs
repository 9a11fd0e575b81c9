//! Table detection from text alignment (borderless tables).
//!
//! Spans are grouped into rows by baseline; column boundaries are the left
//! edges that recur across rows. Contiguous runs of rows aligned with those
//! boundaries become tables.

use std::collections::{HashMap, HashSet};

use crate::model::{RawTable, TableStrategy};

use super::layout::{PageContent, TextSpan};

/// Width of the buckets left edges are counted in (points).
const EDGE_BUCKET: f32 = 5.0;

/// Distance within which a span counts as aligned to a column (points).
const ALIGN_TOLERANCE: f32 = 5.0;

/// A detected table region with its content.
#[derive(Debug, Clone)]
pub struct DetectedTable {
    /// Right X boundary
    pub right_x: f32,
    /// Detected column boundaries (X coordinates)
    pub columns: Vec<f32>,
    /// Rows of text spans grouped by Y position
    pub rows: Vec<TableRowData>,
}

/// A row of text spans in a table.
#[derive(Debug, Clone)]
pub struct TableRowData {
    /// Y position of this row
    pub y: f32,
    /// Spans in this row, sorted by X
    pub spans: Vec<TextSpan>,
}

/// Table detector configuration.
#[derive(Debug, Clone)]
pub struct TableDetectorConfig {
    /// Minimum number of rows to consider as table
    pub min_rows: usize,
    /// Minimum number of columns to consider as table
    pub min_columns: usize,
    /// Maximum number of columns (above this, likely word-level splitting)
    pub max_columns: usize,
    /// Rows a left edge must recur in to become a column boundary
    pub min_column_support: usize,
    /// Y tolerance for grouping spans into rows (fraction of font size)
    pub y_tolerance_factor: f32,
    /// Minimum column alignment ratio (0.0-1.0)
    pub min_alignment_ratio: f32,
    /// Minimum gap between columns (points)
    pub min_column_gap: f32,
    /// Fold rows with an empty first cell into the row above
    pub merge_continuation_rows: bool,
}

impl Default for TableDetectorConfig {
    fn default() -> Self {
        Self {
            min_rows: 3,
            min_columns: 2,
            max_columns: 8,
            min_column_support: 3,
            y_tolerance_factor: 0.4,
            min_alignment_ratio: 0.3,
            min_column_gap: 15.0,
            merge_continuation_rows: true,
        }
    }
}

/// Detects tables in a list of text spans.
#[derive(Debug, Clone, Default)]
pub struct TableDetector {
    config: TableDetectorConfig,
}

impl TableDetector {
    /// Create a new table detector with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new table detector with custom configuration.
    pub fn with_config(config: TableDetectorConfig) -> Self {
        Self { config }
    }

    /// Find borderless tables on a page.
    pub fn find_tables(&self, page: &PageContent) -> Vec<RawTable> {
        self.detect(&page.spans)
            .iter()
            .map(|t| self.to_raw_table(t, page.page))
            .collect()
    }

    /// Detect table regions in the given spans.
    pub fn detect(&self, spans: &[TextSpan]) -> Vec<DetectedTable> {
        if spans.len() < self.config.min_rows * self.config.min_columns {
            return vec![];
        }

        let rows = self.group_into_rows(spans);
        if rows.len() < self.config.min_rows {
            return vec![];
        }

        let columns = self.detect_columns(&rows);
        log::debug!(
            "TableDetector: {} rows, columns at {:?}",
            rows.len(),
            columns
        );
        if columns.len() < self.config.min_columns {
            return vec![];
        }

        let mut tables = Vec::new();
        for (start, end) in self.find_table_regions(&rows, &columns) {
            let table_rows = rows[start..=end].to_vec();

            // Columns of this region alone
            let table_columns = self.detect_columns(&table_rows);
            if table_columns.len() < self.config.min_columns {
                continue;
            }
            if table_columns.len() > self.config.max_columns {
                log::debug!(
                    "TableDetector: skipping region, too many columns ({} > {})",
                    table_columns.len(),
                    self.config.max_columns
                );
                continue;
            }
            if self.is_list_pattern(&table_rows, &table_columns) {
                log::debug!("TableDetector: skipping region, detected as list pattern");
                continue;
            }

            let right_x = table_rows
                .iter()
                .flat_map(|r| r.spans.iter())
                .map(TextSpan::right)
                .fold(f32::MIN, f32::max);

            tables.push(DetectedTable {
                right_x,
                columns: table_columns,
                rows: table_rows,
            });
        }

        tables
    }

    /// Group spans into rows by Y position, top to bottom.
    fn group_into_rows(&self, spans: &[TextSpan]) -> Vec<TableRowData> {
        let mut sorted = spans.to_vec();
        sorted.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

        let mut rows: Vec<TableRowData> = Vec::new();
        let mut current: Vec<TextSpan> = Vec::new();
        let mut current_y: Option<f32> = None;

        for span in sorted {
            let tolerance = span.font_size * self.config.y_tolerance_factor;
            match current_y {
                Some(y) if (span.y - y).abs() <= tolerance => current.push(span),
                _ => {
                    if !current.is_empty() {
                        rows.push(make_row(std::mem::take(&mut current)));
                    }
                    current_y = Some(span.y);
                    current.push(span);
                }
            }
        }

        if !current.is_empty() {
            rows.push(make_row(current));
        }

        rows
    }

    /// Detect column boundaries from recurring left edges.
    ///
    /// Rows with several spans are the evidence; when too few exist every
    /// row is counted instead.
    fn detect_columns(&self, rows: &[TableRowData]) -> Vec<f32> {
        let multi_span: Vec<&TableRowData> = rows.iter().filter(|r| r.spans.len() >= 2).collect();
        let evidence: Vec<&TableRowData> = if multi_span.len() >= self.config.min_rows {
            multi_span
        } else {
            rows.iter().collect()
        };
        if evidence.is_empty() {
            return vec![];
        }

        let mut edge_counts: HashMap<i32, usize> = HashMap::new();
        for row in &evidence {
            // Count each bucket once per row
            let buckets: HashSet<i32> = row
                .spans
                .iter()
                .map(|s| (s.x / EDGE_BUCKET).round() as i32)
                .collect();
            for bucket in buckets {
                *edge_counts.entry(bucket).or_insert(0) += 1;
            }
        }

        let min_occurrences = ((evidence.len() as f32 * self.config.min_alignment_ratio) as usize)
            .max(self.config.min_column_support);

        let mut edges: Vec<f32> = edge_counts
            .iter()
            .filter(|(_, count)| **count >= min_occurrences)
            .map(|(bucket, _)| *bucket as f32 * EDGE_BUCKET)
            .collect();
        edges.sort_by(|a, b| a.total_cmp(b));

        let mut merged: Vec<f32> = Vec::new();
        for edge in edges {
            match merged.last() {
                Some(last) if edge - last < self.config.min_column_gap => {}
                _ => merged.push(edge),
            }
        }

        merged
    }

    /// Find contiguous row regions that form tables.
    fn find_table_regions(&self, rows: &[TableRowData], columns: &[f32]) -> Vec<(usize, usize)> {
        let mut regions = Vec::new();
        let mut start: Option<usize> = None;

        for (i, row) in rows.iter().enumerate() {
            if alignment_score(row, columns) >= self.config.min_alignment_ratio {
                start.get_or_insert(i);
                continue;
            }
            if let Some(s) = start.take() {
                if i - s >= self.config.min_rows {
                    regions.push((s, i - 1));
                }
            }
        }

        if let Some(s) = start {
            if rows.len() - s >= self.config.min_rows {
                regions.push((s, rows.len() - 1));
            }
        }

        regions
    }

    /// Convert a detected table to rows of cell strings.
    pub fn to_raw_table(&self, detected: &DetectedTable, page: u32) -> RawTable {
        let columns = &detected.columns;
        let mut table = RawTable::new(page, TableStrategy::Text);

        for row_data in &detected.rows {
            let mut cells: Vec<Vec<&str>> = vec![Vec::new(); columns.len()];
            for span in &row_data.spans {
                let col = find_column_for_span(span.x, columns, detected.right_x);
                if let Some(cell) = cells.get_mut(col) {
                    cell.push(span.text.trim());
                }
            }
            let row: Vec<String> = cells.into_iter().map(|c| c.join(" ")).collect();

            let continues_previous = self.config.merge_continuation_rows
                && !table.is_empty()
                && row.first().is_some_and(|c| c.is_empty());
            match table.rows.last_mut() {
                Some(previous) if continues_previous => {
                    for (target, extra) in previous.iter_mut().zip(row) {
                        if extra.is_empty() {
                            continue;
                        }
                        if !target.is_empty() {
                            target.push('\n');
                        }
                        target.push_str(&extra);
                    }
                }
                _ => table.push_row(row),
            }
        }

        table
    }

    /// Check if detected table rows actually represent a numbered or bulleted list.
    ///
    /// A list like "1. Item" often splits into a marker span and a text span
    /// at different X positions, which looks like a two-column table.
    fn is_list_pattern(&self, rows: &[TableRowData], columns: &[f32]) -> bool {
        if columns.len() < 2 || rows.is_empty() {
            return false;
        }

        let mut bullets = 0;
        let mut numbers = 0;
        for row in rows {
            let Some(first) = row.spans.first() else {
                continue;
            };
            let text = first.text.trim();
            if is_bullet_marker(text) {
                bullets += 1;
            } else if is_number_marker(text) {
                numbers += 1;
            }
        }

        let bullet_ratio = bullets as f32 / rows.len() as f32;
        let marker_ratio = (bullets + numbers) as f32 / rows.len() as f32;

        // Numbered first columns are common in real tables, so numbers only
        // disqualify two-column regions
        bullet_ratio >= 0.5 || (columns.len() == 2 && marker_ratio >= 0.5)
    }
}

fn make_row(spans: Vec<TextSpan>) -> TableRowData {
    let y = spans.iter().map(|s| s.y).sum::<f32>() / spans.len() as f32;
    let mut spans = spans;
    spans.sort_by(|a, b| a.x.total_cmp(&b.x));
    TableRowData { y, spans }
}

/// Fraction of a row's spans that start on a column boundary.
fn alignment_score(row: &TableRowData, columns: &[f32]) -> f32 {
    if row.spans.is_empty() || columns.is_empty() {
        return 0.0;
    }

    let aligned = row
        .spans
        .iter()
        .filter(|span| columns.iter().any(|col| (span.x - col).abs() <= ALIGN_TOLERANCE))
        .count();

    aligned as f32 / row.spans.len() as f32
}

/// Find which column a span belongs to based on its X position.
fn find_column_for_span(span_x: f32, columns: &[f32], right_x: f32) -> usize {
    // Spans may start slightly before their column boundary
    for (i, &col_start) in columns.iter().enumerate() {
        let col_end = columns.get(i + 1).copied().unwrap_or(right_x + 100.0);
        if span_x >= col_start - 10.0 && span_x < col_end - 10.0 {
            return i;
        }
    }

    columns
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (span_x - **a).abs().total_cmp(&(span_x - **b).abs()))
        .map_or(0, |(i, _)| i)
}

/// Check if text is a bullet marker.
fn is_bullet_marker(text: &str) -> bool {
    matches!(
        text.trim(),
        "-" | "–" | "—" | "•" | "·" | "*" | "○" | "▪" | "◦" | "▸" | "►" | "■" | "●" | "□" | "◆"
    )
}

/// Check if text is a number-style list marker (1., 2), a., etc.).
fn is_number_marker(text: &str) -> bool {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return false;
    }

    if let Some(pos) = cleaned.find(|c: char| !c.is_ascii_digit()) {
        let (digits, suffix) = cleaned.split_at(pos);
        if !digits.is_empty() && (suffix == "." || suffix == ")") {
            return true;
        }
    }

    if cleaned.parse::<u32>().is_ok() {
        return true;
    }

    // Letter marker: "a.", "B)"
    let chars: Vec<char> = cleaned.chars().collect();
    matches!(chars.as_slice(), [letter, '.' | ')'] if letter.is_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, x: f32, y: f32) -> TextSpan {
        TextSpan::new(text, x, y, 10.0)
    }

    fn rule_table_spans() -> Vec<TextSpan> {
        let mut spans = Vec::new();
        let rows = [
            ["Campo", "Regra", "Aplic.", "Msg", "Descrição"],
            ["B09", "B09-10", "Obrig.", "655", "Data inválida"],
            ["B09", "B09-20", "Obrig.", "656", "Campo obrigatório"],
        ];
        for (r, row) in rows.iter().enumerate() {
            let y = 700.0 - r as f32 * 15.0;
            for (c, text) in row.iter().enumerate() {
                spans.push(span(text, 50.0 + c as f32 * 80.0, y));
            }
        }
        spans
    }

    #[test]
    fn test_group_into_rows() {
        let detector = TableDetector::new();
        let spans = vec![
            span("A1", 10.0, 100.0),
            span("B1", 60.0, 100.0),
            span("A2", 10.0, 85.0),
            span("B2", 60.0, 85.0),
        ];

        let rows = detector.group_into_rows(&spans);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].spans.len(), 2);
        assert_eq!(rows[0].spans[0].text, "A1");
    }

    #[test]
    fn test_detect_rule_table() {
        let page = PageContent {
            page: 4,
            spans: rule_table_spans(),
            segments: vec![],
        };

        let tables = TableDetector::new().find_tables(&page);
        assert_eq!(tables.len(), 1);

        let table = &tables[0];
        assert_eq!(table.page, 4);
        assert_eq!(table.strategy, TableStrategy::Text);
        assert_eq!(table.row_count(), 3);
        assert_eq!(
            table.rows[2],
            vec!["B09", "B09-20", "Obrig.", "656", "Campo obrigatório"]
        );
    }

    #[test]
    fn test_two_rows_are_not_enough() {
        let spans: Vec<TextSpan> = rule_table_spans().into_iter().take(10).collect();
        assert!(TableDetector::new().detect(&spans).is_empty());
    }

    #[test]
    fn test_continuation_row_is_merged() {
        let mut spans = rule_table_spans();
        spans.push(span("quando ausente", 370.0, 655.0));

        let page = PageContent {
            page: 1,
            spans,
            segments: vec![],
        };
        let tables = TableDetector::new().find_tables(&page);
        assert_eq!(tables[0].row_count(), 3);
        assert_eq!(tables[0].rows[2][4], "Campo obrigatório\nquando ausente");
    }

    #[test]
    fn test_no_table_single_column() {
        let detector = TableDetector::new();
        let spans = vec![
            span("Line 1", 10.0, 100.0),
            span("Line 2", 10.0, 85.0),
            span("Line 3", 10.0, 70.0),
        ];
        assert!(detector.detect(&spans).is_empty());
    }

    #[test]
    fn test_numbered_list_not_detected_as_table() {
        let detector = TableDetector::new();
        let spans = vec![
            span("1.", 50.0, 400.0),
            span("Identificação", 80.0, 400.0),
            span("2.", 50.0, 370.0),
            span("Emitente", 80.0, 370.0),
            span("3.", 50.0, 340.0),
            span("Destinatário", 80.0, 340.0),
            span("4.", 50.0, 310.0),
            span("Produtos", 80.0, 310.0),
        ];
        assert!(detector.detect(&spans).is_empty());
    }

    #[test]
    fn test_list_markers() {
        assert!(is_number_marker("1."));
        assert!(is_number_marker("12)"));
        assert!(is_number_marker("1 ."));
        assert!(is_number_marker("a."));
        assert!(is_bullet_marker("•"));
        assert!(!is_number_marker("B09"));
        assert!(!is_number_marker(""));
        assert!(!is_bullet_marker("Campo"));
    }
}
