//! Multi-strategy table extraction for one page.

use serde::Serialize;

use crate::error::Result;
use crate::model::{RawTable, TableStrategy};

use super::layout::PageContent;
use super::ruling::RulingTableFinder;
use super::table_detector::TableDetector;

/// A strategy that could not process a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyFailure {
    pub page: u32,
    pub strategy: TableStrategy,
    pub reason: String,
}

/// Tables found on one page, plus the strategies that failed there.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageTables {
    pub tables: Vec<RawTable>,
    pub failures: Vec<StrategyFailure>,
}

/// Runs the configured table strategies over page content.
#[derive(Debug, Clone)]
pub struct TableExtractor {
    strategies: Vec<TableStrategy>,
    lines: RulingTableFinder,
    lines_strict: RulingTableFinder,
    text: TableDetector,
}

impl TableExtractor {
    /// Create an extractor applying `strategies` in order.
    pub fn new(strategies: impl Into<Vec<TableStrategy>>) -> Self {
        Self {
            strategies: strategies.into(),
            lines: RulingTableFinder::lines(),
            lines_strict: RulingTableFinder::lines_strict(),
            text: TableDetector::new(),
        }
    }

    /// Extract tables from a page with every strategy.
    ///
    /// Tables are concatenated in strategy order without deduplication. A
    /// failing strategy is recorded and does not stop the others.
    pub fn extract_page(&self, page: &PageContent) -> PageTables {
        let mut result = PageTables::default();

        for &strategy in &self.strategies {
            match self.run(strategy, page) {
                Ok(tables) => result.tables.extend(tables),
                Err(e) => {
                    log::debug!(
                        "Table strategy {} failed on page {}: {}",
                        strategy,
                        page.page,
                        e
                    );
                    result.failures.push(StrategyFailure {
                        page: page.page,
                        strategy,
                        reason: e.to_string(),
                    });
                }
            }
        }

        result
    }

    fn run(&self, strategy: TableStrategy, page: &PageContent) -> Result<Vec<RawTable>> {
        match strategy {
            TableStrategy::Lines => self.lines.find_tables(page),
            TableStrategy::LinesStrict => self.lines_strict.find_tables(page),
            TableStrategy::Text => Ok(self.text.find_tables(page)),
        }
    }
}

impl Default for TableExtractor {
    fn default() -> Self {
        Self::new(TableStrategy::DEFAULT_ORDER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::MAX_EDGES;
    use crate::parser::{Segment, SegmentKind, TextSpan};

    fn boxed_row_page() -> PageContent {
        let mut page = PageContent::new(1);
        for x in [50.0, 150.0] {
            let corners = [(x, 700.0), (x + 100.0, 700.0), (x + 100.0, 720.0), (x, 720.0)];
            for i in 0..4 {
                page.segments.push(Segment::new(
                    corners[i],
                    corners[(i + 1) % 4],
                    SegmentKind::RectEdge,
                ));
            }
        }
        page.spans.push(TextSpan::new("Aplic.", 55.0, 706.0, 9.0));
        page.spans.push(TextSpan::new("Msg", 155.0, 706.0, 9.0));
        page
    }

    #[test]
    fn test_strategies_run_in_order() {
        let page = boxed_row_page();
        let result = TableExtractor::default().extract_page(&page);
        assert!(result.failures.is_empty());
        assert_eq!(result.tables.len(), 1);
        assert_eq!(result.tables[0].strategy, TableStrategy::Lines);
    }

    #[test]
    fn test_failure_is_isolated() {
        let mut page = boxed_row_page();
        for i in 0..=MAX_EDGES {
            let y = 100.0 + i as f32 * 0.01;
            page.segments.push(Segment::new((0.0, y), (5.0, y), SegmentKind::Line));
        }

        let extractor = TableExtractor::new([TableStrategy::Lines, TableStrategy::Text]);
        let result = extractor.extract_page(&page);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].strategy, TableStrategy::Lines);
        assert_eq!(result.failures[0].page, 1);
    }
}
