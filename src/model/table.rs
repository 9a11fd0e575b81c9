//! Raw table types.

use serde::{Deserialize, Serialize};

/// Table detection strategy that produced a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStrategy {
    /// Ruled lines and rectangle edges, tolerant snapping
    Lines,
    /// Text alignment (tables without visible borders)
    Text,
    /// Ruled line segments only, rectangle edges ignored
    LinesStrict,
}

impl TableStrategy {
    /// Default detection order.
    pub const DEFAULT_ORDER: [TableStrategy; 3] = [
        TableStrategy::Lines,
        TableStrategy::Text,
        TableStrategy::LinesStrict,
    ];

    /// Short name used in logs and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            TableStrategy::Lines => "lines",
            TableStrategy::Text => "text",
            TableStrategy::LinesStrict => "lines_strict",
        }
    }
}

impl std::fmt::Display for TableStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A table as found on a page: rows of cell strings.
///
/// Rows are not guaranteed to have equal width; consumers pad or tolerate
/// short rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTable {
    /// 1-based page number the table was found on
    pub page: u32,

    /// Strategy that detected the table
    pub strategy: TableStrategy,

    /// Rows of cells, top to bottom
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Create an empty table.
    pub fn new(page: u32, strategy: TableStrategy) -> Self {
        Self {
            page,
            strategy,
            rows: Vec::new(),
        }
    }

    /// Create a table from string rows.
    pub fn from_rows<R, S>(page: u32, strategy: TableStrategy, rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            page,
            strategy,
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(Into::into).collect())
                .collect(),
        }
    }

    /// Add a row.
    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Get the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the width of the widest row.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Check if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ragged_rows() {
        let table = RawTable::from_rows(
            1,
            TableStrategy::Text,
            vec![vec!["a", "b", "c"], vec!["d"]],
        );
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_count(), 3);
        assert!(!table.is_empty());
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(TableStrategy::LinesStrict.to_string(), "lines_strict");
        assert_eq!(TableStrategy::DEFAULT_ORDER.len(), 3);
    }
}
