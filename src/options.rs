//! Extraction options and configuration.

use crate::model::TableStrategy;

/// Lines scanned after the "Controle de Versões" header.
pub const DEFAULT_VERSION_WINDOW: usize = 120;

/// Lines scanned after the "Histórico de Alterações / Cronograma" header.
pub const DEFAULT_SCHEDULE_WINDOW: usize = 250;

/// Leading table rows searched for a rule header.
pub const DEFAULT_HEADER_SCAN_ROWS: usize = 3;

/// Options for extracting rules and version info from bulletins.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Error handling mode for unreadable pages on the table path
    pub error_mode: ErrorMode,

    /// Table detection strategies, applied in order on every page
    pub strategies: Vec<TableStrategy>,

    /// Lines after the version-control header to scan
    pub version_window: usize,

    /// Lines after the schedule header to scan
    pub schedule_window: usize,

    /// Leading rows of each table searched for a header
    pub header_scan_rows: usize,

    /// Whether batch extraction processes documents in parallel
    pub parallel: bool,
}

impl ExtractOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set error mode.
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Enable lenient mode (skip unreadable pages).
    pub fn lenient(mut self) -> Self {
        self.error_mode = ErrorMode::Lenient;
        self
    }

    /// Set the table detection strategies.
    pub fn with_strategies(mut self, strategies: impl Into<Vec<TableStrategy>>) -> Self {
        self.strategies = strategies.into();
        self
    }

    /// Set the version scan window in lines.
    pub fn with_version_window(mut self, lines: usize) -> Self {
        self.version_window = lines;
        self
    }

    /// Set the schedule scan window in lines.
    pub fn with_schedule_window(mut self, lines: usize) -> Self {
        self.schedule_window = lines;
        self
    }

    /// Set how many leading rows are searched for a header.
    pub fn with_header_scan_rows(mut self, rows: usize) -> Self {
        self.header_scan_rows = rows;
        self
    }

    /// Enable or disable parallel batch processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Process batches one document at a time.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            error_mode: ErrorMode::Strict,
            strategies: TableStrategy::DEFAULT_ORDER.to_vec(),
            version_window: DEFAULT_VERSION_WINDOW,
            schedule_window: DEFAULT_SCHEDULE_WINDOW,
            header_scan_rows: DEFAULT_HEADER_SCAN_ROWS,
            parallel: false,
        }
    }
}

/// Error handling mode for pages whose content cannot be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Abort the table path; the document falls back to the text path
    #[default]
    Strict,
    /// Skip the page and continue with the rest
    Lenient,
}
