//! Data model for extracted bulletin content.
//!
//! Raw tables come out of the parser, rule records and version info come out
//! of the rule extractors, and output rows are what the exporters write.

mod extraction;
mod row;
mod rule;
mod table;

pub use extraction::Extraction;
pub use row::{OutputRow, VersionInfo, COLUMNS};
pub use rule::{HeaderMapping, RuleField, RuleRecord};
pub use table::{RawTable, TableStrategy};
