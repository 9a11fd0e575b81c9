//! Heuristic parsers for the sections of a technical bulletin.
//!
//! - [`table`]: validation rules from detected tables
//! - [`text`]: validation rules from free text, used when no table yields any
//! - [`version`]: version label and deployment dates

mod table;
mod text;
mod version;

pub use table::{
    is_rule_header, map_header, parse_document_tables, parse_rule_table, parse_rule_tables,
    TableRules,
};
pub use text::{
    derive_field_code, detect_applicability, detect_description, detect_message_code,
    detect_rule_id, find_rules_section, parse_rule_paragraph, parse_rule_text,
};
pub use version::{extract_version_info, scan_schedule, scan_versions, ScheduleScan, VersionScan};
