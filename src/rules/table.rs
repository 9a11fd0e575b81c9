//! Rule extraction from detected tables.

use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::model::{HeaderMapping, RawTable, RuleField, RuleRecord};
use crate::normalize::{fold_diacritics, normalize_opt, normalize_text};
use crate::options::{ErrorMode, ExtractOptions};
use crate::parser::{PdfDocument, StrategyFailure, TableExtractor};

const APPLICABILITY_LABELS: &[&str] = &["aplic"];
const MESSAGE_LABELS: &[&str] = &["msg", "mensagem", "cstat"];
const DESCRIPTION_LABELS: &[&str] = &["descr", "observ"];
const RULE_LABELS: &[&str] = &["regra"];

/// Rules collected from every table of a document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableRules {
    /// Records that passed the table gate, in page and table order
    pub records: Vec<RuleRecord>,
    /// Number of tables inspected
    pub tables: usize,
    /// Strategies that failed on some page
    pub failures: Vec<StrategyFailure>,
    /// Pages skipped in lenient mode
    pub skipped_pages: Vec<u32>,
}

/// Header labels lowercased and without accents.
fn header_cells<S: AsRef<str>>(row: &[S]) -> Vec<String> {
    row.iter()
        .map(|c| fold_diacritics(&normalize_text(c.as_ref())).to_lowercase())
        .collect()
}

fn any_cell_contains(cells: &[String], labels: &[&str]) -> bool {
    cells
        .iter()
        .any(|cell| labels.iter().any(|label| cell.contains(label)))
}

/// Check if a row looks like the header of a validation-rule table.
///
/// A header either pairs an applicability column with a message column, or a
/// description column with a rule column. Matching ignores case and accents.
pub fn is_rule_header<S: AsRef<str>>(row: &[S]) -> bool {
    let cells = header_cells(row);

    (any_cell_contains(&cells, APPLICABILITY_LABELS) && any_cell_contains(&cells, MESSAGE_LABELS))
        || (any_cell_contains(&cells, DESCRIPTION_LABELS)
            && any_cell_contains(&cells, RULE_LABELS))
}

/// Map each rule field to the first header cell containing one of its aliases.
pub fn map_header<S: AsRef<str>>(header: &[S]) -> HeaderMapping {
    let cells = header_cells(header);
    let mut mapping = HeaderMapping::default();

    for field in RuleField::ALL {
        let index = cells
            .iter()
            .position(|cell| field.aliases().iter().any(|alias| cell.contains(alias)));
        mapping.set(field, index);
    }

    mapping
}

/// Extract rule records from one raw table.
///
/// The header is searched among the first `header_scan_rows` rows; rows after
/// it become records when they pass the table gate.
pub fn parse_rule_table(table: &RawTable, header_scan_rows: usize) -> Vec<RuleRecord> {
    if table.row_count() < 2 {
        return Vec::new();
    }

    let Some(header_index) = table
        .rows
        .iter()
        .take(header_scan_rows)
        .position(|row| is_rule_header(row))
    else {
        return Vec::new();
    };

    let mapping = map_header(&table.rows[header_index]);
    log::trace!(
        "Rule header on page {} ({}): {:?}",
        table.page,
        table.strategy,
        mapping
    );

    table.rows[header_index + 1..]
        .iter()
        .filter_map(|row| {
            // Short rows read as empty cells
            let mut record = RuleRecord::default();
            for field in RuleField::ALL {
                if let Some(index) = mapping.get(field) {
                    record.set_field(field, normalize_opt(row.get(index).map(String::as_str)));
                }
            }

            record.passes_table_gate().then_some(record)
        })
        .collect()
}

/// Extract rules from every table of an opened document.
///
/// In strict mode a page that cannot be interpreted fails the whole call; in
/// lenient mode it is skipped with a warning.
pub fn parse_document_tables(doc: &PdfDocument, options: &ExtractOptions) -> Result<TableRules> {
    let extractor = TableExtractor::new(options.strategies.clone());
    let mut result = TableRules::default();

    for page_num in doc.page_numbers() {
        let content = match doc.page_content(page_num) {
            Ok(content) => content,
            Err(e) => match options.error_mode {
                ErrorMode::Strict => return Err(e),
                ErrorMode::Lenient => {
                    log::warn!("Skipping page {}: {}", page_num, e);
                    result.skipped_pages.push(page_num);
                    continue;
                }
            },
        };

        let page = extractor.extract_page(&content);
        result.tables += page.tables.len();
        result.failures.extend(page.failures);

        for table in &page.tables {
            result
                .records
                .extend(parse_rule_table(table, options.header_scan_rows));
        }
    }

    log::debug!(
        "{} rule(s) from {} table(s)",
        result.records.len(),
        result.tables
    );

    Ok(result)
}

/// Open a PDF and extract rules from its tables.
pub fn parse_rule_tables<P: AsRef<Path>>(
    path: P,
    options: &ExtractOptions,
) -> Result<Vec<RuleRecord>> {
    let doc = PdfDocument::open(path)?;
    Ok(parse_document_tables(&doc, options)?.records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TableStrategy;

    fn table(rows: &[&[&str]]) -> RawTable {
        RawTable::from_rows(1, TableStrategy::Lines, rows.iter().map(|r| r.iter().copied()))
    }

    #[test]
    fn test_header_with_applicability_and_message() {
        assert!(is_rule_header(&["Aplic.", "Mensagem", "Cstat"]));
        assert!(is_rule_header(&["Campo", "APLIC.", "Msg"]));
        assert!(!is_rule_header(&["Campo", "Aplic."]));
    }

    #[test]
    fn test_header_with_description_and_rule() {
        assert!(is_rule_header(&["Regra", "Observação"]));
        assert!(is_rule_header(&["Regra de validação", "Descrição"]));
        assert!(!is_rule_header(&["Versão", "Data", "Descrição"]));
    }

    #[test]
    fn test_map_header() {
        let mapping = map_header(&["Campo", "Regra", "Aplic.", "Msg", "Descrição"]);
        assert_eq!(mapping.field_code, Some(0));
        assert_eq!(mapping.rule_id, Some(1));
        assert_eq!(mapping.applicability, Some(2));
        assert_eq!(mapping.message, Some(3));
        assert_eq!(mapping.description, Some(4));
    }

    #[test]
    fn test_map_header_shared_id_alias() {
        let mapping = map_header(&["ID", "Aplic.", "Msg", "Descrição"]);
        assert_eq!(mapping.rule_id, Some(0));
        assert_eq!(mapping.field_code, Some(0));
    }

    #[test]
    fn test_parse_rule_table() {
        let t = table(&[
            &["Campo", "Regra", "Aplic.", "Msg", "Descrição"],
            &["B09", "B09-20", "Obrig.", "656", "Rejeição: Campo   obrigatório"],
        ]);
        let records = parse_rule_table(&t, 3);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field_code, "B09");
        assert_eq!(records[0].rule_id, "B09-20");
        assert_eq!(records[0].applicability, "Obrig.");
        assert_eq!(records[0].message, "656");
        assert_eq!(records[0].description, "Rejeição: Campo obrigatório");
    }

    #[test]
    fn test_short_description_rejected() {
        let t = table(&[
            &["Regra", "Aplic.", "Msg", "Descrição"],
            &["B09-20", "Obrig.", "656", "ok"],
        ]);
        assert!(parse_rule_table(&t, 3).is_empty());
    }

    #[test]
    fn test_single_row_table() {
        let t = table(&[&["Regra", "Aplic.", "Msg", "Descrição"]]);
        assert!(parse_rule_table(&t, 3).is_empty());
    }

    #[test]
    fn test_header_not_in_first_rows() {
        let t = table(&[
            &["a", "b"],
            &["c", "d"],
            &["e", "f"],
            &["Regra", "Descrição"],
            &["B09-20", "Campo obrigatório"],
        ]);
        assert!(parse_rule_table(&t, 3).is_empty());
        assert_eq!(parse_rule_table(&t, 4).len(), 1);
    }

    #[test]
    fn test_header_after_title_row() {
        let t = table(&[
            &["Regras de validação do grupo B"],
            &["Regra", "Aplic.", "Msg", "Descrição"],
            &["B09-20", "Obrig.", "656", "Campo obrigatório"],
        ]);
        let records = parse_rule_table(&t, 3);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "656");
    }

    #[test]
    fn test_short_rows_are_padded() {
        let t = table(&[
            &["Regra", "Aplic.", "Msg", "Descrição"],
            &["B09-20", "Obrig."],
            &["B10-01", "Facult.", "700", "Data de emissão inválida"],
        ]);
        let records = parse_rule_table(&t, 3);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].rule_id, "B10-01");
    }
}
