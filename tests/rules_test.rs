//! Integration tests for the rule heuristics through the public API.

use ntrules::rules::{
    derive_field_code, detect_description, find_rules_section, is_rule_header, map_header,
    scan_schedule, scan_versions,
};
use ntrules::{normalize_text, parse_rule_table, parse_rule_text, RawTable, TableStrategy};

fn table(rows: &[&[&str]]) -> RawTable {
    RawTable::from_rows(2, TableStrategy::Text, rows.iter().map(|r| r.iter().copied()))
}

#[test]
fn test_normalize_is_idempotent() {
    let samples = [
        "  B09-20\u{00A0}\u{00A0}Obrig. \t 656 ",
        "linha 1\n\n\n\nlinha 2",
        "a \n \n b",
        "",
    ];
    for s in samples {
        let once = normalize_text(s);
        assert_eq!(normalize_text(&once), once);
        assert_eq!(once.trim(), once);
        assert!(!once.contains("  "));
    }
    assert_eq!(normalize_text("a \n \n b"), "a\nb");
}

#[test]
fn test_header_variants() {
    assert!(is_rule_header(&["Aplic.", "Mensagem", "Cstat"]));
    assert!(is_rule_header(&["  DESCRIÇÃO ", "Regra"]));
    assert!(!is_rule_header(&["Grupo", "Campo", "Tipo"]));

    let mapping = map_header(&["#", "Campo", "Regra", "Aplic.", "cStat", "Observação"]);
    assert_eq!(mapping.message, Some(4));
    assert_eq!(mapping.description, Some(5));
    assert_eq!(mapping.mapped_count(), 5);
}

#[test]
fn test_every_table_record_has_a_description() {
    let t = table(&[
        &["Grupo B"],
        &["Campo", "Regra", "Aplic.", "Msg", "Descrição"],
        &["B09", "B09-20", "Obrig.", "656", "Campo obrigatório"],
        &["B09", "B09-30", "Obrig.", "657", ""],
        &["", "", "", "", "Nota geral sobre o grupo"],
        &["B12", "B12-10", "Facult.", "", "  Valor   inválido  "],
    ]);
    let records = parse_rule_table(&t, 3);

    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.description.chars().count() >= 3));
    assert_eq!(records[1].rule_id, "");
    assert_eq!(records[2].description, "Valor inválido");
}

#[test]
fn test_text_records_pass_gate() {
    let text = "Sumário\n7. Regras de Validação\n\n\
                GA02 Obrig. Rejeição: Grupo de autorização duplicado\n\n\
                Somente texto descritivo\n\n\
                Facult. Informar o código do município";
    let records = parse_rule_text(text);

    assert_eq!(records.len(), 2);
    for record in &records {
        assert!(!record.description.is_empty());
        assert!(
            !record.applicability.is_empty()
                || !record.message.is_empty()
                || !record.rule_id.is_empty()
        );
    }
    assert_eq!(records[0].rule_id, "GA02");
    assert_eq!(records[0].field_code, "GA02");
    assert_eq!(records[0].message, "");
    assert_eq!(records[1].description, "Informar o código do município");
}

#[test]
fn test_rules_section_must_start_a_line() {
    assert!(find_rules_section("conforme 7. Regras de Validação").is_none());
    assert!(find_rules_section("6. Leiaute\n  7. REGRAS DE VALIDAÇÃO\nx").is_some());
}

#[test]
fn test_field_code_and_description_helpers() {
    assert_eq!(derive_field_code("C02a-10"), Some("C02"));
    assert_eq!(detect_description("Facult. Rejeicao:   texto"), "texto");
}

#[test]
fn test_scans_without_headers_leave_values_unset() {
    let text = "1.00 Jan/2025 inicial\n10/01/2025\n15/06/2025";
    let versions = scan_versions(text, 120);
    let schedule = scan_schedule(text, 250);

    assert!(!versions.header_found);
    assert!(versions.version.is_none());
    assert!(!schedule.header_found);
    assert!(schedule.staging.is_none());
    assert!(schedule.production.is_none());
}

#[test]
fn test_version_on_header_line() {
    let text = "Controle de Versões 1.30 Jun/2025 revisão\n1.40 Jul/2025 revisão";
    let scan = scan_versions(text, 1);
    assert_eq!(scan.candidates, vec!["1.30"]);

    let scan = scan_versions(text, 2);
    assert_eq!(scan.version.as_deref(), Some("1.40"));
}
