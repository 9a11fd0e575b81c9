//! End-to-end tests over generated bulletin PDFs.

use std::path::Path;

use chrono::NaiveDate;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use ntrules::{
    extract_batch, extract_tables, extract_text, write_csv, DocumentExtractor, DocumentSource,
    ExtractOptions, RuleSource, TableStrategy, COLUMNS,
};

/// Write a PDF whose pages carry the given content operations, all using
/// Helvetica as `/F1`. Content streams are stored without a filter.
fn build_pdf(pages: Vec<Vec<Operation>>, path: &Path) {
    write_pdf(pages, path, false);
}

/// Same as [`build_pdf`], with content streams FlateDecode-compressed.
fn build_compressed_pdf(pages: Vec<Vec<Operation>>, path: &Path) {
    write_pdf(pages, path, true);
}

fn write_pdf(pages: Vec<Vec<Operation>>, path: &Path, compress: bool) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for operations in pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    if compress {
        doc.compress();
    }
    doc.save(path).unwrap();
}

fn text(x: i64, y: i64, size: i64, s: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), size.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![Object::string_literal(s)]),
        Operation::new("ET", vec![]),
    ]
}

fn stroked_rect(x: i64, y: i64, w: i64, h: i64) -> Vec<Operation> {
    vec![
        Operation::new("re", vec![x.into(), y.into(), w.into(), h.into()]),
        Operation::new("S", vec![]),
    ]
}

/// Version history and deployment schedule, as plain lines.
fn front_page() -> Vec<Operation> {
    let lines = [
        "Nota Tecnica 2025.001",
        "Controle de Versoes",
        "1.00 Jan/2025 Publicacao inicial",
        "1.10 Mar/2025 Ajustes nas regras",
        "Historico de Alteracoes / Cronograma",
        "Publicacao 10/01/2025",
        "Homologacao 15/06/2025",
        "Producao 01/07/2025",
    ];
    lines
        .iter()
        .enumerate()
        .flat_map(|(i, line)| text(50, 780 - 20 * i as i64, 12, line))
        .collect()
}

/// A boxed two-row rule table.
fn table_page() -> Vec<Operation> {
    let columns = [(30, 60), (90, 60), (150, 60), (210, 60), (270, 300)];
    let rows = [
        (700, ["Campo", "Regra", "Aplic.", "Msg", "Descricao"]),
        (680, ["B09", "B09-20", "Obrig.", "656", "Rejeicao: Campo obrigatorio"]),
    ];

    let mut ops = Vec::new();
    for (y, cells) in rows {
        for ((x, w), cell) in columns.iter().zip(cells) {
            ops.extend(stroked_rect(*x, y, *w, 20));
            ops.extend(text(x + 4, y + 6, 8, cell));
        }
    }
    ops
}

/// A validation-rules section without tables.
fn rules_text_page() -> Vec<Operation> {
    let mut ops = text(50, 700, 14, "7. Regras de Validacao");
    let paragraphs: [&[&str]; 3] = [
        &["B09-20 Obrig. 656", "Rejeicao: Campo obrigatorio", "nao informado"],
        &["Texto explicativo", "sem codigo algum", "de referencia"],
        &["B10-01 Facult. 700", "Rejeicao: Data de emissao", "invalida"],
    ];

    let mut y = 660;
    for paragraph in paragraphs {
        for line in paragraph {
            ops.extend(text(50, y, 10, line));
            y -= 12;
        }
        y -= 28;
    }
    ops
}

fn published() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()
}

#[test]
fn test_table_bulletin_yields_one_rule_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nt2025001.pdf");
    build_pdf(vec![front_page(), table_page()], &path);

    let source = DocumentSource::new("NT 2025.001", &path).with_published(published());
    let report = DocumentExtractor::default().extract(&source);

    assert!(report.failure.is_none());
    assert_eq!(report.rule_source, RuleSource::Table);
    assert_eq!(report.rows.len(), 1);

    let row = &report.rows[0];
    assert_eq!(row.title, "NT 2025.001");
    assert_eq!(row.published.as_deref(), Some("10/01/2025"));
    assert_eq!(row.version.as_deref(), Some("1.10"));
    assert_eq!(row.staging_date.as_deref(), Some("15/06/2025"));
    assert_eq!(row.production_date.as_deref(), Some("01/07/2025"));
    assert!(row.group.is_none());
    assert_eq!(row.field_code.as_deref(), Some("B09"));
    assert_eq!(row.rule_id.as_deref(), Some("B09-20"));
    assert_eq!(row.applicability.as_deref(), Some("Obrig."));
    assert_eq!(row.message.as_deref(), Some("656"));
    assert_eq!(row.description.as_deref(), Some("Rejeicao: Campo obrigatorio"));

    assert_eq!(report.version_scan.candidates, vec!["1.00", "1.10"]);
    assert_eq!(report.schedule_scan.dates.len(), 3);
}

#[test]
fn test_compressed_bulletin_yields_same_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nt2025001z.pdf");
    build_compressed_pdf(vec![front_page(), table_page()], &path);

    let doc = Document::load(&path).unwrap();
    let table_page_id = doc.get_pages()[&2];
    let contents = doc
        .get_dictionary(table_page_id)
        .and_then(|page| page.get(b"Contents"))
        .and_then(Object::as_reference)
        .unwrap();
    let stream = doc.get_object(contents).and_then(Object::as_stream).unwrap();
    assert!(stream.dict.has(b"Filter"));

    let source = DocumentSource::new("NT 2025.001", &path).with_published(published());
    let report = DocumentExtractor::default().extract(&source);

    assert_eq!(report.rule_source, RuleSource::Table);
    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0].rule_id.as_deref(), Some("B09-20"));
    assert_eq!(report.rows[0].version.as_deref(), Some("1.10"));
    assert_eq!(report.rows[0].production_date.as_deref(), Some("01/07/2025"));
}

#[test]
fn test_text_fallback_when_no_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nt2025002.pdf");
    build_pdf(vec![rules_text_page()], &path);

    let report = extract_batch(
        &[DocumentSource::new("NT 2025.002", &path)],
        &ExtractOptions::default(),
    );
    assert_eq!(report.documents[0].rule_source, RuleSource::Text);
    assert_eq!(report.rows.len(), 2);
    assert_eq!(report.rule_count, 2);

    let first = &report.rows[0];
    assert_eq!(first.rule_id.as_deref(), Some("B09-20"));
    assert_eq!(first.field_code.as_deref(), Some("B09"));
    assert_eq!(first.applicability.as_deref(), Some("Obrig."));
    assert_eq!(first.message.as_deref(), Some("656"));
    assert_eq!(
        first.description.as_deref(),
        Some("Campo obrigatorio\nnao informado")
    );

    let second = &report.rows[1];
    assert_eq!(second.rule_id.as_deref(), Some("B10-01"));
    assert_eq!(second.applicability.as_deref(), Some("Facult."));
    assert_eq!(second.message.as_deref(), Some("700"));
    assert!(second.version.is_none());
}

#[test]
fn test_rule_rows_share_bulletin_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nt2025005.pdf");
    build_pdf(vec![front_page(), rules_text_page()], &path);

    let source = DocumentSource::new("NT 2025.005", &path).with_published(published());
    let report = DocumentExtractor::default().extract(&source);

    assert_eq!(report.rule_source, RuleSource::Text);
    assert_eq!(report.rows.len(), 2);
    for row in &report.rows {
        assert_eq!(row.title, "NT 2025.005");
        assert_eq!(row.published.as_deref(), Some("10/01/2025"));
        assert_eq!(row.version.as_deref(), Some("1.10"));
        assert_eq!(row.staging_date.as_deref(), Some("15/06/2025"));
        assert_eq!(row.production_date.as_deref(), Some("01/07/2025"));
    }
}

#[test]
fn test_bulletin_without_rules_yields_metadata_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nt2025003.pdf");
    build_pdf(vec![text(50, 700, 12, "Nota Tecnica sem regras")], &path);

    let source = DocumentSource::new("NT 2025.003", &path).with_published(published());
    let report = DocumentExtractor::default().extract(&source);

    assert_eq!(report.rule_source, RuleSource::None);
    assert_eq!(report.rows.len(), 1);
    assert!(report.rows[0].is_metadata_only());
    assert_eq!(report.rows[0].published.as_deref(), Some("10/01/2025"));
    assert!(report.rows[0].version.is_none());
    assert_eq!(report.rule_count(), 0);
}

#[test]
fn test_blank_page_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blank.pdf");
    build_pdf(vec![vec![]], &path);

    let text = extract_text(&path);
    assert!(!text.degraded);
    assert!(text.value.trim().is_empty());
}

#[test]
fn test_raw_tables_from_ruled_cells() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tables.pdf");
    build_pdf(vec![table_page()], &path);

    let tables = extract_tables(&path, &ExtractOptions::default()).unwrap();
    assert_eq!(tables.len(), 1);

    let table = &tables[0];
    assert_eq!(table.page, 1);
    assert_eq!(table.strategy, TableStrategy::Lines);
    assert_eq!(
        table.rows,
        vec![
            vec!["Campo", "Regra", "Aplic.", "Msg", "Descricao"],
            vec!["B09", "B09-20", "Obrig.", "656", "Rejeicao: Campo obrigatorio"],
        ]
    );
}

#[test]
fn test_linear_text_keeps_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("front.pdf");
    build_pdf(vec![front_page()], &path);

    let text = extract_text(&path);
    assert!(!text.degraded);
    assert!(text.value.contains("Controle de Versoes\n1.00 Jan/2025 Publicacao inicial"));
}

#[test]
fn test_batch_export_to_csv() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("nt2025001.pdf");
    build_pdf(vec![front_page(), table_page()], &pdf);

    let sources = vec![
        DocumentSource::new("NT 2025.001", &pdf).with_published(published()),
        DocumentSource::unavailable("NT 2025.004"),
    ];
    let batch = extract_batch(&sources, &ExtractOptions::default().with_parallel(true));
    assert_eq!(batch.rows.len(), 2);
    assert_eq!(batch.rule_count, 1);

    let out = write_csv(&batch.rows, &dir.path().join("out/resultado_nts.csv")).unwrap();
    let mut reader = csv::Reader::from_path(&out).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(headers, COLUMNS);

    let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 2);
    assert_eq!(&records[0][0], "NT 2025.001");
    assert_eq!(&records[0][1], "1.10");
    assert_eq!(&records[0][7], "B09-20");
    assert_eq!(&records[1][0], "NT 2025.004");
    assert!(records[1].iter().skip(1).all(str::is_empty));
}
