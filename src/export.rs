//! Writers for the extracted rows.
//!
//! Both formats follow [`COLUMNS`]: CSV as the header row and cell order, JSON
//! as the object keys.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::model::{OutputRow, COLUMNS};

/// Output file format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Comma-separated values with a header row
    #[default]
    Csv,

    /// JSON array of objects keyed by column name
    Json,
}

impl OutputFormat {
    /// File extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => Err(Error::Other(format!("unknown output format: {}", other))),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// `"<stem> (novo).<ext>"` beside `path`.
pub fn alternate_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{} (novo).{}", stem, ext.to_string_lossy()),
        None => format!("{} (novo)", stem),
    };
    path.with_file_name(name)
}

/// Return a path that can be written.
///
/// When `path` exists but is locked or read-only (typically because a
/// spreadsheet program has it open), the alternate name from
/// [`alternate_path`] is returned instead.
pub fn ensure_writable_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    match OpenOptions::new().append(true).open(path) {
        Ok(_) => path.to_path_buf(),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            let alt = alternate_path(path);
            log::warn!(
                "{} is in use; writing to {} instead",
                path.display(),
                alt.display()
            );
            alt
        }
        Err(_) => path.to_path_buf(),
    }
}

fn create_output(path: &Path) -> Result<(PathBuf, File)> {
    let path = ensure_writable_path(path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(&path)?;
    Ok((path, file))
}

/// Write rows as CSV. The header row is written even when `rows` is empty.
///
/// Returns the path actually written.
pub fn write_csv(rows: &[OutputRow], path: &Path) -> Result<PathBuf> {
    let (path, file) = create_output(path)?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));

    writer.write_record(COLUMNS)?;
    for row in rows {
        writer.write_record(row.to_record())?;
    }
    writer.flush()?;

    Ok(path)
}

/// Write rows as a JSON array.
///
/// Returns the path actually written.
pub fn write_json(rows: &[OutputRow], path: &Path, pretty: bool) -> Result<PathBuf> {
    let (path, file) = create_output(path)?;
    let mut writer = BufWriter::new(file);

    if pretty {
        serde_json::to_writer_pretty(&mut writer, rows)?;
    } else {
        serde_json::to_writer(&mut writer, rows)?;
    }
    writer.flush()?;

    Ok(path)
}

/// Write rows in the given format.
pub fn write_rows(rows: &[OutputRow], path: &Path, format: OutputFormat) -> Result<PathBuf> {
    match format {
        OutputFormat::Csv => write_csv(rows, path),
        OutputFormat::Json => write_json(rows, path, true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RuleRecord, VersionInfo};

    fn rows() -> Vec<OutputRow> {
        let info = VersionInfo {
            version: Some("1.20".to_string()),
            ..Default::default()
        };
        let rule = RuleRecord {
            field_code: "B09".to_string(),
            rule_id: "B09-20".to_string(),
            applicability: "Obrig.".to_string(),
            message: "656".to_string(),
            description: "Campo obrigatório, \"cNF\"".to_string(),
        };
        vec![
            OutputRow::for_rule("NT 2025.001", Some("10/01/2025".to_string()), &info, rule),
            OutputRow::metadata_only("NT 2025.002", None, &VersionInfo::default()),
        ]
    }

    #[test]
    fn test_alternate_path() {
        assert_eq!(
            alternate_path(Path::new("out/resultado_nts.csv")),
            PathBuf::from("out/resultado_nts (novo).csv")
        );
        assert_eq!(
            alternate_path(Path::new("resultado")),
            PathBuf::from("resultado (novo)")
        );
    }

    #[test]
    fn test_writable_path_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.csv");
        assert_eq!(ensure_writable_path(&path), path);

        fs::write(&path, b"old").unwrap();
        assert_eq!(ensure_writable_path(&path), path);
    }

    #[test]
    fn test_csv_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&[], &dir.path().join("empty.csv")).unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content.trim_end(), COLUMNS.join(","));
    }

    #[test]
    fn test_csv_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&rows(), &dir.path().join("nested/rules.csv")).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, COLUMNS);

        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(&records[0][1], "1.20");
        assert_eq!(&records[0][7], "B09-20");
        assert_eq!(&records[0][10], "Campo obrigatório, \"cNF\"");
        assert_eq!(&records[1][0], "NT 2025.002");
        assert_eq!(&records[1][1], "");
    }

    #[test]
    fn test_json_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_rows(&rows(), &dir.path().join("rules.json"), OutputFormat::Json).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        let array = value.as_array().unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array[0]["Regra"], "B09-20");
        assert_eq!(array[0]["Versão"], "1.20");
        assert!(array[1]["Descrição"].is_null());
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("csv".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("xlsx".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }
}
