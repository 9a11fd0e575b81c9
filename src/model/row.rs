//! Output row types.

use serde::{Deserialize, Serialize};

use super::RuleRecord;

/// Output column headers, in file order.
///
/// Downstream spreadsheets address columns by these labels, so both the text
/// and the order are fixed.
pub const COLUMNS: [&str; 11] = [
    "NT",
    "Versão",
    "Publicada em",
    "Implantação Homologação",
    "Implantação Produção",
    "Grupo",
    "Campo",
    "Regra",
    "Aplic.",
    "Msg",
    "Descrição",
];

/// Version label and deployment dates of a bulletin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Latest version label, e.g. "1.20"
    pub version: Option<String>,
    /// Staging (homologação) deployment date, "dd/mm/yyyy"
    pub staging_date: Option<String>,
    /// Production deployment date, "dd/mm/yyyy"
    pub production_date: Option<String>,
}

/// One row of the exported dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRow {
    #[serde(rename = "NT")]
    pub title: String,

    #[serde(rename = "Versão")]
    pub version: Option<String>,

    #[serde(rename = "Publicada em")]
    pub published: Option<String>,

    #[serde(rename = "Implantação Homologação")]
    pub staging_date: Option<String>,

    #[serde(rename = "Implantação Produção")]
    pub production_date: Option<String>,

    /// Reserved; never populated.
    #[serde(rename = "Grupo")]
    pub group: Option<String>,

    #[serde(rename = "Campo")]
    pub field_code: Option<String>,

    #[serde(rename = "Regra")]
    pub rule_id: Option<String>,

    #[serde(rename = "Aplic.")]
    pub applicability: Option<String>,

    #[serde(rename = "Msg")]
    pub message: Option<String>,

    #[serde(rename = "Descrição")]
    pub description: Option<String>,
}

impl OutputRow {
    /// A row carrying only document metadata (no rule).
    pub fn metadata_only(
        title: impl Into<String>,
        published: Option<String>,
        info: &VersionInfo,
    ) -> Self {
        Self {
            title: title.into(),
            version: info.version.clone(),
            published,
            staging_date: info.staging_date.clone(),
            production_date: info.production_date.clone(),
            ..Default::default()
        }
    }

    /// A row for one extracted rule.
    pub fn for_rule(
        title: impl Into<String>,
        published: Option<String>,
        info: &VersionInfo,
        rule: RuleRecord,
    ) -> Self {
        Self {
            field_code: Some(rule.field_code),
            rule_id: Some(rule.rule_id),
            applicability: Some(rule.applicability),
            message: Some(rule.message),
            description: Some(rule.description),
            ..Self::metadata_only(title, published, info)
        }
    }

    /// Version info carried by this row.
    pub fn version_info(&self) -> VersionInfo {
        VersionInfo {
            version: self.version.clone(),
            staging_date: self.staging_date.clone(),
            production_date: self.production_date.clone(),
        }
    }

    /// Check if every rule column is empty.
    pub fn is_metadata_only(&self) -> bool {
        [
            &self.group,
            &self.field_code,
            &self.rule_id,
            &self.applicability,
            &self.message,
            &self.description,
        ]
        .iter()
        .all(|v| v.as_deref().map_or(true, str::is_empty))
    }

    /// Check if the row carries a rule description.
    pub fn has_description(&self) -> bool {
        self.description.as_deref().is_some_and(|d| !d.is_empty())
    }

    /// Cell values in [`COLUMNS`] order; missing values become empty cells.
    pub fn to_record(&self) -> [String; 11] {
        let cell = |v: &Option<String>| v.clone().unwrap_or_default();
        [
            self.title.clone(),
            cell(&self.version),
            cell(&self.published),
            cell(&self.staging_date),
            cell(&self.production_date),
            cell(&self.group),
            cell(&self.field_code),
            cell(&self.rule_id),
            cell(&self.applicability),
            cell(&self.message),
            cell(&self.description),
        ]
    }
}
