//! Validation rule types.

use serde::{Deserialize, Serialize};

/// Canonical rule fields a table column can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleField {
    /// Rule identifier, e.g. "B09-20"
    RuleId,
    /// Field code, e.g. "B09"
    FieldCode,
    /// "Obrig." or "Facult."
    Applicability,
    /// Rejection message code (cStat)
    Message,
    /// Rule description
    Description,
}

impl RuleField {
    /// All fields, in mapping order.
    pub const ALL: [RuleField; 5] = [
        RuleField::RuleId,
        RuleField::FieldCode,
        RuleField::Applicability,
        RuleField::Message,
        RuleField::Description,
    ];

    /// Lowercase header label fragments that identify this field's column.
    ///
    /// "id" is shared by the rule-id and field-code sets; whichever field is
    /// mapped first claims the first matching column.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            RuleField::RuleId => &["regra", "rv", "id"],
            RuleField::FieldCode => &["campo", "id"],
            RuleField::Applicability => &["aplic"],
            RuleField::Message => &["msg", "cstat"],
            RuleField::Description => &["descr", "descrição", "descricao", "observ"],
        }
    }
}

/// Column index per canonical field for one table's header row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HeaderMapping {
    pub rule_id: Option<usize>,
    pub field_code: Option<usize>,
    pub applicability: Option<usize>,
    pub message: Option<usize>,
    pub description: Option<usize>,
}

impl HeaderMapping {
    /// Column index for a field, if the header has one.
    pub fn get(&self, field: RuleField) -> Option<usize> {
        match field {
            RuleField::RuleId => self.rule_id,
            RuleField::FieldCode => self.field_code,
            RuleField::Applicability => self.applicability,
            RuleField::Message => self.message,
            RuleField::Description => self.description,
        }
    }

    /// Set the column index for a field.
    pub fn set(&mut self, field: RuleField, index: Option<usize>) {
        match field {
            RuleField::RuleId => self.rule_id = index,
            RuleField::FieldCode => self.field_code = index,
            RuleField::Applicability => self.applicability = index,
            RuleField::Message => self.message = index,
            RuleField::Description => self.description = index,
        }
    }

    /// Number of fields that found a column.
    pub fn mapped_count(&self) -> usize {
        RuleField::ALL
            .iter()
            .filter(|f| self.get(**f).is_some())
            .count()
    }
}

/// Minimum description length for a table row to count as a rule.
pub(crate) const MIN_TABLE_DESCRIPTION_CHARS: usize = 3;

/// One validation rule of a bulletin. Empty strings mean "not found".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    pub field_code: String,
    pub rule_id: String,
    pub applicability: String,
    pub message: String,
    pub description: String,
}

impl RuleRecord {
    /// Get a field value.
    pub fn field(&self, field: RuleField) -> &str {
        match field {
            RuleField::RuleId => &self.rule_id,
            RuleField::FieldCode => &self.field_code,
            RuleField::Applicability => &self.applicability,
            RuleField::Message => &self.message,
            RuleField::Description => &self.description,
        }
    }

    /// Set a field value.
    pub fn set_field(&mut self, field: RuleField, value: String) {
        match field {
            RuleField::RuleId => self.rule_id = value,
            RuleField::FieldCode => self.field_code = value,
            RuleField::Applicability => self.applicability = value,
            RuleField::Message => self.message = value,
            RuleField::Description => self.description = value,
        }
    }

    /// Check if any field carries content.
    pub fn has_content(&self) -> bool {
        RuleField::ALL.iter().any(|f| !self.field(*f).is_empty())
    }

    /// Table-path retention gate: some content and a description of at least
    /// three characters.
    pub fn passes_table_gate(&self) -> bool {
        self.has_content() && self.description.chars().count() >= MIN_TABLE_DESCRIPTION_CHARS
    }

    /// Text-path retention gate: a description plus at least one of
    /// applicability, message code or rule id.
    pub fn passes_text_gate(&self) -> bool {
        !self.description.is_empty()
            && (!self.applicability.is_empty()
                || !self.message.is_empty()
                || !self.rule_id.is_empty())
    }
}
