//! Rule extraction from free text.
//!
//! Used when no table of a bulletin yields a rule. The validation-rules
//! section is split into paragraphs and each paragraph is scanned by
//! independent detectors; a paragraph becomes a record when it carries a
//! description plus at least one identifying field.

use std::sync::OnceLock;

use regex::Regex;

use crate::model::RuleRecord;
use crate::normalize::normalize_text;

fn rules_section_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^[ \t]*7\.[ \t]*Regras[ \t]+de[ \t]+Valida(?:ç|c)(?:ã|a)o[^\n]*").unwrap()
    })
}

fn paragraph_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n(?:[ \t]*\n)+").unwrap())
}

fn obrig_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bObrig\.").unwrap())
}

fn facult_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bFacult\.").unwrap())
}

fn message_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([0-9]{3,4})\b").unwrap())
}

fn rule_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Z]{1,3}[0-9]{1,3}[A-Za-z\-]*[0-9]*)\b").unwrap())
}

fn field_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z]{1,3}[0-9]{1,3}").unwrap())
}

fn rejection_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)Rejei(?:ç|c)(?:ã|a)o:\s*(.*)$").unwrap())
}

fn applicability_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(?:Obrig\.|Facult\.)\s*").unwrap())
}

/// Body of the validation-rules section: the text after its "7. Regras de
/// Validação" header line, or `None` when the header is absent.
pub fn find_rules_section(text: &str) -> Option<&str> {
    rules_section_re().find(text).map(|m| &text[m.end()..])
}

/// Detect the applicability marker of a paragraph.
pub fn detect_applicability(paragraph: &str) -> Option<&'static str> {
    if obrig_re().is_match(paragraph) {
        Some("Obrig.")
    } else if facult_re().is_match(paragraph) {
        Some("Facult.")
    } else {
        None
    }
}

/// First standalone run of 3 or 4 digits.
pub fn detect_message_code(paragraph: &str) -> Option<&str> {
    message_code_re()
        .captures(paragraph)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// First token shaped like a rule id, e.g. "B09-20" or "GA02".
pub fn detect_rule_id(paragraph: &str) -> Option<&str> {
    rule_id_re()
        .captures(paragraph)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Leading letters and digits of a rule id ("B09-20" → "B09").
pub fn derive_field_code(rule_id: &str) -> Option<&str> {
    field_code_re().find(rule_id).map(|m| m.as_str())
}

/// Description of a paragraph.
///
/// The text after "Rejeição:" when present, otherwise the whole paragraph
/// without a leading applicability marker.
pub fn detect_description(paragraph: &str) -> String {
    if let Some(rest) = rejection_re().captures(paragraph).and_then(|c| c.get(1)) {
        return rest.as_str().trim().to_string();
    }
    applicability_prefix_re()
        .replace(paragraph, "")
        .trim()
        .to_string()
}

/// Build a record from one normalized paragraph, if it passes the text gate.
pub fn parse_rule_paragraph(paragraph: &str) -> Option<RuleRecord> {
    let rule_id = detect_rule_id(paragraph).unwrap_or_default();

    let record = RuleRecord {
        field_code: derive_field_code(rule_id).unwrap_or_default().to_string(),
        rule_id: rule_id.to_string(),
        applicability: detect_applicability(paragraph)
            .unwrap_or_default()
            .to_string(),
        message: detect_message_code(paragraph)
            .unwrap_or_default()
            .to_string(),
        description: detect_description(paragraph),
    };

    record.passes_text_gate().then_some(record)
}

/// Extract rule records from the validation-rules section of a document's
/// text. Returns nothing when the section header is absent.
pub fn parse_rule_text(text: &str) -> Vec<RuleRecord> {
    let Some(body) = find_rules_section(text) else {
        return Vec::new();
    };

    paragraph_break_re()
        .split(body)
        .map(normalize_text)
        .filter(|p| !p.is_empty())
        .filter_map(|p| parse_rule_paragraph(&p))
        .collect()
}
