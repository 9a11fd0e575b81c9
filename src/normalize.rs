//! Whitespace normalization for extracted strings.
//!
//! Every string leaving the extraction pipeline (table cells, text paragraphs,
//! header labels) passes through [`normalize_text`] so that the rule gates
//! compare like with like regardless of which extraction path produced it.

use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Ligatures emitted by some PDF producers, with their plain-letter spelling.
const LIGATURES: [(&str, &str); 7] = [
    ("\u{FB00}", "ff"),
    ("\u{FB01}", "fi"),
    ("\u{FB02}", "fl"),
    ("\u{FB03}", "ffi"),
    ("\u{FB04}", "ffl"),
    ("\u{FB05}", "st"),
    ("\u{FB06}", "st"),
];

fn horizontal_ws() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]+").unwrap())
}

fn ws_around_newline() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\n\s*").unwrap())
}

fn blank_line_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").unwrap())
}

/// Collapse whitespace and line-break noise in an extracted string.
///
/// Steps, in order:
/// 1. non-breaking spaces become regular spaces;
/// 2. runs of spaces/tabs become one space;
/// 3. any whitespace run containing a line break becomes a single `\n`;
/// 4. three or more consecutive line breaks become one blank line;
/// 5. leading and trailing whitespace is stripped.
///
/// Step 3 consumes the whole run around a line break, so blank lines inside
/// the input collapse to a single break as well. The function is pure and
/// idempotent.
pub fn normalize_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let text = text.replace('\u{00A0}', " ");
    let text = horizontal_ws().replace_all(&text, " ");
    let text = ws_around_newline().replace_all(&text, "\n");
    let text = blank_line_run().replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Normalize an optional string, mapping `None` to the empty string.
pub fn normalize_opt(text: Option<&str>) -> String {
    text.map(normalize_text).unwrap_or_default()
}

/// Compose raw extracted page text into canonical form.
///
/// PDF producers frequently emit decomposed accents (`c` + U+0327) and
/// typographic ligatures; both would defeat the section-title patterns.
pub fn compose_text(text: &str) -> String {
    let mut composed: String = text.nfc().collect();
    for (ligature, replacement) in LIGATURES {
        if composed.contains(ligature) {
            composed = composed.replace(ligature, replacement);
        }
    }
    composed
}

/// Strip the Portuguese diacritics that appear in section titles and labels.
///
/// Used for label comparisons where "Descrição" and "Descricao" must match.
pub fn fold_diacritics(text: &str) -> String {
    text.nfd()
        .filter(|c| !('\u{0300}'..='\u{036F}').contains(c))
        .collect()
}
