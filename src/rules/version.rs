//! Version label and deployment schedule of a bulletin.
//!
//! Both values come from fixed-size line windows after a section header. The
//! choice of "last version line" and "last two dates" is a heuristic over how
//! bulletins usually lay out these sections; the raw matches are kept in the
//! scan results so that callers can check them.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::model::VersionInfo;
use crate::options::ExtractOptions;

fn control_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Controle\s+de\s+Vers(?:õ|o)es").unwrap())
}

fn version_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^([0-9]+\.[0-9]+)\s+(?:[0-9]{2}/[0-9]{4}|\p{L}+/[0-9]{4})\s+.*").unwrap()
    })
}

fn schedule_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)Hist(?:ó|o)rico\s+de\s+Altera(?:ç|c)(?:õ|o)es\s*/\s*Cronograma").unwrap()
    })
}

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([0-9]{2}/[0-9]{2}/[0-9]{4})\b").unwrap())
}

/// Result of scanning the version-control section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VersionScan {
    /// Whether the section header was found
    pub header_found: bool,
    /// Version labels of every matching line, in order
    pub candidates: Vec<String>,
    /// Chosen version: the last candidate
    pub version: Option<String>,
}

/// Result of scanning the change-history/schedule section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScheduleScan {
    /// Whether the section header was found
    pub header_found: bool,
    /// Every date found in the window, in order
    pub dates: Vec<String>,
    /// Staging deployment date: second-to-last date
    pub staging: Option<String>,
    /// Production deployment date: last date
    pub production: Option<String>,
}

/// Lines following a header match. The remainder of the header's own line
/// counts as the first line.
fn window_after<'a>(text: &'a str, header: &Regex, window: usize) -> Option<Vec<&'a str>> {
    header
        .find(text)
        .map(|m| text[m.end()..].lines().take(window).collect())
}

/// Scan the `window` lines after "Controle de Versões" for version lines.
pub fn scan_versions(text: &str, window: usize) -> VersionScan {
    let Some(lines) = window_after(text, control_header_re(), window) else {
        return VersionScan::default();
    };

    let candidates: Vec<String> = lines
        .iter()
        .filter_map(|line| version_line_re().captures(line.trim()))
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect();

    VersionScan {
        header_found: true,
        version: candidates.last().cloned(),
        candidates,
    }
}

/// Scan the `window` lines after "Histórico de Alterações / Cronograma" for
/// deployment dates.
pub fn scan_schedule(text: &str, window: usize) -> ScheduleScan {
    let Some(lines) = window_after(text, schedule_header_re(), window) else {
        return ScheduleScan::default();
    };

    let block = lines.join("\n");
    let dates: Vec<String> = date_re()
        .captures_iter(&block)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect();

    let (staging, production) = match dates.as_slice() {
        [.., staging, production] => (Some(staging.clone()), Some(production.clone())),
        _ => (None, None),
    };

    ScheduleScan {
        header_found: true,
        dates,
        staging,
        production,
    }
}

/// Run both scans and combine their results.
pub fn extract_version_info(
    text: &str,
    options: &ExtractOptions,
) -> (VersionInfo, VersionScan, ScheduleScan) {
    let versions = scan_versions(text, options.version_window);
    let schedule = scan_schedule(text, options.schedule_window);

    log::debug!(
        "Version {:?} ({} candidate(s)), schedule {:?} / {:?}",
        versions.version,
        versions.candidates.len(),
        schedule.staging,
        schedule.production
    );

    let info = VersionInfo {
        version: versions.version.clone(),
        staging_date: schedule.staging.clone(),
        production_date: schedule.production.clone(),
    };

    (info, versions, schedule)
}
