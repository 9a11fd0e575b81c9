//! Bulletin discovery and download from the NF-e portal.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use chrono::NaiveDate;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, REFERER};
use scraper::{ElementRef, Html, Selector};

use ntrules::detect::is_probably_pdf;

/// Technical bulletin listing page.
pub const PORTAL_LIST_URL: &str =
    "https://www.nfe.fazenda.gov.br/portal/listaConteudo.aspx?tipoConteudo=04BIflQt1aY=";

const PORTAL_ORIGIN: &str = "https://www.nfe.fazenda.gov.br";
const PORTAL_REFERER: &str = "https://www.nfe.fazenda.gov.br/portal/";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

const PDF_ACCEPT: &str = "application/pdf,application/octet-stream;q=0.9,*/*;q=0.8";

const BULLETIN_LINK_SELECTOR: &str = "a[href*='exibirArquivo.aspx']";

/// HTTP request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_SLUG_LEN: usize = 32;

type BoxError = Box<dyn std::error::Error>;

fn published_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Publicada\s+em\s+([0-9]{2}/[0-9]{2}/[0-9]{4})").unwrap())
}

/// A bulletin link found on the listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalEntry {
    /// Anchor text, e.g. "Nota Técnica 2025.002 - Versão 1.20"
    pub title: String,
    pub published: Option<NaiveDate>,
    /// Absolute download URL
    pub url: String,
    /// File name stem for the download
    pub slug: String,
}

/// "Publicada em dd/mm/yyyy" anywhere in `text`.
pub fn parse_publish_date(text: &str) -> Option<NaiveDate> {
    let caps = published_re().captures(text)?;
    NaiveDate::parse_from_str(caps.get(1)?.as_str(), "%d/%m/%Y").ok()
}

/// Resolve a listing href against the portal.
pub fn absolute_url(href: &str) -> String {
    if href.starts_with('/') {
        format!("{}{}", PORTAL_ORIGIN, href)
    } else if href.to_ascii_lowercase().starts_with("http") {
        href.to_string()
    } else {
        format!("{}{}", PORTAL_REFERER, href)
    }
}

fn alphanumeric_prefix(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_alphanumeric)
        .take(MAX_SLUG_LEN)
        .collect()
}

/// File name stem for a bulletin: the `conteudo=` value of its URL, else its
/// title, else `"nt"`.
pub fn make_slug(url: &str, title: &str) -> String {
    let content = url.rsplit("conteudo=").next().unwrap_or(url);
    let slug = alphanumeric_prefix(content);
    if !slug.is_empty() {
        return slug;
    }
    let slug = alphanumeric_prefix(title);
    if slug.is_empty() {
        "nt".to_string()
    } else {
        slug
    }
}

fn collapse_whitespace<'a>(pieces: impl Iterator<Item = &'a str>) -> String {
    pieces
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse the listing page and keep bulletins published on or after `since`.
///
/// Entries without a publication date are dropped; duplicate URLs keep their
/// first occurrence.
pub fn parse_listing(html: &str, since: NaiveDate) -> Result<Vec<PortalEntry>, BoxError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(BULLETIN_LINK_SELECTOR)
        .map_err(|e| format!("invalid selector {}: {:?}", BULLETIN_LINK_SELECTOR, e))?;

    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for anchor in document.select(&selector) {
        let href: String = anchor
            .value()
            .attr("href")
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if href.is_empty() {
            continue;
        }

        let title = collapse_whitespace(anchor.text());
        let parent_text = anchor
            .parent()
            .and_then(ElementRef::wrap)
            .map(|parent| collapse_whitespace(parent.text()))
            .unwrap_or_default();

        let published = parse_publish_date(&parent_text).or_else(|| parse_publish_date(&title));
        if !published.is_some_and(|date| date >= since) {
            continue;
        }

        let url = absolute_url(&href);
        if !seen.insert(url.clone()) {
            continue;
        }

        entries.push(PortalEntry {
            slug: make_slug(&url, &title),
            title,
            published,
            url,
        });
    }

    log::info!("Found {} bulletin(s) published since {}", entries.len(), since);
    Ok(entries)
}

/// Blocking client for the bulletin portal.
pub struct PortalClient {
    client: Client,
    list_url: String,
}

impl PortalClient {
    /// Create a client for the given listing page.
    pub fn new(list_url: impl Into<String>) -> Result<Self, BoxError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(BROWSER_USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            list_url: list_url.into(),
        })
    }

    /// Fetch the listing page and return bulletins published since `since`.
    pub fn discover(&self, since: NaiveDate) -> Result<Vec<PortalEntry>, BoxError> {
        log::debug!("Fetching {}", self.list_url);
        let html = self
            .client
            .get(&self.list_url)
            .send()?
            .error_for_status()?
            .text()?;

        parse_listing(&html, since)
    }

    /// Download a bulletin into `dir`.
    ///
    /// Returns the PDF path, or `None` when the download failed or the portal
    /// answered with something other than a PDF (saved as `.html` for
    /// inspection).
    pub fn download(&self, entry: &PortalEntry, dir: &Path) -> Option<PathBuf> {
        match self.try_download(entry, dir) {
            Ok(path) => path,
            Err(e) => {
                log::error!("Download failed for {}: {}", entry.url, e);
                None
            }
        }
    }

    fn try_download(&self, entry: &PortalEntry, dir: &Path) -> Result<Option<PathBuf>, BoxError> {
        let response = self
            .client
            .get(&entry.url)
            .header(REFERER, PORTAL_REFERER)
            .header(ACCEPT, PDF_ACCEPT)
            .send()?
            .error_for_status()?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let bytes = response.bytes()?;

        fs::create_dir_all(dir)?;

        if content_type.contains("pdf") || is_probably_pdf(&bytes) {
            let path = dir.join(format!("{}.pdf", entry.slug));
            fs::write(&path, &bytes)?;
            log::debug!("Saved {}", path.display());
            Ok(Some(path))
        } else {
            let path = dir.join(format!("{}.html", entry.slug));
            fs::write(&path, &bytes)?;
            log::warn!("Non-PDF content for \"{}\" (saved as {})", entry.title, path.display());
            Ok(None)
        }
    }
}
