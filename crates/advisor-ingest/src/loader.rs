//! Document loaders: PDF, CSV, and web pages.
//!
//! Every source kind yields a sequence of (text, metadata) units that feed
//! the chunker: one unit per PDF page, one per CSV row, one per web page.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::Html;
use serde_json::{Map, Value};
use url::Url;

use advisor_core::error::{AdvisorError, Result};
use advisor_core::types::Unit;

/// Text encodings attempted, in order, when decoding CSV bytes. The first
/// that decodes without replacement characters wins.
const CSV_ENCODINGS: &[&encoding_rs::Encoding] = &[
    encoding_rs::UTF_8,
    encoding_rs::UTF_16LE,
    encoding_rs::WINDOWS_1258,
    encoding_rs::WINDOWS_1252,
];

/// A source document, dispatched through one `load` call.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    Pdf(PathBuf),
    Csv(PathBuf),
    Web(Url),
}

impl DocumentSource {
    /// Human-readable identity recorded in unit metadata.
    pub fn id(&self) -> String {
        match self {
            DocumentSource::Pdf(p) | DocumentSource::Csv(p) => p.display().to_string(),
            DocumentSource::Web(u) => u.to_string(),
        }
    }
}

pub struct DocumentLoader {
    http: reqwest::Client,
}

impl DocumentLoader {
    pub fn new(web_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(web_timeout)
            .build()
            .map_err(|e| AdvisorError::Load(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    /// Extract (text, metadata) units from a source document.
    pub async fn load(&self, source: &DocumentSource) -> Result<Vec<Unit>> {
        match source {
            DocumentSource::Pdf(path) => load_pdf(path),
            DocumentSource::Csv(path) => load_csv(path),
            DocumentSource::Web(url) => self.load_web(url).await,
        }
    }

    async fn load_web(&self, url: &Url) -> Result<Vec<Unit>> {
        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AdvisorError::Load(format!("fetch {url} failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(AdvisorError::Load(format!(
                "fetch {url} failed with status {}",
                resp.status()
            )));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| AdvisorError::Load(format!("read body of {url} failed: {e}")))?;

        let text = sanitize_text(&extract_page_text(&body));

        let mut metadata = Map::new();
        metadata.insert("source".into(), Value::String(url.to_string()));
        Ok(vec![Unit::new(text, metadata)])
    }
}

fn load_pdf(path: &Path) -> Result<Vec<Unit>> {
    let pages = pdf_extract::extract_text_by_pages(path)
        .map_err(|e| AdvisorError::Load(format!("cannot parse PDF {}: {e}", path.display())))?;

    let source = path.display().to_string();
    let units = pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let mut metadata = Map::new();
            metadata.insert("source".into(), Value::String(source.clone()));
            metadata.insert("page".into(), Value::from(i + 1));
            Unit::new(text, metadata)
        })
        .collect();
    Ok(units)
}

fn load_csv(path: &Path) -> Result<Vec<Unit>> {
    let bytes = std::fs::read(path)
        .map_err(|e| AdvisorError::Load(format!("cannot read {}: {e}", path.display())))?;
    let decoded = decode_csv_bytes(&bytes).ok_or_else(|| {
        AdvisorError::Load(format!(
            "{}: no supported text encoding could decode the file",
            path.display()
        ))
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(decoded.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| AdvisorError::Load(format!("invalid CSV header: {e}")))?
        .clone();

    let source = path.display().to_string();
    let mut units = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| AdvisorError::Load(format!("invalid CSV row {}: {e}", row_idx + 1)))?;
        let mut lines = Vec::with_capacity(record.len());
        let mut metadata = Map::new();
        metadata.insert("source".into(), Value::String(source.clone()));
        metadata.insert("row".into(), Value::from(row_idx + 1));
        for (col, value) in headers.iter().zip(record.iter()) {
            lines.push(format!("{col}: {value}"));
            metadata.insert(col.to_string(), Value::String(value.to_string()));
        }
        units.push(Unit::new(lines.join("\n"), metadata));
    }
    Ok(units)
}

/// Try each supported encoding in order; the first lossless decode wins.
fn decode_csv_bytes(bytes: &[u8]) -> Option<String> {
    for encoding in CSV_ENCODINGS {
        let (text, _, had_errors) = encoding.decode(bytes);
        if !had_errors {
            return Some(text.into_owned());
        }
    }
    None
}

/// Walk the parsed HTML tree collecting text, skipping non-content
/// subtrees (script, style, meta, link, anchors) and comments.
fn extract_page_text(html: &str) -> String {
    const SKIPPED: &[&str] = &["script", "style", "meta", "link", "a", "noscript", "head"];

    fn walk(node: NodeRef<'_, Node>, out: &mut String) {
        match node.value() {
            Node::Text(t) => {
                out.push_str(&t.text);
                out.push(' ');
            }
            Node::Comment(_) => {}
            Node::Element(el) => {
                if SKIPPED.contains(&el.name()) {
                    return;
                }
                for child in node.children() {
                    walk(child, out);
                }
            }
            _ => {
                for child in node.children() {
                    walk(child, out);
                }
            }
        }
    }

    let doc = Html::parse_document(html);
    let mut out = String::new();
    walk(doc.tree.root(), &mut out);
    out
}

/// Collapse whitespace and strip characters outside the allow-listed
/// alphabet (ASCII alphanumerics, extended Latin for diacritics, basic
/// punctuation) to cut boilerplate noise from scraped pages.
fn sanitize_text(text: &str) -> String {
    let filtered: String = text
        .chars()
        .filter(|&c| {
            c.is_ascii_alphanumeric()
                || c.is_whitespace()
                || ('\u{00C0}'..='\u{024F}').contains(&c)
                || ('\u{1E00}'..='\u{1EFF}').contains(&c)
                || ".,;:!?()%/-–'\"".contains(c)
        })
        .collect();
    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}
