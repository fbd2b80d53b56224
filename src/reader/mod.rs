// Text reader
// Turns a manifest source (local file or web URL) into plain text

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use itertools::Itertools;
use scraper::{ElementRef, Html};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Bytes inspected when deciding whether a file is binary
const BINARY_SNIFF_LEN: usize = 8192;

/// Reads the text of one document
pub trait SourceReader {
    /// Return the document's text, or an empty string when it has none
    fn read_text(&self, source: &str) -> Result<String>;
}

/// Reads local files and `http(s)://` URLs, reducing HTML to visible text
#[derive(Debug, Clone)]
pub struct TextReader {
    agent: ureq::Agent,
}

impl Default for TextReader {
    #[inline]
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
    }
}

impl TextReader {
    #[inline]
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self { agent }
    }

    fn read_url(&self, url: &str) -> Result<String> {
        debug!("Fetching {}", url);

        let mut response = self
            .agent
            .get(url)
            .call()
            .with_context(|| format!("Failed to fetch {}", url))?;

        let is_html = response
            .headers()
            .get("content-type")
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("html"));

        let body = response
            .body_mut()
            .read_to_string()
            .with_context(|| format!("Failed to read response body from {}", url))?;

        Ok(if is_html || looks_like_html(&body) {
            html_to_text(&body)
        } else {
            body
        })
    }

    fn read_file(path: &Path) -> Result<String> {
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;

        let sniffed = bytes.get(..BINARY_SNIFF_LEN).unwrap_or(bytes.as_slice());
        if sniffed.contains(&0) {
            warn!("Skipping binary file {}", path.display());
            return Ok(String::new());
        }

        let text = String::from_utf8_lossy(&bytes);
        let is_html = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"));

        Ok(if is_html {
            html_to_text(&text)
        } else {
            text.into_owned()
        })
    }
}

impl SourceReader for TextReader {
    #[inline]
    fn read_text(&self, source: &str) -> Result<String> {
        let source = source.trim();

        let text = if is_url(source) {
            self.read_url(source)?
        } else {
            Self::read_file(Path::new(source))?
        };

        let text = text.trim().to_string();
        debug!("Read {} characters from {}", text.len(), source);
        Ok(text)
    }
}

#[inline]
pub fn is_url(source: &str) -> bool {
    let lowered = source.get(..8).unwrap_or(source).to_ascii_lowercase();
    lowered.starts_with("http://") || lowered.starts_with("https://")
}

fn looks_like_html(body: &str) -> bool {
    let trimmed = body.trim_start();
    let head = trimmed.get(..64).unwrap_or(trimmed).to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

/// Visible text of an HTML document, one block element per line
#[inline]
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut content = String::new();
    extract_text_recursive(document.root_element(), &mut content);
    clean_text(&content)
}

fn extract_text_recursive(element: ElementRef<'_>, content: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            match child_element.value().name() {
                "script" | "style" | "noscript" | "template" | "head" => {}
                "br" => content.push('\n'),
                "p" | "div" | "section" | "article" | "blockquote" | "li" | "tr" | "h1" | "h2"
                | "h3" | "h4" | "h5" | "h6" | "pre" | "main" | "header" | "footer" => {
                    content.push('\n');
                    extract_text_recursive(child_element, content);
                    content.push('\n');
                }
                _ => extract_text_recursive(child_element, content),
            }
        } else if let Some(text_node) = child.value().as_text() {
            content.push_str(text_node);
        }
    }
}

/// Collapse runs of whitespace within lines and drop empty lines
fn clean_text(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().join(" "))
        .filter(|line| !line.is_empty())
        .join("\n")
}
