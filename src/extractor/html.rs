//! HTML text and link extraction
//!
//! This module handles parsing HTML content to extract:
//! - Visible body text
//! - The page title
//! - Links to follow (from <a> tags and canonical links)

use crate::extractor::{ExtractData, Extractor};
use crate::CrawlResult;
use scraper::{Html, Selector};
use std::collections::HashMap;
use url::Url;

/// Extracts body text and title from HTML
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlExtractor;

impl Extractor for HtmlExtractor {
    fn get_text(&self, bytes: &[u8], _hints: &HashMap<String, String>) -> CrawlResult<ExtractData> {
        let html = String::from_utf8_lossy(bytes);
        let document = Html::parse_document(&html);

        let mut data = ExtractData::new(extract_body_text(&document));
        if let Some(title) = extract_title(&document) {
            data.add_value("title", title);
        }
        Ok(data)
    }
}

/// Extracts all followable links from an HTML page
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only links
/// - Links whose scheme differs from the page unless they are HTTP(S)
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The base URL for resolving relative links
///
/// # Returns
///
/// Absolute URLs in document order, without duplicates
///
/// # Example
///
/// ```
/// use crawl_dispatch::extractor::extract_links;
/// use url::Url;
///
/// let html = r#"<html><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// assert_eq!(extract_links(html, &base_url), vec!["https://example.com/page"]);
/// ```
pub fn extract_links(html: &str, base_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut links: Vec<String> = Vec::new();

    let mut push = |href: &str| {
        if let Some(absolute_url) = resolve_link(href, base_url) {
            if !links.contains(&absolute_url) {
                links.push(absolute_url);
            }
        }
    };

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }
            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    links
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_body_text(document: &Html) -> String {
    let Ok(body_selector) = Selector::parse("body") else {
        return String::new();
    };

    document
        .select(&body_selector)
        .flat_map(|body| body.text())
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolves a link href to an absolute URL and validates it
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let mut absolute_url = base_url.join(href).ok()?;
    absolute_url.set_fragment(None);

    let scheme = absolute_url.scheme();
    if scheme == "http" || scheme == "https" || scheme == base_url.scheme() {
        Some(absolute_url.to_string())
    } else {
        None
    }
}
