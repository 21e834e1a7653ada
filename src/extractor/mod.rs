//! Text extraction from fetched bodies
//!
//! Extractors are chosen by mime type through an [`ExtractorRegistry`]. Only
//! plain text and HTML are handled here; other document formats can be
//! plugged in by implementing [`Extractor`].

mod html;

pub use html::{extract_links, HtmlExtractor};

use crate::CrawlResult;
use std::collections::HashMap;
use std::sync::Arc;

/// Hint key carrying the source URL
pub const HINT_URL: &str = "url";

/// Hint key carrying the declared charset
pub const HINT_CHARSET: &str = "charset";

/// Text and metadata extracted from a body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractData {
    pub content: String,
    pub metadata: HashMap<String, Vec<String>>,
}

impl ExtractData {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn add_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.entry(key.into()).or_default().push(value.into());
    }

    pub fn values(&self, key: &str) -> &[String] {
        self.metadata.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Converts raw bytes into text
pub trait Extractor: Send + Sync {
    fn get_text(&self, bytes: &[u8], hints: &HashMap<String, String>) -> CrawlResult<ExtractData>;
}

/// Decodes the body as text
#[derive(Debug, Default, Clone, Copy)]
pub struct TextExtractor;

impl Extractor for TextExtractor {
    fn get_text(&self, bytes: &[u8], _hints: &HashMap<String, String>) -> CrawlResult<ExtractData> {
        Ok(ExtractData::new(String::from_utf8_lossy(bytes).into_owned()))
    }
}

/// Mime type to extractor bindings
///
/// Lookups try the exact mime type, then a `type/*` wildcard, then the
/// default extractor.
#[derive(Default, Clone)]
pub struct ExtractorRegistry {
    extractors: HashMap<String, Arc<dyn Extractor>>,
    default: Option<Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the bundled HTML and plain text extractors
    pub fn with_defaults() -> Self {
        let html: Arc<dyn Extractor> = Arc::new(HtmlExtractor);
        let mut registry = Self::new();
        registry.register("text/html", Arc::clone(&html));
        registry.register("application/xhtml+xml", html);
        registry.register("text/*", Arc::new(TextExtractor));
        registry
    }

    pub fn register(&mut self, mime_type: &str, extractor: Arc<dyn Extractor>) {
        self.extractors
            .insert(mime_type.trim().to_ascii_lowercase(), extractor);
    }

    pub fn set_default(&mut self, extractor: Arc<dyn Extractor>) {
        self.default = Some(extractor);
    }

    pub fn get(&self, mime_type: Option<&str>) -> Option<Arc<dyn Extractor>> {
        let found = mime_type.and_then(|mime| {
            let mime = mime.split(';').next().unwrap_or(mime).trim().to_ascii_lowercase();
            self.extractors.get(&mime).or_else(|| {
                let major = mime.split('/').next().unwrap_or(&mime);
                self.extractors.get(&format!("{}/*", major))
            })
        });

        found.or(self.default.as_ref()).cloned()
    }
}
