//! Content-length guard
//!
//! This module holds the maximum body size policy, including:
//! - A default limit for every mime type
//! - Per-mime overrides, matched without parameters and case-insensitively
//! - The check applied to a response's declared length

use crate::entity::ResponseData;
use crate::{CrawlError, CrawlResult};
use std::collections::HashMap;

/// Limit applied to mime types without an explicit entry (10 MiB)
pub const DEFAULT_MAX_CONTENT_LENGTH: u64 = 10 * 1024 * 1024;

/// Per-mime maximum content length policy
///
/// Only the declared length is checked. Responses whose length is unknown
/// pass; streaming enforcement is left to the fetcher.
#[derive(Debug, Clone)]
pub struct ContentLengthGuard {
    default_max_length: u64,
    max_lengths: HashMap<String, u64>,
}

impl Default for ContentLengthGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONTENT_LENGTH)
    }
}

impl ContentLengthGuard {
    pub fn new(default_max_length: u64) -> Self {
        Self {
            default_max_length,
            max_lengths: HashMap::new(),
        }
    }

    /// Sets the limit for one mime type
    pub fn add_max_length(&mut self, mime_type: &str, max_length: u64) {
        self.max_lengths
            .insert(normalize_mime(mime_type), max_length);
    }

    pub fn default_max_length(&self) -> u64 {
        self.default_max_length
    }

    /// Returns the limit that applies to `mime_type`
    pub fn max_length(&self, mime_type: Option<&str>) -> u64 {
        mime_type
            .and_then(|mime| self.max_lengths.get(&normalize_mime(mime)))
            .copied()
            .unwrap_or(self.default_max_length)
    }

    /// Fails if the declared content length is over the limit for the
    /// response's mime type
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Length is unknown or within the limit
    /// * `Err(CrawlError::MaxLengthExceeded)` - Length is over the limit
    pub fn check(&self, response: &ResponseData) -> CrawlResult<()> {
        let Some(length) = response.content_length else {
            return Ok(());
        };

        let max_length = self.max_length(response.mime_type.as_deref());
        if length > max_length {
            return Err(CrawlError::MaxLengthExceeded {
                url: response.url.clone(),
                length,
                max_length,
            });
        }

        Ok(())
    }
}

fn normalize_mime(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or(mime_type)
        .trim()
        .to_ascii_lowercase()
}
