//! URL-to-client routing
//!
//! Clients are registered with a regular expression and looked up in
//! registration order; the first pattern that matches the start of the URL
//! wins. The table is built once during setup and then shared read-only.

use crate::client::Fetcher;
use crate::ConfigError;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Ordered `(pattern, client)` bindings
#[derive(Default)]
pub struct ClientRouter {
    rules: Vec<(Regex, Arc<dyn Fetcher>)>,
}

impl ClientRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a binding
    ///
    /// The pattern is anchored at the start of the URL, so `http:` and
    /// `http:.*` select the same URLs.
    ///
    /// # Arguments
    ///
    /// * `pattern` - Regular expression matched against the URL prefix
    /// * `client` - Client returned for matching URLs
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Binding added
    /// * `Err(ConfigError::InvalidPattern)` - The pattern does not compile
    pub fn add_client(&mut self, pattern: &str, client: Arc<dyn Fetcher>) -> Result<(), ConfigError> {
        let regex = Regex::new(&format!("^(?:{})", pattern))
            .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))?;
        self.rules.push((regex, client));
        Ok(())
    }

    /// Returns the client registered for `url`
    ///
    /// Absent, empty and whitespace-only URLs never match.
    ///
    /// # Example
    ///
    /// ```
    /// use crawl_dispatch::client::{ClientRouter, FileSystemFetcher};
    /// use std::sync::Arc;
    ///
    /// let mut router = ClientRouter::new();
    /// router.add_client("file:", Arc::new(FileSystemFetcher::new())).unwrap();
    ///
    /// assert!(router.get_client("file:///tmp/a.txt").is_some());
    /// assert!(router.get_client("http://example.com/").is_none());
    /// assert!(router.get_client(None).is_none());
    /// ```
    pub fn get_client<'a>(&self, url: impl Into<Option<&'a str>>) -> Option<Arc<dyn Fetcher>> {
        let url = url.into()?;
        if url.trim().is_empty() {
            return None;
        }

        self.rules
            .iter()
            .find(|(regex, _)| regex.is_match(url))
            .map(|(_, client)| Arc::clone(client))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl fmt::Debug for ClientRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|(regex, _)| regex.as_str()))
            .finish()
    }
}
