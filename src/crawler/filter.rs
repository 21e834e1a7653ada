//! Include/exclude URL filter
//!
//! Patterns must match the whole URL. With no include patterns every URL is
//! included; an exclude match always wins.

use crate::ConfigError;
use regex::Regex;

/// Decides which URLs a session may crawl
#[derive(Debug, Clone, Default)]
pub struct UrlFilter {
    includes: Vec<Regex>,
    excludes: Vec<Regex>,
}

impl UrlFilter {
    /// Compiles the include and exclude patterns
    ///
    /// # Returns
    ///
    /// * `Ok(UrlFilter)` - Every pattern compiled
    /// * `Err(ConfigError::InvalidPattern)` - A pattern does not compile
    pub fn new<S: AsRef<str>>(includes: &[S], excludes: &[S]) -> Result<Self, ConfigError> {
        Ok(Self {
            includes: compile(includes)?,
            excludes: compile(excludes)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }

    /// Returns true if `url` may be crawled
    pub fn matches(&self, url: &str) -> bool {
        if !self.includes.is_empty() && !self.includes.iter().any(|regex| regex.is_match(url)) {
            return false;
        }
        !self.excludes.iter().any(|regex| regex.is_match(url))
    }
}

fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            let pattern = pattern.as_ref();
            Regex::new(&format!("^(?:{})$", pattern))
                .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))
        })
        .collect()
}
