//! Request descriptors handed to fetchers

use crate::{CrawlError, CrawlResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Request method understood by the fetchers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Method {
    #[default]
    Get,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
        }
    }
}

impl FromStr for Method {
    type Err = std::convert::Infallible;

    /// Parses a method name case-insensitively. Unknown names fall back to GET.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("HEAD") {
            Ok(Self::Head)
        } else {
            Ok(Self::Get)
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable request for a single URL
///
/// Two requests are equal when their URL and method are equal; metadata does
/// not take part in identity.
#[derive(Debug, Clone)]
pub struct RequestData {
    url: String,
    method: Method,
    metadata: HashMap<String, serde_json::Value>,
}

impl RequestData {
    /// Starts building a new request
    ///
    /// # Example
    ///
    /// ```
    /// use crawl_dispatch::entity::{Method, RequestData};
    ///
    /// let request = RequestData::builder()
    ///     .head()
    ///     .url("https://example.com/")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(request.method(), Method::Head);
    /// ```
    pub fn builder() -> RequestDataBuilder {
        RequestDataBuilder::default()
    }

    /// Shorthand for a GET request to `url`
    pub fn get(url: impl Into<String>) -> CrawlResult<Self> {
        Self::builder().get().url(url).build()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn metadata(&self) -> &HashMap<String, serde_json::Value> {
        &self.metadata
    }

    pub fn metadata_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }
}

impl PartialEq for RequestData {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url && self.method == other.method
    }
}

impl Eq for RequestData {}

impl Hash for RequestData {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.hash(state);
        self.method.hash(state);
    }
}

/// Builder for [`RequestData`]
#[derive(Debug, Default)]
pub struct RequestDataBuilder {
    url: Option<String>,
    method: Method,
    metadata: HashMap<String, serde_json::Value>,
}

impl RequestDataBuilder {
    pub fn get(mut self) -> Self {
        self.method = Method::Get;
        self
    }

    pub fn head(mut self) -> Self {
        self.method = Method::Head;
        self
    }

    /// Sets the method from its name (case-insensitive, unknown names mean GET)
    pub fn method_name(mut self, name: &str) -> Self {
        self.method = name.parse().unwrap_or_default();
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Builds the request
    ///
    /// # Returns
    ///
    /// * `Ok(RequestData)` - The immutable request
    /// * `Err(CrawlError::System)` - The URL is missing or blank
    pub fn build(self) -> CrawlResult<RequestData> {
        let url = match self.url {
            Some(url) if !url.trim().is_empty() => url,
            _ => return Err(CrawlError::System("The url of a request is blank".to_string())),
        };

        Ok(RequestData {
            url,
            method: self.method,
            metadata: self.metadata,
        })
    }
}
