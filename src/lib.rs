//! Crawl-Dispatch: a fault-tolerant fetch dispatch layer for crawlers
//!
//! This crate decides which protocol client handles a URL, retries failed
//! fetches a bounded number of times, aggregates the failures into a single
//! outcome, and keeps a de-duplicated per-session crawl frontier.

pub mod client;
pub mod config;
pub mod crawler;
pub mod entity;
pub mod extractor;
pub mod frontier;
pub mod output;
pub mod storage;

use std::time::Duration;
use thiserror::Error;

/// Main error type for Crawl-Dispatch operations
#[derive(Debug, Error)]
pub enum CrawlError {
    /// A transient or resource-specific access problem; retried by the
    /// fault-tolerant client.
    #[error("Failed to access {url}: {message}")]
    Access {
        url: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("The content length ({length} byte) is over {max_length} byte. The url is {url}")]
    MaxLengthExceeded {
        url: String,
        length: u64,
        max_length: u64,
    },

    /// Every attempt failed. Causes are kept in attempt order.
    #[error("Failed to access {url} after {} attempts{}", .causes.len(), format_causes(.causes))]
    MultipleAccess { url: String, causes: Vec<CrawlError> },

    #[error("Crawler system error: {0}")]
    System(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CrawlError {
    /// Creates an access error without an underlying cause
    pub fn access(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Access {
            url: url.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates an access error wrapping the cause that produced it
    pub fn access_with_source<E>(url: impl Into<String>, message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Access {
            url: url.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns true if retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Access { .. })
    }

    /// Returns true if this is an access error caused by the access timeout
    pub fn is_interrupted(&self) -> bool {
        match self {
            Self::Access {
                source: Some(source),
                ..
            } => source.downcast_ref::<AccessInterrupted>().is_some(),
            _ => false,
        }
    }

    /// Returns the per-attempt causes of an aggregated failure
    pub fn causes(&self) -> &[CrawlError] {
        match self {
            Self::MultipleAccess { causes, .. } => causes,
            _ => &[],
        }
    }
}

fn format_causes(causes: &[CrawlError]) -> String {
    causes
        .iter()
        .enumerate()
        .map(|(i, cause)| format!("\nCause #{}: {}", i + 1, cause))
        .collect()
}

/// Cause attached to an access error when a fetch attempt ran out of time
#[derive(Debug, Error)]
#[error("access interrupted after {timeout:?}")]
pub struct AccessInterrupted {
    pub timeout: Duration,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid client pattern: {0}")]
    InvalidPattern(String),
}

/// Result type alias for Crawl-Dispatch operations
pub type CrawlResult<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use client::{
    AccessTimeoutGuard, ClientRouter, ContentLengthGuard, FaultTolerantClient, FetchOutcome,
    Fetcher, RequestListener,
};
pub use config::Config;
pub use entity::{FrontierEntry, Method, RequestData, ResponseData};
pub use frontier::CrawlSession;
