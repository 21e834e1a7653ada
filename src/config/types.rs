use crate::client::DEFAULT_MAX_CONTENT_LENGTH;
use crate::frontier::FrontierConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Main configuration structure for Crawl-Dispatch
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(rename = "content-length", default)]
    pub content_length: ContentLengthConfig,
    #[serde(default)]
    pub frontier: FrontierSettings,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Identifier of the crawl session
    #[serde(rename = "session-id", default = "default_session_id")]
    pub session_id: String,

    /// Number of concurrent workers
    #[serde(rename = "thread-count", default = "default_thread_count")]
    pub thread_count: u32,

    /// Maximum depth to crawl from seed URLs; unlimited when absent
    #[serde(rename = "max-depth", default)]
    pub max_depth: Option<u32>,

    /// Maximum number of processed URLs; 0 means unlimited
    #[serde(rename = "max-access-count", default)]
    pub max_access_count: u64,

    /// Consecutive empty polls before an idle worker stops
    #[serde(rename = "max-thread-check-count", default = "default_max_thread_check_count")]
    pub max_thread_check_count: u32,

    /// Pause between empty polls (milliseconds)
    #[serde(rename = "wait-new-url", default = "default_wait_new_url")]
    pub wait_new_url: u64,

    /// Pause before each fetch of a worker (milliseconds)
    #[serde(rename = "delay-before-processing", default)]
    pub delay_before_processing: u64,

    /// Pause after each fetch of a worker (milliseconds)
    #[serde(rename = "delay-after-processing", default)]
    pub delay_after_processing: u64,

    /// Only URLs matching one of these patterns are crawled; all when empty
    #[serde(default)]
    pub include: Vec<String>,

    /// URLs matching any of these patterns are never crawled
    #[serde(default)]
    pub exclude: Vec<String>,

    /// URLs queued when the session starts
    #[serde(default)]
    pub seeds: Vec<String>,
}

/// Fetch client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Attempts per request
    #[serde(rename = "max-retry-count", default = "default_max_retry_count")]
    pub max_retry_count: u32,

    /// Pause between attempts (milliseconds)
    #[serde(rename = "retry-interval", default)]
    pub retry_interval: u64,

    /// Deadline of a single attempt (milliseconds); disabled when absent
    #[serde(rename = "access-timeout", default)]
    pub access_timeout: Option<u64>,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Bodies larger than this many bytes are spooled to a temporary file
    #[serde(rename = "spool-threshold", default = "default_spool_threshold")]
    pub spool_threshold: usize,

    /// Routing rules, first match wins
    #[serde(default = "default_rules")]
    pub rules: Vec<ClientRule>,
}

impl ClientConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval)
    }

    pub fn access_timeout(&self) -> Option<Duration> {
        self.access_timeout.map(Duration::from_millis)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_retry_count: default_max_retry_count(),
            retry_interval: 0,
            access_timeout: None,
            user_agent: default_user_agent(),
            spool_threshold: default_spool_threshold(),
            rules: default_rules(),
        }
    }
}

/// Binds a URL pattern to a bundled client
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ClientRule {
    pub pattern: String,
    pub client: ClientKind,
}

/// Bundled clients
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    Http,
    File,
}

/// Content length limits
#[derive(Debug, Clone, Deserialize)]
pub struct ContentLengthConfig {
    /// Limit for mime types without an entry (bytes)
    #[serde(default = "default_max_content_length")]
    pub default: u64,

    /// Per-mime limits (bytes)
    #[serde(rename = "mime-types", default)]
    pub mime_types: HashMap<String, u64>,
}

impl Default for ContentLengthConfig {
    fn default() -> Self {
        Self {
            default: default_max_content_length(),
            mime_types: HashMap::new(),
        }
    }
}

/// Frontier sizing
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FrontierSettings {
    #[serde(rename = "page-size", default = "default_frontier_size")]
    pub page_size: usize,

    #[serde(rename = "buffer-size", default = "default_frontier_size")]
    pub buffer_size: usize,

    #[serde(rename = "visited-cache-size", default = "default_frontier_size")]
    pub visited_cache_size: usize,

    #[serde(rename = "generated-page-size", default = "default_frontier_size")]
    pub generated_page_size: usize,
}

impl Default for FrontierSettings {
    fn default() -> Self {
        let size = default_frontier_size();
        Self {
            page_size: size,
            buffer_size: size,
            visited_cache_size: size,
            generated_page_size: size,
        }
    }
}

impl From<FrontierSettings> for FrontierConfig {
    fn from(settings: FrontierSettings) -> Self {
        Self {
            page_size: settings.page_size,
            buffer_size: settings.buffer_size,
            visited_cache_size: settings.visited_cache_size,
            generated_page_size: settings.generated_page_size,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_session_id() -> String {
    "default".to_string()
}

fn default_thread_count() -> u32 {
    4
}

fn default_max_thread_check_count() -> u32 {
    20
}

fn default_wait_new_url() -> u64 {
    200
}

fn default_max_retry_count() -> u32 {
    5
}

fn default_user_agent() -> String {
    crate::client::DEFAULT_USER_AGENT.to_string()
}

fn default_spool_threshold() -> usize {
    crate::client::DEFAULT_SPOOL_THRESHOLD
}

fn default_rules() -> Vec<ClientRule> {
    vec![
        ClientRule {
            pattern: "https?:".to_string(),
            client: ClientKind::Http,
        },
        ClientRule {
            pattern: "file:".to_string(),
            client: ClientKind::File,
        },
    ]
}

fn default_max_content_length() -> u64 {
    DEFAULT_MAX_CONTENT_LENGTH
}

fn default_frontier_size() -> usize {
    1000
}
