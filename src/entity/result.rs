use crate::entity::request::Method;
use chrono::{DateTime, Utc};

/// Outcome recorded for a processed URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultStatus {
    /// Fetched and processed
    Ok,
    /// Skipped because the content did not change since the previous session
    NotModified,
    /// The resource was a container; its children were queued
    Expanded,
    /// Every attempt failed or the response was rejected
    Failed,
    /// No client is registered for the URL
    Unsupported,
}

impl ResultStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::NotModified => "not_modified",
            Self::Expanded => "expanded",
            Self::Failed => "failed",
            Self::Unsupported => "unsupported",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(Self::Ok),
            "not_modified" => Some(Self::NotModified),
            "expanded" => Some(Self::Expanded),
            "failed" => Some(Self::Failed),
            "unsupported" => Some(Self::Unsupported),
            _ => None,
        }
    }

    pub fn all() -> [ResultStatus; 5] {
        [
            Self::Ok,
            Self::NotModified,
            Self::Expanded,
            Self::Failed,
            Self::Unsupported,
        ]
    }
}

/// A row of the access result store
#[derive(Debug, Clone)]
pub struct AccessResult {
    pub id: Option<i64>,
    pub session_id: String,
    pub url: String,
    pub parent_url: Option<String>,
    pub method: Method,
    pub http_status_code: Option<u16>,
    pub mime_type: Option<String>,
    pub content_length: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
    pub execution_time_ms: Option<u64>,
    pub status: ResultStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AccessResult {
    pub fn new(session_id: impl Into<String>, url: impl Into<String>, status: ResultStatus) -> Self {
        Self {
            id: None,
            session_id: session_id.into(),
            url: url.into(),
            parent_url: None,
            method: Method::Get,
            http_status_code: None,
            mime_type: None,
            content_length: None,
            last_modified: None,
            execution_time_ms: None,
            status,
            error_message: None,
            created_at: Utc::now(),
        }
    }
}
