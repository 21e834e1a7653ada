use crate::entity::request::Method;
use chrono::{DateTime, Utc};

/// A pending URL in a crawl session's frontier
#[derive(Debug, Clone, PartialEq)]
pub struct FrontierEntry {
    /// Row id in the queue store; `None` until persisted
    pub id: Option<i64>,
    pub session_id: String,
    pub url: String,
    pub method: Method,
    pub parent_url: Option<String>,
    pub depth: u32,
    pub metadata: Option<String>,
    /// Modification time recorded by a previous session, used to skip
    /// unchanged content
    pub last_modified: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl FrontierEntry {
    /// Creates a depth-0 GET entry for `url`
    pub fn new(session_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: None,
            session_id: session_id.into(),
            url: url.into(),
            method: Method::Get,
            parent_url: None,
            depth: 0,
            metadata: None,
            last_modified: None,
            created_at: Utc::now(),
        }
    }

    /// Creates an entry discovered while processing `parent`
    pub fn child_of(parent: &FrontierEntry, url: impl Into<String>) -> Self {
        Self {
            parent_url: Some(parent.url.clone()),
            depth: parent.depth + 1,
            ..Self::new(parent.session_id.clone(), url)
        }
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_last_modified(mut self, last_modified: Option<DateTime<Utc>>) -> Self {
        self.last_modified = last_modified;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_entry_inherits_session_and_depth() {
        let parent = FrontierEntry::new("s1", "http://example.com/").with_depth(2);
        let child = FrontierEntry::child_of(&parent, "http://example.com/a");

        assert_eq!(child.session_id, "s1");
        assert_eq!(child.depth, 3);
        assert_eq!(child.parent_url.as_deref(), Some("http://example.com/"));
        assert_eq!(child.method, Method::Get);
        assert!(child.id.is_none());
    }
}
