use lru::LruCache;
use std::num::NonZeroUsize;

/// Bounded set of URLs already accepted into a session's frontier
///
/// Used as a fast-reject filter. Evicted URLs may be accepted again by the
/// cache (the stores catch them), but a URL is only ever reported as seen if
/// it was recorded.
#[derive(Debug)]
pub struct VisitedCache {
    urls: LruCache<String, ()>,
}

impl VisitedCache {
    /// Creates a cache holding at most `capacity` URLs (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            urls: LruCache::new(capacity),
        }
    }

    pub fn insert(&mut self, url: &str) {
        self.urls.put(url.to_string(), ());
    }

    /// Checks membership and marks the URL as recently used
    pub fn touch(&mut self, url: &str) -> bool {
        self.urls.get(url).is_some()
    }

    /// Checks membership without changing recency
    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn clear(&mut self) {
        self.urls.clear();
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}
