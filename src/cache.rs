use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A rendered home feed body.
#[derive(Debug, Clone)]
struct CachedFeed {
    body: String,
    expires_at: Instant,
}

/// Shared cache of the rendered home feed, one entry per requested page.
///
/// Entries are not invalidated when posts change; they live until they expire
/// or the whole cache is cleared.
pub struct FeedCache {
    ttl: Duration,
    entries: HashMap<String, CachedFeed>,
}

impl FeedCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Cached body for `key`, if present and still fresh.
    pub fn get(&mut self, key: &str) -> Option<String> {
        self.clear_stale();
        self.entries.get(key).map(|entry| entry.body.clone())
    }

    /// Store a render. A later store for the same key wins.
    pub fn put(&mut self, key: impl Into<String>, body: String) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries.insert(
            key.into(),
            CachedFeed {
                body,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Drop every entry so the next request renders fresh content.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            tracing::debug!("Clearing {} cached feed page(s)", self.entries.len());
        }
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove expired entries
    fn clear_stale(&mut self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| now < entry.expires_at);
    }
}
