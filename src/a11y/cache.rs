//! TTL cache of per-element attribute reads.
//!
//! Keyed by [`ElementKey`] (pid plus element hash), never by the handle itself. Entries are
//! value-typed (`Arc<AxAttributes>`) so readers drop the lock before using
//! them. Expired entries are purged lazily on lookup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use super::{AxAttributes, ElementKey};

/// Default lifetime of a cached attribute snapshot.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct CachedInfo {
    attributes: Arc<AxAttributes>,
    stored_at: Instant,
}

/// Shared attribute cache.
#[derive(Debug)]
pub struct InfoCache {
    ttl: Duration,
    entries: Mutex<HashMap<ElementKey, CachedInfo>>,
}

impl InfoCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached snapshot for `key` if it is younger than the TTL.
    pub fn get(&self, key: ElementKey) -> Option<Arc<AxAttributes>> {
        self.get_at(key, Instant::now())
    }

    pub(crate) fn get_at(&self, key: ElementKey, now: Instant) -> Option<Arc<AxAttributes>> {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        let expired = match entries.get(&key) {
            Some(entry) if now.saturating_duration_since(entry.stored_at) < self.ttl => {
                return Some(entry.attributes.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(&key);
        }
        None
    }

    pub fn insert(&self, key: ElementKey, attributes: AxAttributes) -> Arc<AxAttributes> {
        self.insert_at(key, attributes, Instant::now())
    }

    pub(crate) fn insert_at(
        &self,
        key: ElementKey,
        attributes: AxAttributes,
        now: Instant,
    ) -> Arc<AxAttributes> {
        let attributes = Arc::new(attributes);
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.insert(
            key,
            CachedInfo {
                attributes: attributes.clone(),
                stored_at: now,
            },
        );
        attributes
    }

    /// Drops every entry. Called on app activation and screen changes.
    pub fn invalidate_all(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        let count = entries.len();
        entries.clear();
        debug!("[Cache] Invalidated {} entries", count);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InfoCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a11y::Role;

    fn attrs(title: &str) -> AxAttributes {
        AxAttributes {
            role: Role::Button,
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn fresh_entry_is_returned() {
        let cache = InfoCache::default();
        let now = Instant::now();
        cache.insert_at(ElementKey::new(10, 7), attrs("Save"), now);
        let hit = cache.get_at(ElementKey::new(10, 7), now + Duration::from_secs(4)).unwrap();
        assert_eq!(hit.title, "Save");
    }

    #[test]
    fn stale_entry_is_purged_on_lookup() {
        let cache = InfoCache::default();
        let now = Instant::now();
        cache.insert_at(ElementKey::new(10, 7), attrs("Save"), now);
        assert!(cache.get_at(ElementKey::new(10, 7), now + Duration::from_secs(5)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn equal_hashes_in_different_processes_do_not_collide() {
        let cache = InfoCache::default();
        cache.insert(ElementKey::new(10, 42), attrs("Save"));
        cache.insert(ElementKey::new(11, 42), attrs("Open"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(ElementKey::new(10, 42)).unwrap().title, "Save");
        assert_eq!(cache.get(ElementKey::new(11, 42)).unwrap().title, "Open");
        assert!(cache.get(ElementKey::new(12, 42)).is_none());
    }

    #[test]
    fn invalidate_all_clears() {
        let cache = InfoCache::default();
        cache.insert(ElementKey::new(10, 1), attrs("a"));
        cache.insert(ElementKey::new(10, 2), attrs("b"));
        assert_eq!(cache.len(), 2);
        cache.invalidate_all();
        assert!(cache.get(ElementKey::new(10, 1)).is_none());
        assert_eq!(cache.len(), 0);
    }
}
