//! Bounded icon cache
//!
//! Keeps decoded icons keyed by a string (usually a path) so repeated menu
//! population does not hit the disk or the icon theme again. Least recently
//! used entries are evicted once the capacity is reached.
//!
//! Entries are shared `Arc` handles: evicting an entry only drops the cache's
//! own reference, so icons of items currently on screen stay alive.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::PlatformError;
use crate::model::{IconHandle, IconImage};

/// Default number of cached icons
pub const DEFAULT_CAPACITY: usize = 100;

/// Thread-safe LRU cache of icon handles
pub struct IconCache {
    entries: Mutex<LruCache<String, IconHandle>>,
}

impl IconCache {
    /// Create a cache holding at most `capacity` icons (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Look up an icon, marking it most recently used
    pub fn get(&self, key: &str) -> Option<IconHandle> {
        self.entries.lock().get(key).cloned()
    }

    /// Whether a key is cached, without touching its recency
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains(key)
    }

    /// Insert an icon, evicting the least recently used entry if full
    pub fn insert(&self, key: impl Into<String>, icon: IconImage) -> IconHandle {
        let key = key.into();
        let handle = IconHandle::new(icon);
        if let Some((evicted, _)) = self.entries.lock().push(key.clone(), handle.clone()) {
            if evicted != key {
                debug!("Icon cache evicted {}", evicted);
            }
        }
        handle
    }

    /// Return the cached icon for `key`, creating it with `factory` on a miss
    ///
    /// The factory runs without holding the lock, so two callers missing the
    /// same key may both render it; the later insert wins and both results are
    /// equivalent. Failures are not cached: the next call retries.
    pub fn get_or_create<F>(&self, key: &str, factory: F) -> Option<IconHandle>
    where
        F: FnOnce() -> Result<IconImage, PlatformError>,
    {
        if let Some(hit) = self.get(key) {
            return Some(hit);
        }

        match factory() {
            Ok(icon) => Some(self.insert(key, icon)),
            Err(e) => {
                debug!("No icon for {}: {}", key, e);
                None
            }
        }
    }
}

impl Default for IconCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn icon(name: &str) -> IconImage {
        IconImage::Vector(PathBuf::from(name))
    }

    #[test]
    fn test_factory_runs_once_per_key() {
        let cache = IconCache::new(4);
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let got = cache.get_or_create("firefox", || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(icon("firefox.svg"))
            });
            assert!(got.is_some());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let cache = IconCache::new(3);
        for i in 0..10 {
            cache.insert(format!("k{i}"), icon("x"));
            assert!(cache.len() <= 3);
        }
        assert_eq!(cache.capacity(), 3);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = IconCache::new(3);
        cache.insert("a", icon("a"));
        cache.insert("b", icon("b"));
        cache.insert("c", icon("c"));

        // Touch "a" so "b" becomes the oldest
        assert!(cache.get("a").is_some());
        cache.insert("d", icon("d"));

        assert!(cache.get("b").is_none());
        assert!(cache.contains("a"));
        assert!(cache.contains("c"));
        assert!(cache.contains("d"));
    }

    #[test]
    fn test_capacity_plus_one_evicts_oldest() {
        let cache = IconCache::new(DEFAULT_CAPACITY);
        for i in 0..=DEFAULT_CAPACITY {
            cache.insert(format!("icon-{i}"), icon("x"));
        }
        assert_eq!(cache.len(), DEFAULT_CAPACITY);
        assert!(cache.get("icon-0").is_none());
        assert!(cache.get("icon-1").is_some());
    }

    #[test]
    fn test_failure_is_not_cached() {
        let cache = IconCache::new(4);
        let missing = cache.get_or_create("ghost", || Err(PlatformError::IconNotFound("ghost".into())));
        assert!(missing.is_none());
        assert!(!cache.contains("ghost"));

        let found = cache.get_or_create("ghost", || Ok(icon("ghost.svg")));
        assert!(found.is_some());
        assert!(cache.contains("ghost"));
    }

    #[test]
    fn test_eviction_keeps_shared_handles_alive() {
        let cache = IconCache::new(1);
        let shown = cache.insert("shown", icon("shown.svg"));
        cache.insert("other", icon("other.svg"));

        assert!(!cache.contains("shown"));
        assert_eq!(*shown, icon("shown.svg"));
        assert_eq!(Arc::strong_count(&shown), 1);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cache = IconCache::new(0);
        assert_eq!(cache.capacity(), 1);
    }

    #[test]
    fn test_concurrent_population() {
        let cache = Arc::new(IconCache::new(16));
        let workers: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..64 {
                        let key = format!("k{}", (i + t) % 24);
                        let _ = cache.get_or_create(&key, || Ok(icon(&key)));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert!(cache.len() <= 16);
    }
}
