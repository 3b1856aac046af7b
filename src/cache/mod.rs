//! The process-wide interface registry (spec.md §4.2).

pub mod feed;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::clock::Clock;
use crate::core::{Interface, Uri};

pub use feed::{FeedLoader, LoadedFeed, SignatureVerifier};

/// Invoked with the changed `Interface` whenever a load or update
/// completes; the Solver registers one of these to schedule
/// re-resolution (spec.md §4.2, §4.5).
pub type Watcher = Arc<dyn Fn(&Interface) + Send + Sync>;

/// Maps interface URI -> `Interface`. `get` never blocks and never
/// triggers a fetch; it only creates the empty skeleton a URI resolves
/// to the first time it's looked up.
pub struct InterfaceCache {
    interfaces: Mutex<HashMap<Uri, Interface>>,
    watchers: Mutex<Vec<Watcher>>,
    feed_loader: Arc<dyn FeedLoader>,
    cache_dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl InterfaceCache {
    pub fn new(feed_loader: Arc<dyn FeedLoader>, cache_dir: PathBuf, clock: Arc<dyn Clock>) -> Self {
        InterfaceCache {
            interfaces: Mutex::new(HashMap::new()),
            watchers: Mutex::new(Vec::new()),
            feed_loader,
            cache_dir,
            clock,
        }
    }

    /// Return the cached `Interface` for `uri`, creating an empty
    /// skeleton if this is the first time it has been looked up.
    pub fn get(&self, uri: &str) -> Interface {
        let mut interfaces = self.interfaces.lock().expect("interface cache poisoned");
        interfaces
            .entry(uri.to_string())
            .or_insert_with(|| Interface::empty(uri))
            .clone()
    }

    /// If a cached document for `uri` exists under the on-disk cache
    /// directory, parse it and commit its contents.
    pub fn load_from_disk(&self, uri: &str) {
        let path = self.cached_path(uri);
        if !path.exists() {
            return;
        }
        match self.feed_loader.load(&path) {
            Ok(loaded) => self.commit(uri, loaded),
            Err(err) => {
                tracing::warn!(%uri, error = %err, "failed to parse cached feed; ignoring");
            }
        }
    }

    /// Parse a local interface's own document directly, bypassing the
    /// cache directory (spec.md §4.2: "Local interfaces ... are loaded
    /// directly from disk").
    pub fn load_local(&self, uri: &str) {
        let path = Path::new(uri);
        match self.feed_loader.load(path) {
            Ok(loaded) => self.commit(uri, loaded),
            Err(err) => {
                tracing::warn!(%uri, error = %err, "failed to parse local interface");
            }
        }
    }

    /// Replace an interface's contents wholesale (spec.md §3
    /// "Lifecycles": "Implementations are attached/replaced wholesale
    /// when a feed document reloads") and notify watchers. `last_checked`
    /// only ever moves forward (spec.md §8 "Freshness monotonicity").
    pub fn commit(&self, uri: &str, loaded: LoadedFeed) {
        let snapshot = {
            let mut interfaces = self.interfaces.lock().expect("interface cache poisoned");
            let iface = interfaces
                .entry(uri.to_string())
                .or_insert_with(|| Interface::empty(uri));
            if loaded.name.is_some() {
                iface.name = loaded.name;
            }
            iface.last_modified = loaded.last_modified;
            iface.feeds = loaded.feeds;
            iface.feed_for = loaded.feed_for;
            iface.stability_policy = loaded.stability_policy;
            iface.implementations = loaded.implementations;
            self.bump_checked_locked(iface);
            iface.clone()
        };
        self.notify(&snapshot);
    }

    /// Record that a refresh was attempted (successful or not) without
    /// otherwise changing the interface's contents.
    pub fn mark_checked(&self, uri: &str) {
        let mut interfaces = self.interfaces.lock().expect("interface cache poisoned");
        let iface = interfaces
            .entry(uri.to_string())
            .or_insert_with(|| Interface::empty(uri));
        self.bump_checked_locked(iface);
    }

    fn bump_checked_locked(&self, iface: &mut Interface) {
        let now = self.clock.now();
        iface.last_checked = Some(match iface.last_checked {
            Some(prev) => prev.max(now),
            None => now,
        });
    }

    pub fn add_watcher(&self, watcher: Watcher) {
        self.watchers.lock().expect("watcher list poisoned").push(watcher);
    }

    fn notify(&self, iface: &Interface) {
        for watcher in self.watchers.lock().expect("watcher list poisoned").iter() {
            watcher(iface);
        }
    }

    fn cached_path(&self, uri: &str) -> PathBuf {
        self.cache_dir.join(escape_uri(uri))
    }
}

/// Turn a URI into a filesystem-safe cache filename. Not meant to be
/// reversible beauty, just collision-free and portable.
fn escape_uri(uri: &str) -> String {
    uri.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use std::sync::atomic::{AtomicI64, Ordering};

    struct NeverLoader;
    impl FeedLoader for NeverLoader {
        fn load(&self, _path: &Path) -> Result<LoadedFeed, crate::errors::Error> {
            Err(crate::errors::Error::SafeException("no feeds in this test".into()))
        }
    }

    struct FakeClock(AtomicI64);
    impl Clock for FakeClock {
        fn now(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn cache_with_clock(now: i64) -> (InterfaceCache, Arc<FakeClock>) {
        let clock = Arc::new(FakeClock(AtomicI64::new(now)));
        let cache = InterfaceCache::new(
            Arc::new(NeverLoader),
            std::env::temp_dir(),
            clock.clone() as Arc<dyn Clock>,
        );
        (cache, clock)
    }

    #[test]
    fn get_creates_empty_skeleton_without_fetching() {
        let (cache, _clock) = cache_with_clock(0);
        let iface = cache.get("http://example.com/Foo.xml");
        assert!(!iface.is_loaded());
        assert_eq!(iface.uri, "http://example.com/Foo.xml");
    }

    #[test]
    fn last_checked_never_decreases() {
        let (cache, clock) = cache_with_clock(100);
        cache.mark_checked("http://example.com/Foo.xml");
        assert_eq!(cache.get("http://example.com/Foo.xml").last_checked, Some(100));

        clock.0.store(50, Ordering::SeqCst); // clock appears to go backwards
        cache.mark_checked("http://example.com/Foo.xml");
        assert_eq!(cache.get("http://example.com/Foo.xml").last_checked, Some(100));

        clock.0.store(200, Ordering::SeqCst);
        cache.mark_checked("http://example.com/Foo.xml");
        assert_eq!(cache.get("http://example.com/Foo.xml").last_checked, Some(200));
    }

    #[test]
    fn watchers_are_notified_on_commit() {
        let (cache, _clock) = cache_with_clock(0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        cache.add_watcher(Arc::new(move |iface: &Interface| {
            seen_clone.lock().unwrap().push(iface.uri.clone());
        }));
        cache.commit("http://example.com/Foo.xml", LoadedFeed::default());
        assert_eq!(seen.lock().unwrap().as_slice(), ["http://example.com/Foo.xml"]);
    }
}
