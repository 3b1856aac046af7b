use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use zi::cache::{FeedLoader, LoadedFeed};
use zi::errors::Error;

/// Serves canned `LoadedFeed`s keyed by the path a real `FeedLoader`
/// would have parsed them from, instead of touching an XML parser.
#[derive(Default)]
pub struct FakeFeedLoader {
    feeds: Mutex<HashMap<PathBuf, LoadedFeed>>,
}

impl FakeFeedLoader {
    pub fn new() -> Self {
        FakeFeedLoader::default()
    }

    pub fn register(&self, path: impl Into<PathBuf>, feed: LoadedFeed) {
        self.feeds.lock().expect("fake feed loader poisoned").insert(path.into(), feed);
    }
}

impl FeedLoader for FakeFeedLoader {
    fn load(&self, path: &Path) -> Result<LoadedFeed, Error> {
        self.feeds
            .lock()
            .expect("fake feed loader poisoned")
            .get(path)
            .cloned()
            .ok_or_else(|| Error::SafeException(format!("no fixture feed registered for {}", path.display())))
    }
}
