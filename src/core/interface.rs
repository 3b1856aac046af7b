//! An interface: the named, abstract thing a root URI and every
//! dependency URI refers to (spec.md §3).

use indexmap::IndexMap;
use std::collections::BTreeSet;

use crate::core::implementation::{Implementation, Uri};
use crate::core::stability::Stability;

/// A feed contributes implementations to an interface; `os`/`machine`
/// constrain when the feed is even worth consulting (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeedRef {
    pub uri: Uri,
    pub os: String,
    pub machine: String,
}

/// A named abstract program or library, identified by URI. Created as an
/// empty skeleton on first lookup and filled in by a `FeedLoader`
/// (spec.md §3 "Lifecycles", §4.2).
#[derive(Debug, Clone, Default)]
pub struct Interface {
    pub uri: Uri,
    /// `None` means "not yet loaded" (spec.md §3).
    pub name: Option<String>,
    /// Timestamp of the signed document, if loaded.
    pub last_modified: Option<i64>,
    /// Timestamp of the last refresh attempt, successful or not.
    pub last_checked: Option<i64>,
    pub feeds: BTreeSet<FeedRef>,
    pub feed_for: BTreeSet<Uri>,
    pub stability_policy: Option<Stability>,
    pub implementations: IndexMap<String, Implementation>,
}

impl Interface {
    pub fn empty(uri: impl Into<Uri>) -> Self {
        Interface {
            uri: uri.into(),
            ..Default::default()
        }
    }

    /// A local interface's id begins with `/` and is loaded straight off
    /// disk; it never goes stale (spec.md §4.8).
    pub fn is_local(&self) -> bool {
        self.uri.starts_with('/')
    }

    /// Whether this interface has ever been successfully loaded.
    pub fn is_loaded(&self) -> bool {
        self.last_modified.is_some()
    }
}
