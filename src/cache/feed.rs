//! Contracts for the two collaborators this crate treats as external
//! (spec.md §1): parsing a feed document, and verifying its signature.
//! Production bodies (real XML parsing, real GPG/trust verification) are
//! out of scope; `zi-test-support` supplies fakes so the rest of the
//! crate is exercisable.

use std::collections::BTreeSet;
use std::path::Path;

use indexmap::IndexMap;

use crate::core::{FeedRef, Implementation, Stability, Uri};
use crate::errors::Error;

/// The fields a parsed feed document contributes to an `Interface`
/// (spec.md §3).
#[derive(Debug, Clone, Default)]
pub struct LoadedFeed {
    pub name: Option<String>,
    pub last_modified: Option<i64>,
    pub feeds: BTreeSet<FeedRef>,
    pub feed_for: BTreeSet<Uri>,
    pub stability_policy: Option<Stability>,
    pub implementations: IndexMap<String, Implementation>,
}

/// Parses an interface/feed document already sitting on disk (either a
/// cached download, or the document itself for a local interface).
/// Real XML parsing is out of scope (spec.md §1); this is the seam.
pub trait FeedLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<LoadedFeed, Error>;
}

/// Verifies a signed document body before its content is trusted enough
/// to commit into the `InterfaceCache` (spec.md §4.2, §7: "Signature
/// verification failures never commit data to the InterfaceCache").
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, uri: &str, signed_data: &[u8]) -> Result<Vec<u8>, Error>;
}
