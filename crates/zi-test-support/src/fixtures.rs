use std::collections::BTreeSet;

use indexmap::IndexMap;

use zi::core::{Implementation, Interface, Stability};

/// A minimally-valid `Implementation`, usable on `Linux`/`x86_64`, with
/// no dependencies and no retrieval method. Tests override whichever
/// fields matter to them.
pub fn test_implementation(id: &str, version: &str) -> Implementation {
    Implementation {
        id: id.to_string(),
        version: version.parse().expect("fixture version must parse"),
        stability: Stability::Stable,
        os: "Linux".into(),
        machine: "x86_64".into(),
        dependencies: IndexMap::new(),
        bindings: Vec::new(),
        download_sources: Vec::new(),
        digests: BTreeSet::new(),
        attrs: IndexMap::new(),
    }
}

/// An empty, unloaded `Interface` skeleton for `uri`.
pub fn test_interface(uri: &str) -> Interface {
    Interface::empty(uri)
}
