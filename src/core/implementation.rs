//! A concrete, installable version of an interface (spec.md §3).

use indexmap::IndexMap;
use std::collections::BTreeSet;

use crate::core::stability::Stability;
use crate::core::version::Version;

pub type Uri = String;

/// How a dependency should be exposed to the running program
/// (spec.md Glossary: "Binding").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// Insert the dependency's implementation directory (or a sub-path of
    /// it) into a `PATH`-like environment variable.
    InsertPath {
        name: String,
        insert: String,
        separator: Option<String>,
    },
    /// Set an environment variable to a fixed value or to the
    /// dependency's implementation path.
    SetEnv { name: String, value: String },
}

/// A predicate an `Implementation` must satisfy to be considered for a
/// particular `Dependency`. Only the version floor named in spec.md §3 is
/// modeled; there is no general boolean expression grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Restriction {
    NotBefore(Version),
}

impl Restriction {
    pub fn meets(&self, implementation: &Implementation) -> bool {
        match self {
            Restriction::NotBefore(min) => &implementation.version >= min,
        }
    }
}

/// An edge in the dependency graph: "this interface requires that
/// interface, subject to these restrictions, with these bindings."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub interface: Uri,
    pub restrictions: Vec<Restriction>,
    pub bindings: Vec<Binding>,
}

impl Dependency {
    pub fn new(interface: impl Into<Uri>) -> Self {
        Dependency {
            interface: interface.into(),
            restrictions: Vec::new(),
            bindings: Vec::new(),
        }
    }

    pub fn with_restriction(mut self, restriction: Restriction) -> Self {
        self.restrictions.push(restriction);
        self
    }

    pub fn with_binding(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn meets_all(&self, implementation: &Implementation) -> bool {
        self.restrictions.iter().all(|r| r.meets(implementation))
    }
}

/// A single archive to download, optionally extracting only a sub-path
/// of it (spec.md §3: `RetrievalMethod`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSource {
    pub url: String,
    pub size: u64,
    pub extract: Option<String>,
}

/// An ordered set of archives that together make up one implementation
/// directory (spec.md Glossary: "Recipe").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    pub steps: Vec<DownloadSource>,
}

/// How to obtain an implementation's files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalMethod {
    DownloadSource(DownloadSource),
    Recipe(Recipe),
}

/// A concrete version of an interface (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Implementation {
    /// Either an absolute local path (a local implementation) or a
    /// content digest token such as `sha1=...`.
    pub id: String,
    pub version: Version,
    pub stability: Stability,
    pub os: String,
    pub machine: String,
    pub dependencies: IndexMap<Uri, Dependency>,
    pub bindings: Vec<Binding>,
    pub download_sources: Vec<RetrievalMethod>,
    pub digests: BTreeSet<String>,
    /// Every attribute the feed's `<implementation>` element carried,
    /// keyed by `(namespace, local-name)`, including transient ones like
    /// `version-modifier` — `SelectionsBuilder` is what strips those
    /// (spec.md §4.7, §6).
    pub attrs: IndexMap<(String, String), String>,
}

impl Implementation {
    /// A local implementation's id is an absolute path; it has no
    /// content digest (spec.md §3, scenario 3).
    pub fn is_local(&self) -> bool {
        self.id.starts_with('/')
    }

    pub fn local_path(&self) -> Option<&str> {
        self.is_local().then_some(self.id.as_str())
    }
}
