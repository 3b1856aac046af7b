//! Snapshotting a solve into a stable, serializable document (spec.md
//! §3 "Selections", §4.7).

pub mod serialize;

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::core::{Binding, Implementation, Uri, Version};
use crate::errors::{Error, Result};
use crate::policy::Policy;
use crate::solver::Solver;

/// A feed attribute that only ever described how the solver arrived at
/// a version, never part of the installed artifact itself — stripped
/// when a `Selection` is built (spec.md §6, §8 scenario 2).
const TRANSIENT_ATTRS: &[&str] = &["version-modifier"];

/// The subset of a chosen `Implementation` needed to reproduce and run
/// it, plus a shallow view of its dependency edges (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub interface: Uri,
    pub id: String,
    pub version: Version,
    pub local_path: Option<String>,
    pub digests: BTreeSet<String>,
    pub bindings: Vec<Binding>,
    /// URI and bindings only — not the dependency's own restrictions,
    /// which are solver input, not solver output.
    pub dependencies: IndexMap<Uri, Vec<Binding>>,
    /// Foreign-namespace attributes, preserved verbatim except
    /// [`TRANSIENT_ATTRS`] (spec.md §4.7: "preserving ... attrs (all
    /// original XML attributes except transient ones)").
    pub attrs: IndexMap<(String, String), String>,
}

/// The serializable result of a solve: one chosen implementation per
/// reachable interface (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selections {
    pub root_uri: Uri,
    pub selections: IndexMap<Uri, Selection>,
}

impl Selections {
    /// Project a finished, `ready` `Solver`'s output into an immutable
    /// snapshot (spec.md §3 "Lifecycles": "Selections are immutable
    /// snapshots after construction").
    pub fn build(policy: &Policy, solver: &Solver<'_>) -> Result<Selections> {
        if !solver.ready {
            return Err(Error::SafeException(format!(
                "cannot build selections for '{}': solver is not ready",
                policy.root
            )));
        }

        let mut selections = IndexMap::new();
        for (uri, implementation) in &solver.implementation {
            let implementation = implementation.as_ref().ok_or_else(|| {
                Error::SafeException(format!("interface '{uri}' has no chosen implementation"))
            })?;
            selections.insert(uri.clone(), project(uri, implementation));
        }

        Ok(Selections {
            root_uri: policy.root.clone(),
            selections,
        })
    }
}

fn project(uri: &str, implementation: &Implementation) -> Selection {
    let dependencies = implementation
        .dependencies
        .iter()
        .map(|(uri, dep)| (uri.clone(), dep.bindings.clone()))
        .collect();

    let attrs = implementation
        .attrs
        .iter()
        .filter(|((_, local_name), _)| !TRANSIENT_ATTRS.contains(&local_name.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Selection {
        interface: uri.to_string(),
        id: implementation.id.clone(),
        version: implementation.version.clone(),
        local_path: implementation.local_path().map(str::to_string),
        digests: implementation.digests.clone(),
        bindings: implementation.bindings.clone(),
        dependencies,
        attrs,
    }
}
