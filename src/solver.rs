//! The greedy dependency walker (spec.md §4.5).
//!
//! `Solver` is the sole writer of its own `implementation` map; it never
//! blocks (spec.md §5) and absorbs every recoverable failure into
//! `ready = false` rather than returning an `Err` (spec.md §7).

use indexmap::IndexMap;

use zi_platform::ArchRanker;

use crate::cache::InterfaceCache;
use crate::clock::Clock;
use crate::core::{Dependency, Implementation, Uri};
use crate::fetch::FetchCoordinator;
use crate::policy::{NetworkUse, Policy};
use crate::ranker;

/// The outcome of a `recalculate()` pass: one implementation per
/// reachable interface (or `None` while a cycle guard is in place), plus
/// whether every transitively required interface has one.
pub struct Solver<'a> {
    cache: &'a InterfaceCache,
    policy: &'a Policy,
    arch: &'a ArchRanker,
    fetch: &'a FetchCoordinator,
    clock: &'a dyn Clock,
    pub implementation: IndexMap<Uri, Option<Implementation>>,
    pub ready: bool,
    on_complete: Vec<Box<dyn Fn() + 'a>>,
}

impl<'a> Solver<'a> {
    pub fn new(
        cache: &'a InterfaceCache,
        policy: &'a Policy,
        arch: &'a ArchRanker,
        fetch: &'a FetchCoordinator,
        clock: &'a dyn Clock,
    ) -> Self {
        Solver {
            cache,
            policy,
            arch,
            fetch,
            clock,
            implementation: IndexMap::new(),
            ready: false,
            on_complete: Vec::new(),
        }
    }

    /// Register a callback fired once at the end of every `recalculate()`
    /// pass (spec.md §4.5 "After the walk, fire all watchers."), distinct
    /// from `InterfaceCache`'s per-interface watchers.
    pub fn on_complete(&mut self, callback: impl Fn() + 'a) {
        self.on_complete.push(Box::new(callback));
    }

    /// Re-run the whole walk from the root. Deterministic given the
    /// current `InterfaceCache` contents (spec.md §8 "Determinism"): the
    /// only non-determinism is across calls, as more feed data arrives.
    pub fn recalculate(&mut self) {
        self.implementation.clear();
        self.ready = true;
        tracing::debug!(root = %self.policy.root, "recalculate");
        let root_dep = Dependency::new(self.policy.root.clone());
        self.walk(&root_dep);
        for callback in &self.on_complete {
            callback();
        }
    }

    fn walk(&mut self, dep: &Dependency) {
        let uri = dep.interface.clone();
        let iface = self.refresh_or_fetch(&uri);

        // Step 2: a dependency cycle is tolerated by resolving each
        // interface at most once (spec.md §8 "Cycle tolerance").
        if self.implementation.contains_key(&uri) {
            tracing::debug!(%uri, "cycle; skipping second visit");
            return;
        }

        // Step 3: mark in-progress so a cycle back to `uri` is caught
        // above instead of recursing forever.
        self.implementation.insert(uri.clone(), None);

        // Step 4: candidates from the interface itself and usable feeds.
        let mut candidates: Vec<Implementation> = iface.implementations.values().cloned().collect();
        for feed in &iface.feeds {
            if !self.arch.is_usable(&feed.os, &feed.machine) {
                tracing::debug!(feed = %feed.uri, os = %feed.os, machine = %feed.machine, "skipping feed; unsupported architecture");
                continue;
            }
            let feed_iface = self.cache.get(&feed.uri);
            if feed_iface.name.is_some() && !feed_iface.feed_for.contains(&uri) {
                // spec.md §9 Open Question: ingest anyway, but flag it.
                tracing::warn!(feed = %feed.uri, interface = %uri, "missing <feed-for> for this interface in feed; using it anyway");
            }
            candidates.extend(feed_iface.implementations.values().cloned());
        }

        // Step 5: apply the dependency's restrictions.
        candidates.retain(|c| dep.meets_all(c));

        // Step 6: nothing usable yet.
        if candidates.is_empty() {
            tracing::info!(%uri, "interface has no implementations yet");
            self.ready = false;
            return;
        }

        // Step 7: rank and pick the head.
        let cache_probe = |implementation: &Implementation| self.fetch.is_cached(implementation);
        let refs: Vec<&Implementation> = candidates.iter().collect();
        let ranked = ranker::rank_all(&iface, self.policy, self.arch, &cache_probe, refs);
        let chosen = ranked[0];
        if let Some(reason) = ranker::unusable_reason(chosen, self.policy, self.arch, &cache_probe) {
            tracing::info!(%uri, id = %chosen.id, reason = reason.message(), "best implementation is unusable");
            self.ready = false;
            return;
        }

        // Step 8: commit the choice and recurse into its dependencies,
        // in the order they're declared (IndexMap preserves insertion
        // order, matching spec.md §5's ordering guarantee).
        let chosen = chosen.clone();
        let children: Vec<Dependency> = chosen.dependencies.values().cloned().collect();
        self.implementation.insert(uri, Some(chosen));
        for child in children {
            self.walk(&child);
        }
    }

    /// spec.md §4.5 step 1: trigger a download if nothing is known yet,
    /// or a background refresh if what's known is stale. Either way,
    /// returns immediately with whatever is already cached.
    fn refresh_or_fetch(&self, uri: &str) -> crate::core::Interface {
        let iface = self.cache.get(uri);

        if iface.is_local() {
            if !iface.is_loaded() {
                self.cache.load_local(uri);
                return self.cache.get(uri);
            }
            return iface;
        }

        if !iface.is_loaded() {
            if !self.policy.is_offline() {
                tracing::debug!(%uri, "interface not cached and not offline; downloading");
                self.fetch.begin_interface_download(&iface, false);
            } else if self.policy.warn_offline_once() {
                if iface.feeds.is_empty() {
                    tracing::warn!(%uri, "nothing known about interface, and we are offline");
                } else {
                    tracing::info!(%uri, "nothing known about interface and offline; trying feeds only");
                }
            }
            return iface;
        }

        let staleness = self.clock.now() - iface.last_checked.unwrap_or(0);
        if self.policy.network_use != NetworkUse::Offline
            && self.policy.freshness > 0
            && staleness > self.policy.freshness
        {
            tracing::debug!(%uri, staleness, "interface is stale; refreshing in background");
            self.fetch.begin_interface_download(&iface, false);
        }

        iface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LoadedFeed;
    use crate::core::{Binding, Implementation, Interface, Stability};
    use crate::fetch::FetchCoordinator;
    use indexmap::IndexMap;
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use zi_test_support::{FakeClock, FakeDownloadManager, FakeFeedLoader, FakeStore};

    fn simple_impl(id: &str, version: &str) -> Implementation {
        Implementation {
            id: id.to_string(),
            version: version.parse().unwrap(),
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

    fn loaded(implementations: Vec<Implementation>) -> LoadedFeed {
        LoadedFeed {
            name: Some("test".into()),
            last_modified: Some(0),
            implementations: implementations
                .into_iter()
                .map(|impl_| (impl_.id.clone(), impl_))
                .collect(),
            ..Default::default()
        }
    }

    fn harness() -> (
        InterfaceCache,
        Policy,
        ArchRanker,
        FetchCoordinator,
        Arc<FakeClock>,
    ) {
        let clock = Arc::new(FakeClock::new(1_000_000));
        let cache = InterfaceCache::new(
            Arc::new(FakeFeedLoader::new()),
            std::env::temp_dir(),
            clock.clone() as Arc<dyn Clock>,
        );
        let policy = Policy::new("http://foo/Source.xml");
        let arch = ArchRanker::with_host("Linux", "x86_64");
        let fetch = FetchCoordinator::new(
            Arc::new(FakeDownloadManager::new()),
            Arc::new(FakeStore::new()),
        );
        (cache, policy, arch, fetch, clock)
    }

    #[test]
    fn resolves_source_and_compiler() {
        let (cache, policy, arch, fetch, clock) = harness();

        let mut compiler = simple_impl("sha1=345", "1.0");
        compiler.dependencies = IndexMap::new();
        cache.commit("http://foo/Compiler.xml", loaded(vec![compiler]));

        let mut source_impl = simple_impl("sha1=234", "1.0");
        source_impl.bindings = vec![Binding::InsertPath {
            name: "PATH".into(),
            insert: ".".into(),
            separator: None,
        }];
        source_impl
            .dependencies
            .insert("http://foo/Compiler.xml".into(), Dependency::new("http://foo/Compiler.xml"));
        cache.commit("http://foo/Source.xml", loaded(vec![source_impl]));

        let mut solver = Solver::new(&cache, &policy, &arch, &fetch, clock.as_ref());
        solver.recalculate();

        assert!(solver.ready);
        assert_eq!(solver.implementation.len(), 2);
        let source = solver.implementation["http://foo/Source.xml"].as_ref().unwrap();
        assert_eq!(source.id, "sha1=234");
        let compiler = solver.implementation["http://foo/Compiler.xml"].as_ref().unwrap();
        assert_eq!(compiler.id, "sha1=345");
    }

    #[test]
    fn cycle_is_visited_once() {
        let (cache, policy, arch, fetch, clock) = harness();

        let mut a = simple_impl("sha1=a", "1.0");
        a.dependencies.insert("http://foo/B.xml".into(), Dependency::new("http://foo/B.xml"));
        cache.commit("http://foo/A.xml", loaded(vec![a]));

        let mut b = simple_impl("sha1=b", "1.0");
        b.dependencies.insert("http://foo/A.xml".into(), Dependency::new("http://foo/A.xml"));
        cache.commit("http://foo/B.xml", loaded(vec![b]));

        let mut policy = policy;
        policy.root = "http://foo/A.xml".into();
        let mut solver = Solver::new(&cache, &policy, &arch, &fetch, clock.as_ref());
        solver.recalculate();

        assert!(solver.ready);
        assert_eq!(solver.implementation.len(), 2);
    }

    #[test]
    fn missing_implementation_marks_not_ready() {
        let (cache, policy, arch, fetch, clock) = harness();
        cache.commit("http://foo/Empty.xml", LoadedFeed {
            name: Some("empty".into()),
            last_modified: Some(0),
            ..Default::default()
        });
        let mut policy = policy;
        policy.root = "http://foo/Empty.xml".into();
        let mut solver = Solver::new(&cache, &policy, &arch, &fetch, clock.as_ref());
        solver.recalculate();
        assert!(!solver.ready);
    }

    #[test]
    fn determinism_across_identical_runs() {
        let (cache, policy, arch, fetch, clock) = harness();
        cache.commit("http://foo/Source.xml", loaded(vec![simple_impl("sha1=234", "1.0")]));

        let mut solver1 = Solver::new(&cache, &policy, &arch, &fetch, clock.as_ref());
        solver1.recalculate();
        let mut solver2 = Solver::new(&cache, &policy, &arch, &fetch, clock.as_ref());
        solver2.recalculate();

        assert_eq!(solver1.ready, solver2.ready);
        assert_eq!(
            solver1.implementation["http://foo/Source.xml"].as_ref().map(|i| &i.id),
            solver2.implementation["http://foo/Source.xml"].as_ref().map(|i| &i.id),
        );
    }
}
