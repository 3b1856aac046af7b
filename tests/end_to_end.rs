//! Black-box scenarios driving the full
//! `InterfaceCache`/`Policy`/`Solver`/`FetchCoordinator`/`Selections`
//! stack through its public API, one per spec.md §8 "End-to-end
//! scenarios". Mirrors the split a `cargo`-shaped workspace uses
//! between fast in-module unit tests and a slower, fixture-driven
//! black-box suite.

use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexMap;

use zi::cache::{InterfaceCache, LoadedFeed};
use zi::core::{Binding, Dependency, Implementation, Stability};
use zi::fetch::FetchCoordinator;
use zi::policy::{NetworkUse, Policy};
use zi::selections::serialize::{deserialize, serialize};
use zi::selections::Selections;
use zi::solver::Solver;
use zi_platform::ArchRanker;
use zi_test_support::{FakeClock, FakeDownloadManager, FakeFeedLoader, FakeStore};

fn implementation(id: &str, version: &str) -> Implementation {
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

fn loaded_at(clock_now: i64, implementations: Vec<Implementation>) -> LoadedFeed {
    LoadedFeed {
        name: Some("test feed".into()),
        last_modified: Some(clock_now),
        implementations: implementations.into_iter().map(|i| (i.id.clone(), i)).collect(),
        ..Default::default()
    }
}

/// Scenario 1: root `Source.xml` requires `Compiler.xml`; each has one
/// implementation. After `recalculate()`, both are selected, the
/// Compiler's selection has no bindings/dependencies, and the Source's
/// has one of each.
#[test]
fn source_and_compiler_resolve_to_a_ready_selections_document() {
    let clock = Arc::new(FakeClock::new(1_000));
    let cache = InterfaceCache::new(Arc::new(FakeFeedLoader::new()), std::env::temp_dir(), clock.clone());
    let policy = Policy::new("http://foo/Source.xml");
    let arch = ArchRanker::with_host("Linux", "x86_64");
    let fetch = FetchCoordinator::new(Arc::new(FakeDownloadManager::new()), Arc::new(FakeStore::new()));

    let compiler = implementation("sha1=345", "1.0");
    cache.commit("http://foo/Compiler.xml", loaded_at(1_000, vec![compiler]));

    let mut source = implementation("sha1=234", "1.0");
    source.bindings = vec![Binding::InsertPath {
        name: "PATH".into(),
        insert: ".".into(),
        separator: None,
    }];
    source
        .dependencies
        .insert("http://foo/Compiler.xml".into(), Dependency::new("http://foo/Compiler.xml"));
    cache.commit("http://foo/Source.xml", loaded_at(1_000, vec![source]));

    let mut solver = Solver::new(&cache, &policy, &arch, &fetch, clock.as_ref());
    solver.recalculate();
    assert!(solver.ready);

    let selections = Selections::build(&policy, &solver).unwrap();
    assert_eq!(selections.selections.len(), 2);

    let source_sel = &selections.selections["http://foo/Source.xml"];
    assert_eq!(source_sel.id, "sha1=234");
    assert_eq!(source_sel.bindings.len(), 1);
    assert_eq!(source_sel.dependencies.len(), 1);

    let compiler_sel = &selections.selections["http://foo/Compiler.xml"];
    assert_eq!(compiler_sel.id, "sha1=345");
    assert!(compiler_sel.bindings.is_empty());
    assert!(compiler_sel.dependencies.is_empty());
}

/// Scenario 2: a foreign-namespace attribute set on an implementation
/// survives `build -> serialize -> deserialize`, while the transient
/// `version-modifier` attribute does not.
#[test]
fn custom_attribute_round_trips_while_version_modifier_is_stripped() {
    let clock = Arc::new(FakeClock::new(1_000));
    let cache = InterfaceCache::new(Arc::new(FakeFeedLoader::new()), std::env::temp_dir(), clock.clone());
    let policy = Policy::new("http://foo/Source.xml");
    let arch = ArchRanker::with_host("Linux", "x86_64");
    let fetch = FetchCoordinator::new(Arc::new(FakeDownloadManager::new()), Arc::new(FakeStore::new()));

    let mut source = implementation("sha1=234", "1.0");
    source.attrs.insert(("http://namespace".into(), "foo".into()), "bar".into());
    source.attrs.insert(("".into(), "version-modifier".into()), "-pre".into());
    cache.commit("http://foo/Source.xml", loaded_at(1_000, vec![source]));

    let mut solver = Solver::new(&cache, &policy, &arch, &fetch, clock.as_ref());
    solver.recalculate();
    assert!(solver.ready);

    let selections = Selections::build(&policy, &solver).unwrap();
    let xml = serialize(&selections);
    let parsed = deserialize(&xml).unwrap();

    let source_sel = &parsed.selections["http://foo/Source.xml"];
    assert_eq!(
        source_sel.attrs.get(&("http://namespace".to_string(), "foo".to_string())),
        Some(&"bar".to_string())
    );
    assert!(source_sel
        .attrs
        .get(&("".to_string(), "version-modifier".to_string()))
        .is_none());
}

/// Scenario 3: a local root interface resolves to a Selection whose
/// `local_path` points at an existing directory, with no digests.
#[test]
fn local_interface_selection_has_local_path_and_no_digests() {
    let install_dir = tempfile::tempdir().unwrap();
    let root_uri = install_dir.path().join("Source.xml").to_str().unwrap().to_string();
    let impl_dir = tempfile::tempdir().unwrap();
    let impl_path = impl_dir.path().to_str().unwrap().to_string();

    let feed_loader = Arc::new(FakeFeedLoader::new());
    feed_loader.register(
        &root_uri,
        loaded_at(1_000, vec![implementation(&impl_path, "1.0")]),
    );

    let clock = Arc::new(FakeClock::new(1_000));
    let cache = InterfaceCache::new(feed_loader, std::env::temp_dir(), clock.clone());
    let policy = Policy::new(root_uri.clone());
    let arch = ArchRanker::with_host("Linux", "x86_64");
    let fetch = FetchCoordinator::new(Arc::new(FakeDownloadManager::new()), Arc::new(FakeStore::new()));

    let mut solver = Solver::new(&cache, &policy, &arch, &fetch, clock.as_ref());
    solver.recalculate();
    assert!(solver.ready, "local interface should resolve without any network activity");

    let selections = Selections::build(&policy, &solver).unwrap();
    let selection = &selections.selections[&root_uri];
    assert_eq!(selection.local_path.as_deref(), Some(impl_path.as_str()));
    assert!(selection.digests.is_empty());
    assert!(std::path::Path::new(selection.local_path.as_ref().unwrap()).is_dir());
}

/// Scenario 4: an interface that was last checked longer ago than the
/// freshness window triggers a background refresh but still resolves
/// using the data already cached.
#[test]
fn stale_interface_triggers_a_background_refresh_but_stays_ready() {
    // Commit at t=0 (which also stamps `last_checked` at 0), then move
    // the clock far enough forward that the interface reads as stale
    // relative to `policy.freshness` once the solver runs.
    let clock = Arc::new(FakeClock::new(0));
    let cache = InterfaceCache::new(Arc::new(FakeFeedLoader::new()), std::env::temp_dir(), clock.clone());
    cache.commit("http://foo/Source.xml", loaded_at(0, vec![implementation("sha1=234", "1.0")]));
    clock.set(10_000);

    let mut policy = Policy::new("http://foo/Source.xml");
    policy.network_use = NetworkUse::Full;
    policy.freshness = 100;

    let arch = ArchRanker::with_host("Linux", "x86_64");
    let downloads = Arc::new(FakeDownloadManager::new());
    let fetch = FetchCoordinator::new(downloads.clone(), Arc::new(FakeStore::new()));

    let mut solver = Solver::new(&cache, &policy, &arch, &fetch, clock.as_ref());
    solver.recalculate();

    assert!(solver.ready, "stale data is still usable while a refresh is in flight");
    assert!(
        downloads.began_urls().contains(&"http://foo/Source.xml".to_string()),
        "a background refresh should have been started for the stale interface"
    );
}

/// Scenario 5: offline, with an uncached newer implementation and a
/// cached older one, the cached one is chosen and resolution is ready.
#[test]
fn offline_falls_back_to_the_cached_implementation() {
    use zi::fetch::Store as _;

    let clock = Arc::new(FakeClock::new(1_000));
    let cache = InterfaceCache::new(Arc::new(FakeFeedLoader::new()), std::env::temp_dir(), clock.clone());

    let mut policy = Policy::new("http://foo/Source.xml");
    policy.network_use = NetworkUse::Offline;

    let arch = ArchRanker::with_host("Linux", "x86_64");
    let store = Arc::new(FakeStore::new());
    let downloads = Arc::new(FakeDownloadManager::new());

    // Make B (v1.0) look cached by staging and committing it into the
    // store ahead of time; A (v2.0) is never staged, so it stays
    // uncached.
    let staged = store.stage_tmp().unwrap();
    std::fs::write(staged.join("marker"), b"cached").unwrap();
    let actual = zi_util::digest::digest_tree(&staged, zi_util::digest::DigestAlgorithm::Sha1).unwrap();
    let mut digests = BTreeSet::new();
    digests.insert(actual.clone());
    store.verify_and_commit(&staged, &digests).unwrap();
    let committed_digest = actual;

    let fetch = FetchCoordinator::new(downloads, store.clone());

    let mut impl_a = implementation("sha1=a", "2.0");
    impl_a.digests.insert("sha1=a".to_string());
    let mut impl_b = implementation("sha1=b", "1.0");
    impl_b.digests.insert(committed_digest);

    cache.commit("http://foo/Source.xml", loaded_at(1_000, vec![impl_a, impl_b]));

    let mut solver = Solver::new(&cache, &policy, &arch, &fetch, clock.as_ref());
    solver.recalculate();

    assert!(solver.ready);
    let chosen = solver.implementation["http://foo/Source.xml"].as_ref().unwrap();
    assert_eq!(chosen.id, "sha1=b", "cached v1.0 should win over uncached v2.0 while offline");
}

/// Scenario 6: a two-step recipe is fetched and unpacked into a single
/// directory whose recomputed digest matches the implementation id.
#[test]
fn recipe_with_matching_digest_commits_into_the_store() {
    use zi::core::{DownloadSource, Recipe, RetrievalMethod};

    let store = Arc::new(FakeStore::new());
    let downloads = Arc::new(FakeDownloadManager::new());
    downloads.stage_tar_gz("http://example.com/base.tar.gz", &[("base.txt", b"base")]);
    downloads.stage_tar_gz("http://example.com/overlay.tar.gz", &[("overlay.txt", b"overlay")]);

    let expected = {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("base.txt"), b"base").unwrap();
        std::fs::write(dir.path().join("overlay.txt"), b"overlay").unwrap();
        zi_util::digest::digest_tree(dir.path(), zi_util::digest::DigestAlgorithm::Sha1).unwrap()
    };

    let fetch = FetchCoordinator::new(downloads, store.clone());
    let mut impl_ = implementation(&expected, "1.0");
    impl_.digests.insert(expected);
    impl_.download_sources = vec![RetrievalMethod::Recipe(Recipe {
        steps: vec![
            DownloadSource {
                url: "http://example.com/base.tar.gz".into(),
                size: 4,
                extract: None,
            },
            DownloadSource {
                url: "http://example.com/overlay.tar.gz".into(),
                size: 7,
                extract: None,
            },
        ],
    })];

    let path = fetch.fetch_implementation(&impl_).unwrap();
    assert!(store.committed(&path));
    assert_eq!(std::fs::read_to_string(path.join("base.txt")).unwrap(), "base");
    assert_eq!(std::fs::read_to_string(path.join("overlay.txt")).unwrap(), "overlay");
}
