//! A harness binary: wires `Policy`/`InterfaceCache`/`Solver`/
//! `FetchCoordinator`/`Selections` together over a directory of JSON
//! feed fixtures and prints the resulting Selections document.
//!
//! This is not a product front-end — no GUI, no chooser subprocess, no
//! icon cache — just enough plumbing to drive the core end-to-end
//! (spec.md §1 scopes all of those out).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use indexmap::IndexMap;
use walkdir::WalkDir;

use zi::cache::{FeedLoader, InterfaceCache, LoadedFeed};
use zi::core::{
    Binding, Dependency, DownloadSource, FeedRef, Implementation, Recipe, Restriction, RetrievalMethod, Stability,
};
use zi::errors::Error;
use zi::fetch::{DownloadHandle, DownloadManager, DownloadStatus, FetchCoordinator, Store};
use zi::policy::config::Config;
use zi::policy::{load_config, NetworkUse, Policy};
use zi::selections::{serialize::serialize, Selections};
use zi::solver::Solver;
use zi::SystemClock;
use zi_platform::ArchRanker;

#[derive(Parser, Debug)]
#[command(
    name = "zi",
    about = "Resolve a root interface against a directory of feed fixtures and print the Selections document."
)]
struct Cli {
    /// Root interface URI to resolve.
    root: String,

    /// Directory of `*.json` feed fixtures; every file's own `uri` field
    /// determines which interface it feeds, not its filename.
    #[arg(long, default_value = ".")]
    feeds_dir: PathBuf,

    /// Overrides the configured network mode: full, minimal, or offline.
    #[arg(long)]
    network_use: Option<NetworkUse>,

    /// Overrides the configured testing opt-in.
    #[arg(long)]
    help_with_testing: bool,

    /// `[global]` config file (spec.md §4.3/§6) to read defaults from.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path).with_context(|| format!("loading config at {}", path.display()))?,
        None => Config::default(),
    };

    let mut policy = Policy::new(cli.root.clone());
    policy.network_use = cli.network_use.unwrap_or(config.network_use);
    policy.freshness = config.freshness;
    policy.help_with_testing = cli.help_with_testing || config.help_with_testing;

    let cache = InterfaceCache::new(Arc::new(NullFeedLoader), cli.feeds_dir.clone(), Arc::new(SystemClock));
    load_fixtures(&cli.feeds_dir, &cache)?;

    let arch = ArchRanker::for_host();
    let fetch = FetchCoordinator::new(Arc::new(NullDownloadManager), Arc::new(NullStore));
    let clock = SystemClock;
    let mut solver = Solver::new(&cache, &policy, &arch, &fetch, &clock);
    solver.recalculate();

    if !solver.ready {
        bail!("could not resolve '{}': not every dependency has a usable implementation", policy.root);
    }

    let selections = Selections::build(&policy, &solver)?;
    print!("{}", serialize(&selections));
    Ok(())
}

/// Real feed parsing is out of scope (spec.md §1); every fixture is
/// preloaded straight into the cache before the solver runs, so this
/// loader is never actually invoked.
struct NullFeedLoader;

impl FeedLoader for NullFeedLoader {
    fn load(&self, path: &Path) -> Result<LoadedFeed, Error> {
        Err(Error::SafeException(format!("no live feed loading in this harness: {}", path.display())))
    }
}

/// Real network transport is out of scope (spec.md §1).
struct NullDownloadManager;

impl DownloadManager for NullDownloadManager {
    fn begin(&self, _url: &str, _dest: &Path) -> DownloadHandle {
        DownloadHandle(0)
    }

    fn poll(&self, _handle: DownloadHandle) -> DownloadStatus {
        DownloadStatus::Failed("network transport is not implemented in this harness".into())
    }

    fn cancel(&self, _handle: DownloadHandle) {}
}

/// Real content-addressed storage is out of scope (spec.md §1).
struct NullStore;

impl Store for NullStore {
    fn lookup(&self, _digest: &str) -> Option<PathBuf> {
        None
    }

    fn stage_tmp(&self) -> Result<PathBuf, Error> {
        Err(Error::SafeException("no content store in this harness".into()))
    }

    fn verify_and_commit(&self, _staged: &Path, _expected_digests: &BTreeSet<String>) -> Result<PathBuf, Error> {
        Err(Error::SafeException("no content store in this harness".into()))
    }
}

fn load_fixtures(dir: &Path, cache: &InterfaceCache) -> anyhow::Result<()> {
    for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
        if entry.path().extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let (uri, feed) = load_fixture(entry.path())
            .with_context(|| format!("loading feed fixture {}", entry.path().display()))?;
        tracing::debug!(%uri, path = %entry.path().display(), "loaded feed fixture");
        cache.commit(&uri, feed);
    }
    Ok(())
}

fn load_fixture(path: &Path) -> anyhow::Result<(String, LoadedFeed)> {
    let text = std::fs::read_to_string(path)?;
    let doc: serde_json::Value = serde_json::from_str(&text)?;

    let uri = doc["uri"].as_str().context("fixture missing 'uri'")?.to_string();
    let name = doc.get("name").and_then(|v| v.as_str()).map(str::to_string);
    let last_modified = doc.get("last_modified").and_then(|v| v.as_i64());
    let stability_policy = doc
        .get("stability_policy")
        .and_then(|v| v.as_str())
        .map(|s| Stability::parse(s).with_context(|| format!("unknown stability '{s}'")))
        .transpose()?;

    let feeds = doc
        .get("feeds")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().map(parse_feed_ref).collect::<anyhow::Result<BTreeSet<_>>>())
        .transpose()?
        .unwrap_or_default();

    let feed_for = doc
        .get("feed_for")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .map(|v| v.as_str().map(str::to_string).context("feed_for entries must be strings"))
                .collect::<anyhow::Result<BTreeSet<_>>>()
        })
        .transpose()?
        .unwrap_or_default();

    let implementations = doc
        .get("implementations")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .map(|item| parse_implementation(item).map(|impl_| (impl_.id.clone(), impl_)))
                .collect::<anyhow::Result<IndexMap<_, _>>>()
        })
        .transpose()?
        .unwrap_or_default();

    Ok((
        uri,
        LoadedFeed {
            name,
            last_modified,
            feeds,
            feed_for,
            stability_policy,
            implementations,
        },
    ))
}

fn parse_feed_ref(value: &serde_json::Value) -> anyhow::Result<FeedRef> {
    Ok(FeedRef {
        uri: value["uri"].as_str().context("feed ref missing uri")?.to_string(),
        os: value.get("os").and_then(|v| v.as_str()).unwrap_or(zi_platform::ANY).to_string(),
        machine: value.get("machine").and_then(|v| v.as_str()).unwrap_or(zi_platform::ANY).to_string(),
    })
}

fn parse_implementation(value: &serde_json::Value) -> anyhow::Result<Implementation> {
    let id = value["id"].as_str().context("implementation missing id")?.to_string();
    let version = value["version"]
        .as_str()
        .context("implementation missing version")?
        .parse()
        .context("bad version")?;
    let stability = value
        .get("stability")
        .and_then(|v| v.as_str())
        .map(|s| Stability::parse(s).with_context(|| format!("unknown stability '{s}'")))
        .transpose()?
        .unwrap_or(Stability::Testing);
    let os = value.get("os").and_then(|v| v.as_str()).unwrap_or(zi_platform::ANY).to_string();
    let machine = value.get("machine").and_then(|v| v.as_str()).unwrap_or(zi_platform::ANY).to_string();

    let dependencies = value
        .get("dependencies")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .map(parse_dependency)
                .map(|dep| dep.map(|dep| (dep.interface.clone(), dep)))
                .collect::<anyhow::Result<IndexMap<_, _>>>()
        })
        .transpose()?
        .unwrap_or_default();

    let bindings = value
        .get("bindings")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().map(parse_binding).collect::<anyhow::Result<Vec<_>>>())
        .transpose()?
        .unwrap_or_default();

    let download_sources = value
        .get("download_sources")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().map(parse_retrieval_method).collect::<anyhow::Result<Vec<_>>>())
        .transpose()?
        .unwrap_or_default();

    let digests = value
        .get("digests")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .map(|v| v.as_str().map(str::to_string).context("digest entries must be strings"))
                .collect::<anyhow::Result<BTreeSet<_>>>()
        })
        .transpose()?
        .unwrap_or_default();

    let attrs = value
        .get("attrs")
        .and_then(|v| v.as_object())
        .map(parse_attrs)
        .transpose()?
        .unwrap_or_default();

    Ok(Implementation {
        id,
        version,
        stability,
        os,
        machine,
        dependencies,
        bindings,
        download_sources,
        digests,
        attrs,
    })
}

fn parse_attrs(namespaces: &serde_json::Map<String, serde_json::Value>) -> anyhow::Result<IndexMap<(String, String), String>> {
    let mut attrs = IndexMap::new();
    for (namespace, local_names) in namespaces {
        let local_names = local_names.as_object().with_context(|| format!("attrs['{namespace}'] must be an object"))?;
        for (local_name, value) in local_names {
            let value = value.as_str().with_context(|| format!("attrs['{namespace}']['{local_name}'] must be a string"))?;
            attrs.insert((namespace.clone(), local_name.clone()), value.to_string());
        }
    }
    Ok(attrs)
}

fn parse_dependency(value: &serde_json::Value) -> anyhow::Result<Dependency> {
    let interface = value["interface"].as_str().context("dependency missing interface")?.to_string();
    let mut dep = Dependency::new(interface);

    if let Some(restrictions) = value.get("restrictions").and_then(|v| v.as_array()) {
        for restriction in restrictions {
            let not_before = restriction["not_before"].as_str().context("restriction must be 'not_before'")?;
            dep = dep.with_restriction(Restriction::NotBefore(not_before.parse().context("bad restriction version")?));
        }
    }
    if let Some(bindings) = value.get("bindings").and_then(|v| v.as_array()) {
        for binding in bindings {
            dep = dep.with_binding(parse_binding(binding)?);
        }
    }
    Ok(dep)
}

fn parse_binding(value: &serde_json::Value) -> anyhow::Result<Binding> {
    if let Some(obj) = value.get("insert_path") {
        Ok(Binding::InsertPath {
            name: obj["name"].as_str().context("insert_path.name")?.to_string(),
            insert: obj["insert"].as_str().context("insert_path.insert")?.to_string(),
            separator: obj.get("separator").and_then(|v| v.as_str()).map(str::to_string),
        })
    } else if let Some(obj) = value.get("set_env") {
        Ok(Binding::SetEnv {
            name: obj["name"].as_str().context("set_env.name")?.to_string(),
            value: obj["value"].as_str().context("set_env.value")?.to_string(),
        })
    } else {
        bail!("binding must have an 'insert_path' or 'set_env' key")
    }
}

fn parse_retrieval_method(value: &serde_json::Value) -> anyhow::Result<RetrievalMethod> {
    if let Some(obj) = value.get("download_source") {
        Ok(RetrievalMethod::DownloadSource(parse_download_source(obj)?))
    } else if let Some(obj) = value.get("recipe") {
        let steps = obj["steps"]
            .as_array()
            .context("recipe missing steps")?
            .iter()
            .map(parse_download_source)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(RetrievalMethod::Recipe(Recipe { steps }))
    } else {
        bail!("retrieval method must have a 'download_source' or 'recipe' key")
    }
}

fn parse_download_source(value: &serde_json::Value) -> anyhow::Result<DownloadSource> {
    Ok(DownloadSource {
        url: value["url"].as_str().context("download_source.url")?.to_string(),
        size: value["size"].as_u64().context("download_source.size")?,
        extract: value.get("extract").and_then(|v| v.as_str()).map(str::to_string),
    })
}
