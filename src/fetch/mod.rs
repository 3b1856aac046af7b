//! Downloading interfaces and implementation artifacts, and committing
//! the latter into content-addressed storage (spec.md §4.6).
//!
//! `DownloadManager` and `Store` are the two collaborators spec.md §1
//! puts out of scope (real network transport, real on-disk CAS); they
//! are traits here so the rest of the crate — including the archive
//! and recipe handling below, which *is* in scope — is exercisable
//! against `zi-test-support`'s fakes.

pub mod archive;
pub mod cook;

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::core::{Implementation, Interface, RetrievalMethod};
use crate::errors::{Error, Result};

/// A single outstanding transfer, as handed out by a `DownloadManager`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DownloadHandle(pub u64);

#[derive(Debug, Clone)]
pub enum DownloadStatus {
    InProgress { downloaded: u64, expected: Option<u64> },
    Done,
    Failed(String),
}

/// Real network transport is out of scope (spec.md §1); this is the
/// seam `zi-test-support::FakeDownloadManager` implements so the rest
/// of the coordinator is testable.
pub trait DownloadManager: Send + Sync {
    fn begin(&self, url: &str, dest: &Path) -> DownloadHandle;
    fn poll(&self, handle: DownloadHandle) -> DownloadStatus;
    fn cancel(&self, handle: DownloadHandle);
}

/// The on-disk content-addressed store is out of scope (spec.md §1);
/// `FetchCoordinator` only needs to ask it three things.
pub trait Store: Send + Sync {
    /// Path of an already-committed implementation with this digest, if any.
    fn lookup(&self, digest: &str) -> Option<PathBuf>;
    /// A fresh, empty scratch directory to assemble an implementation in.
    fn stage_tmp(&self) -> Result<PathBuf>;
    /// Verify `staged`'s digest matches one of `expected_digests` and move
    /// it into permanent storage, returning the final path (spec.md §7:
    /// digest mismatches never commit).
    fn verify_and_commit(&self, staged: &Path, expected_digests: &BTreeSet<String>) -> Result<PathBuf>;
}

/// Something that happened asynchronously and that the solver's host
/// (CLI, GUI, whatever drives `Handler::wait_for_downloads`) should know
/// about (spec.md §5).
#[derive(Debug, Clone)]
pub enum Event {
    InterfaceDownloaded { uri: String },
    ImplementationReady { id: String, path: PathBuf },
    Failed { what: String, reason: String },
}

/// A plain queue, not a channel: the solver thread drains it at its own
/// pace instead of blocking on a receiver (spec.md §5 "no async
/// runtime").
#[derive(Default)]
pub struct EventQueue {
    events: Mutex<VecDeque<Event>>,
}

impl EventQueue {
    pub fn new() -> Self {
        EventQueue::default()
    }

    pub fn push(&self, event: Event) {
        self.events.lock().expect("event queue poisoned").push_back(event);
    }

    pub fn drain(&self) -> Vec<Event> {
        self.events.lock().expect("event queue poisoned").drain(..).collect()
    }
}

/// Coordinates interface/implementation downloads, de-duplicating by
/// URL so two dependents of the same interface don't trigger two
/// fetches (spec.md §4.6 "URL dedup").
pub struct FetchCoordinator {
    downloads: Arc<dyn DownloadManager>,
    store: Arc<dyn Store>,
    in_flight: Mutex<HashSet<String>>,
    events: EventQueue,
}

impl FetchCoordinator {
    pub fn new(downloads: Arc<dyn DownloadManager>, store: Arc<dyn Store>) -> Self {
        FetchCoordinator {
            downloads,
            store,
            in_flight: Mutex::new(HashSet::new()),
            events: EventQueue::new(),
        }
    }

    /// Whether `implementation`'s files are already usable without
    /// touching the network (spec.md §4.4 key 3/8, §4.6). Local
    /// implementations are always "cached".
    pub fn is_cached(&self, implementation: &Implementation) -> bool {
        if implementation.is_local() {
            return true;
        }
        implementation
            .digests
            .iter()
            .any(|digest| self.store.lookup(digest).is_some())
    }

    /// Kick off a non-blocking download of `iface`'s feed document,
    /// unless one is already outstanding. Never called for local
    /// interfaces (spec.md §4.2, §4.5 step 1).
    pub fn begin_interface_download(&self, iface: &Interface, force: bool) {
        debug_assert!(!iface.is_local(), "local interfaces are read straight off disk");
        let key = format!("iface:{}", iface.uri);
        {
            let mut in_flight = self.in_flight.lock().expect("in-flight set poisoned");
            if !force && !in_flight.insert(key.clone()) {
                tracing::debug!(uri = %iface.uri, "download already in flight; not starting another");
                return;
            }
        }

        let dest = std::env::temp_dir().join(format!("zi-download-{}", sanitize(&iface.uri)));
        let handle = self.downloads.begin(&iface.uri, &dest);
        match self.wait_blocking(handle) {
            Ok(()) => self.events.push(Event::InterfaceDownloaded { uri: iface.uri.clone() }),
            Err(err) => self.events.push(Event::Failed {
                what: iface.uri.clone(),
                reason: err.to_string(),
            }),
        }
        self.in_flight.lock().expect("in-flight set poisoned").remove(&key);
    }

    /// Fetch and stage `implementation`'s files, then commit them into
    /// the store. Returns the committed path, or the implementation's
    /// own path directly if it is local or already cached.
    pub fn fetch_implementation(&self, implementation: &Implementation) -> Result<PathBuf> {
        if let Some(path) = implementation.local_path() {
            return Ok(PathBuf::from(path));
        }
        if let Some(path) = implementation
            .digests
            .iter()
            .find_map(|digest| self.store.lookup(digest))
        {
            return Ok(path);
        }

        let method = implementation.download_sources.first().ok_or_else(|| {
            Error::SafeException(format!("no retrieval method available for {}", implementation.id))
        })?;

        let staging_dir = self.store.stage_tmp()?;
        let tmp_dir = staging_dir.join(".zi-tmp");
        std::fs::create_dir_all(&tmp_dir)?;

        match method {
            RetrievalMethod::DownloadSource(source) => {
                cook::cook_single(source, self.downloads.as_ref(), &staging_dir, &tmp_dir)?
            }
            RetrievalMethod::Recipe(recipe) => {
                cook::cook(recipe, self.downloads.as_ref(), &staging_dir, &tmp_dir)?
            }
        }
        std::fs::remove_dir_all(&tmp_dir).ok();

        let committed = self.store.verify_and_commit(&staging_dir, &implementation.digests)?;
        self.events.push(Event::ImplementationReady {
            id: implementation.id.clone(),
            path: committed.clone(),
        });
        Ok(committed)
    }

    pub fn drain_events(&self) -> Vec<Event> {
        self.events.drain()
    }

    fn wait_blocking(&self, handle: DownloadHandle) -> Result<()> {
        loop {
            match self.downloads.poll(handle) {
                DownloadStatus::Done => return Ok(()),
                DownloadStatus::Failed(reason) => return Err(Error::SafeException(reason)),
                DownloadStatus::InProgress { .. } => continue,
            }
        }
    }
}

/// Blocking helper shared by `cook`: start a transfer and spin the poll
/// loop until it settles. Production `DownloadManager` implementations
/// are expected to make `poll` a cheap, non-busy check (e.g. backed by
/// `curl_multi_perform`); the fakes in `zi-test-support` resolve on the
/// first poll.
pub(crate) fn download_blocking(downloads: &dyn DownloadManager, url: &str, dest: &Path) -> Result<()> {
    let handle = downloads.begin(url, dest);
    wait_handle(downloads, handle)
}

/// Spin the poll loop on a transfer that was already started with
/// `begin` (spec.md §4.6 "Cook": every recipe step's download is
/// started before any of them is waited on, so they run concurrently
/// under the `DownloadManager`).
pub(crate) fn wait_handle(downloads: &dyn DownloadManager, handle: DownloadHandle) -> Result<()> {
    loop {
        match downloads.poll(handle) {
            DownloadStatus::Done => return Ok(()),
            DownloadStatus::Failed(reason) => return Err(Error::SafeException(reason)),
            DownloadStatus::InProgress { .. } => continue,
        }
    }
}

fn sanitize(uri: &str) -> String {
    uri.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
