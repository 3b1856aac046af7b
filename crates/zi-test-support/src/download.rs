use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use zi::fetch::{DownloadHandle, DownloadManager, DownloadStatus};

/// Resolves every transfer on the first `poll`, writing canned bytes
/// registered ahead of time to the requested destination. Real network
/// transport is out of scope (spec.md §1); this is the seam the rest of
/// `FetchCoordinator` is tested against.
#[derive(Default)]
pub struct FakeDownloadManager {
    next_handle: AtomicU64,
    canned: Mutex<HashMap<String, Vec<u8>>>,
    pending: Mutex<HashMap<u64, (String, PathBuf)>>,
    failures: Mutex<HashMap<String, String>>,
    began: Mutex<Vec<String>>,
}

impl FakeDownloadManager {
    pub fn new() -> Self {
        FakeDownloadManager::default()
    }

    /// Every URL `begin` has been called with, in call order. Lets tests
    /// assert that a fetch was (or wasn't) triggered without caring
    /// whether it ever completes — e.g. spec.md §4.5's background
    /// refresh of a stale interface, or §8 "Offline safety".
    pub fn began_urls(&self) -> Vec<String> {
        self.began.lock().expect("fake downloads poisoned").clone()
    }

    /// Register the raw bytes a download of `url` should produce.
    pub fn stage_bytes(&self, url: &str, bytes: Vec<u8>) {
        self.canned.lock().expect("fake downloads poisoned").insert(url.to_string(), bytes);
    }

    /// Register an in-memory `.tar.gz` built from `entries` as the
    /// canned response for `url`.
    pub fn stage_tar_gz(&self, url: &str, entries: &[(&str, &[u8])]) {
        let mut buf = Vec::new();
        {
            let encoder = flate2::write::GzEncoder::new(&mut buf, flate2::Compression::default());
            let mut builder = tar::Builder::new(encoder);
            for (name, data) in entries {
                let mut header = tar::Header::new_gnu();
                header.set_size(data.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();
                builder.append_data(&mut header, name, *data).expect("writing fake tar entry");
            }
            builder.into_inner().expect("finishing fake tar builder").finish().expect("finishing gzip stream");
        }
        self.stage_bytes(url, buf);
    }

    /// Make the next download of `url` fail with `reason` instead of
    /// succeeding.
    pub fn fail(&self, url: &str, reason: &str) {
        self.failures.lock().expect("fake downloads poisoned").insert(url.to_string(), reason.to_string());
    }
}

impl DownloadManager for FakeDownloadManager {
    fn begin(&self, url: &str, dest: &Path) -> DownloadHandle {
        let id = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.pending
            .lock()
            .expect("fake downloads poisoned")
            .insert(id, (url.to_string(), dest.to_path_buf()));
        self.began.lock().expect("fake downloads poisoned").push(url.to_string());
        DownloadHandle(id)
    }

    fn poll(&self, handle: DownloadHandle) -> DownloadStatus {
        let Some((url, dest)) = self.pending.lock().expect("fake downloads poisoned").remove(&handle.0) else {
            return DownloadStatus::Done;
        };

        if let Some(reason) = self.failures.lock().expect("fake downloads poisoned").remove(&url) {
            return DownloadStatus::Failed(reason);
        }

        let canned = self.canned.lock().expect("fake downloads poisoned");
        match canned.get(&url) {
            Some(bytes) => {
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent).expect("creating fake download destination");
                }
                std::fs::write(&dest, bytes).expect("writing fake download");
                DownloadStatus::Done
            }
            None => DownloadStatus::Failed(format!("no fixture response registered for {url}")),
        }
    }

    fn cancel(&self, handle: DownloadHandle) {
        self.pending.lock().expect("fake downloads poisoned").remove(&handle.0);
    }
}
