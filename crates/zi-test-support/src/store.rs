use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tempfile::TempDir;

use zi::errors::{Error, Result};
use zi::fetch::Store;
use zi_util::digest::{digest_tree, parse_digest};

/// An in-memory-indexed, on-disk-backed content store. Verification
/// recomputes the staged directory's digest with `zi_util::digest_tree`
/// and rejects the commit if it doesn't match (spec.md §7 "digest
/// mismatches never commit"); a real `Store` would additionally trust
/// an external manifest format this fake doesn't need.
pub struct FakeStore {
    root: TempDir,
    next_id: AtomicU64,
    committed: Mutex<HashMap<String, PathBuf>>,
    committed_paths: Mutex<HashSet<PathBuf>>,
}

impl FakeStore {
    pub fn new() -> Self {
        FakeStore {
            root: tempfile::tempdir().expect("creating fake store root"),
            next_id: AtomicU64::new(0),
            committed: Mutex::new(HashMap::new()),
            committed_paths: Mutex::new(HashSet::new()),
        }
    }

    pub fn committed(&self, path: &Path) -> bool {
        self.committed_paths.lock().expect("fake store poisoned").contains(path)
    }
}

impl Default for FakeStore {
    fn default() -> Self {
        FakeStore::new()
    }
}

impl Store for FakeStore {
    fn lookup(&self, digest: &str) -> Option<PathBuf> {
        self.committed.lock().expect("fake store poisoned").get(digest).cloned()
    }

    fn stage_tmp(&self) -> Result<PathBuf> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let dir = self.root.path().join(format!("stage-{id}"));
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn verify_and_commit(&self, staged: &Path, expected_digests: &BTreeSet<String>) -> Result<PathBuf> {
        let digest = expected_digests
            .iter()
            .next()
            .cloned()
            .ok_or_else(|| Error::SafeException("no digests to commit against".into()))?;

        let (algorithm, _) = parse_digest(&digest)
            .map_err(|source| Error::SafeException(format!("bad digest {digest:?}: {source}")))?;
        let actual = digest_tree(staged, algorithm)
            .map_err(|source| Error::SafeException(format!("failed hashing staged directory: {source}")))?;

        if !expected_digests.contains(&actual) {
            std::fs::remove_dir_all(staged).ok();
            return Err(Error::DigestMismatch {
                id: digest,
                expected: expected_digests.iter().cloned().collect::<Vec<_>>().join(" "),
                actual,
            });
        }

        let dest = self.root.path().join(format!("impl-{}", sanitize(&digest)));
        if dest.exists() {
            std::fs::remove_dir_all(&dest)?;
        }
        std::fs::rename(staged, &dest).map_err(|source| Error::StoreCommitFailure {
            path: staged.to_path_buf(),
            reason: source.to_string(),
        })?;

        for digest in expected_digests {
            self.committed.lock().expect("fake store poisoned").insert(digest.clone(), dest.clone());
        }
        self.committed_paths.lock().expect("fake store poisoned").insert(dest.clone());
        Ok(dest)
    }
}

fn sanitize(digest: &str) -> String {
    digest.chars().map(|c| if c.is_ascii_alphanumeric() || c == '=' { c } else { '_' }).collect()
}
