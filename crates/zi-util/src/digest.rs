//! Directory content digests.
//!
//! An implementation id that isn't a local path is an algorithm-prefixed
//! content hash (spec.md Glossary: "Digest"), e.g. `sha1=0123...`. Before
//! the real content-addressed `Store` commits a staged directory, the
//! fetch coordinator needs to recompute this digest over the staged tree
//! and compare it to the implementation id it was trying to fetch
//! (spec.md §6 "Recipe verification"). That recomputation is ordinary
//! tree-walking code, not a store primitive, so it lives here.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use sha1::{Digest as _, Sha1};
use sha2::Sha256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    Sha1,
    Sha256,
}

impl DigestAlgorithm {
    pub fn prefix(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => "sha1",
            DigestAlgorithm::Sha256 => "sha256",
        }
    }

    pub fn parse_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "sha1" => Some(DigestAlgorithm::Sha1),
            "sha256" => Some(DigestAlgorithm::Sha256),
            _ => None,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("malformed digest token {0:?}, expected '<algorithm>=<hex>'")]
    Malformed(String),
    #[error("unknown digest algorithm {0:?}")]
    UnknownAlgorithm(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Split `sha1=0123...` into its algorithm and hex digest.
pub fn parse_digest(token: &str) -> Result<(DigestAlgorithm, &str), DigestError> {
    let (prefix, hex) = token
        .split_once('=')
        .ok_or_else(|| DigestError::Malformed(token.to_string()))?;
    let algo = DigestAlgorithm::parse_prefix(prefix)
        .ok_or_else(|| DigestError::UnknownAlgorithm(prefix.to_string()))?;
    Ok((algo, hex))
}

/// Compute a deterministic content digest over a directory tree: every
/// regular file, sorted by relative path, contributes its path and bytes
/// to a single running hash. Good enough to detect a tampered or
/// truncated download; it is not meant to match any external manifest
/// format, since the real one lives in the out-of-scope `Store`.
pub fn digest_tree(root: &Path, algorithm: DigestAlgorithm) -> Result<String, DigestError> {
    let mut paths = Vec::new();
    for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| DigestError::Io {
            path: root.to_path_buf(),
            source: io::Error::new(io::ErrorKind::Other, e),
        })?;
        if entry.file_type().is_file() {
            paths.push(entry.path().to_path_buf());
        }
    }
    paths.sort();

    match algorithm {
        DigestAlgorithm::Sha1 => {
            let mut hasher = Sha1::new();
            for path in &paths {
                feed_entry(&mut hasher, root, path)?;
            }
            Ok(format!("sha1={}", hex::encode(hasher.finalize())))
        }
        DigestAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            for path in &paths {
                feed_entry(&mut hasher, root, path)?;
            }
            Ok(format!("sha256={}", hex::encode(hasher.finalize())))
        }
    }
}

fn feed_entry(
    hasher: &mut impl sha1::digest::Update,
    root: &Path,
    path: &Path,
) -> Result<(), DigestError> {
    let rel = path.strip_prefix(root).unwrap_or(path);
    hasher.update(rel.to_string_lossy().as_bytes());
    hasher.update(b"\0");
    let bytes = fs::read(path).map_err(|source| DigestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    hasher.update(&bytes);
    hasher.update(b"\0");
    Ok(())
}
