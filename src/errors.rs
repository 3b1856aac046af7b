//! Error kinds (spec.md §7).
//!
//! `NotReady`, `NeedDownload`, and `FeedLoadFailure` are deliberately
//! *not* variants here: per §7 they are recoverable outcomes the Solver
//! absorbs into `ready=false` plus a log line, never an `Err` a caller
//! has to handle. Only conditions that are fatal to the caller's request
//! become an `Error`.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No usable implementation exists for an interface the caller asked
    /// to resolve directly (spec.md §7).
    #[error("no usable implementation found for '{uri}'{reason}")]
    NoUsableImpl { uri: String, reason: String },

    /// A condition that should be shown to the user essentially verbatim
    /// (spec.md §7: "insufficient information, missing helper binary,
    /// wrong feed-for target").
    #[error("{0}")]
    SafeException(String),

    /// A staged directory's recomputed digest didn't match the
    /// implementation id it was fetched for.
    #[error("digest mismatch for {id}: expected {expected}, got {actual}")]
    DigestMismatch {
        id: String,
        expected: String,
        actual: String,
    },

    #[error("failed to commit {path} into the store: {reason}")]
    StoreCommitFailure { path: PathBuf, reason: String },

    #[error("missing helper tool '{tool}' needed to unpack {url}")]
    MissingHelper { tool: String, url: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
