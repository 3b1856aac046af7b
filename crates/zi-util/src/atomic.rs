//! Write-new-then-rename helpers.
//!
//! Both the Policy config file (spec.md §4.3) and the Store's commit step
//! (spec.md §5, "temp-dir + rename for atomicity") need a file or
//! directory to either fully appear or not appear at all, never half
//! written. `rename` within the same filesystem is atomic on every
//! platform we target, so every durable write in this workspace goes
//! through one of these two helpers instead of writing in place.

use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum AtomicError {
    #[error("failed to write temporary file {path}: {source}")]
    Write {
        path: std::path::PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to rename {from} to {to}: {source}")]
    Rename {
        from: std::path::PathBuf,
        to: std::path::PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Write `contents` to `path` by writing to `path.new` and renaming over
/// `path`. If the process is interrupted, at most a stray `.new` file is
/// left behind; `path` itself is never observed partially written.
pub fn write_file_atomic(path: &Path, contents: &[u8]) -> Result<(), AtomicError> {
    let tmp = path.with_extension(match path.extension() {
        Some(ext) => format!("{}.new", ext.to_string_lossy()),
        None => "new".to_string(),
    });

    fs::write(&tmp, contents).map_err(|source| AtomicError::Write {
        path: tmp.clone(),
        source,
    })?;

    fs::rename(&tmp, path).map_err(|source| AtomicError::Rename {
        from: tmp,
        to: path.to_path_buf(),
        source,
    })
}

/// Rename a staged directory into its final location, replacing anything
/// already there. Used to commit a verified implementation directory (or
/// a downloaded feed) into the store in a single filesystem operation.
pub fn rename_dir_replacing(from: &Path, to: &Path) -> Result<(), AtomicError> {
    if to.exists() {
        fs::remove_dir_all(to).map_err(|source| AtomicError::Rename {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        })?;
    }
    fs::rename(from, to).map_err(|source| AtomicError::Rename {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })
}
