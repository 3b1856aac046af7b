//! Unpacking one downloaded archive into a destination directory
//! (spec.md §3 `DownloadSource`, §4.6).
//!
//! Format is dispatched on the URL's extension, matching the way
//! `RetrievalMethod` documents name their own archive type instead of
//! carrying a separate MIME field.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::errors::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Tar,
    Zip,
}

impl ArchiveFormat {
    pub fn from_url(url: &str) -> Option<Self> {
        let lower = url.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(ArchiveFormat::TarGz)
        } else if lower.ends_with(".tar") {
            Some(ArchiveFormat::Tar)
        } else if lower.ends_with(".zip") {
            Some(ArchiveFormat::Zip)
        } else {
            None
        }
    }
}

/// Extract `archive_path` into `dest_dir`. When `sub_path` is set, only
/// entries under it are written, with the prefix stripped, matching
/// `DownloadSource::extract` (spec.md §3: "optionally extracting only a
/// sub-path of it").
pub fn extract(archive_path: &Path, format: ArchiveFormat, dest_dir: &Path, sub_path: Option<&str>) -> Result<()> {
    std::fs::create_dir_all(dest_dir)?;
    match format {
        ArchiveFormat::TarGz => extract_tar(archive_path, dest_dir, sub_path, true),
        ArchiveFormat::Tar => extract_tar(archive_path, dest_dir, sub_path, false),
        ArchiveFormat::Zip => extract_zip(archive_path, dest_dir, sub_path),
    }
}

fn extract_tar(archive_path: &Path, dest_dir: &Path, sub_path: Option<&str>, gzip: bool) -> Result<()> {
    let file = File::open(archive_path)?;
    if gzip {
        let decoder = flate2::read::GzDecoder::new(file);
        unpack_tar(tar::Archive::new(decoder), dest_dir, sub_path)
    } else {
        unpack_tar(tar::Archive::new(file), dest_dir, sub_path)
    }
}

fn unpack_tar<R: Read>(mut archive: tar::Archive<R>, dest_dir: &Path, sub_path: Option<&str>) -> Result<()> {
    for entry in archive.entries()? {
        let mut entry = entry?;
        let raw_path = entry.path()?.into_owned();
        let Some(rel) = strip_sub_path(&raw_path, sub_path) else {
            continue;
        };
        if rel.as_os_str().is_empty() {
            continue;
        }
        let dest = safe_join(dest_dir, &rel)?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        entry.unpack(&dest)?;
    }
    Ok(())
}

fn extract_zip(archive_path: &Path, dest_dir: &Path, sub_path: Option<&str>) -> Result<()> {
    let file = File::open(archive_path)?;
    let mut zip = zip::ZipArchive::new(file).map_err(|source| Error::SafeException(format!("bad zip archive: {source}")))?;
    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|source| Error::SafeException(format!("bad zip entry: {source}")))?;
        let Some(raw_path) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            continue;
        };
        let Some(rel) = strip_sub_path(&raw_path, sub_path) else {
            continue;
        };
        if rel.as_os_str().is_empty() {
            continue;
        }
        let dest = safe_join(dest_dir, &rel)?;
        if entry.is_dir() {
            std::fs::create_dir_all(&dest)?;
            continue;
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&dest)?;
        std::io::copy(&mut entry, &mut out)?;
    }
    Ok(())
}

/// Drop everything outside `sub_path`, then strip the `sub_path` prefix
/// off the entries that remain. `None` when `sub_path` is unset means
/// "keep everything, unmodified".
fn strip_sub_path(entry_path: &Path, sub_path: Option<&str>) -> Option<PathBuf> {
    match sub_path {
        None => Some(entry_path.to_path_buf()),
        Some(prefix) => entry_path.strip_prefix(prefix).ok().map(Path::to_path_buf),
    }
}

/// Reject archive entries that would escape `dest_dir` via `..`
/// components (zip-slip).
fn safe_join(dest_dir: &Path, rel: &Path) -> Result<PathBuf> {
    if rel.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
        return Err(Error::SafeException(format!("unsafe archive entry path: {}", rel.display())));
    }
    Ok(dest_dir.join(rel))
}
