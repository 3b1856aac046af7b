//! Assembling a `Recipe`'s steps into one implementation directory
//! (spec.md Glossary: "Recipe", §4.6).
//!
//! Each step downloads an archive and extracts it into the same staging
//! directory; later steps can add files alongside (or on top of)
//! earlier ones, the same layering a multi-step 0install recipe uses to
//! patch a base tarball.

use std::path::Path;

use crate::core::{DownloadSource, Recipe};
use crate::errors::{Error, Result};
use crate::fetch::archive::{self, ArchiveFormat};
use crate::fetch::{DownloadHandle, DownloadManager};

/// Download and extract every step of `recipe` into `staging_dir`,
/// which must already exist and be empty. Every step's download is
/// started before any of them is waited on, so the `DownloadManager`
/// can run them concurrently (spec.md §4.6: "starts one download per
/// step in parallel"); extraction then proceeds in recipe-declared
/// order once each step's bytes have landed.
pub fn cook(recipe: &Recipe, downloads: &dyn DownloadManager, staging_dir: &Path, tmp_dir: &Path) -> Result<()> {
    let mut steps = Vec::with_capacity(recipe.steps.len());
    for (index, step) in recipe.steps.iter().enumerate() {
        let format = ArchiveFormat::from_url(&step.url).ok_or_else(|| {
            Error::SafeException(format!("don't know how to unpack recipe step {index}: {}", step.url))
        })?;
        let download_path = tmp_dir.join(format!("step-{index}"));
        let handle = downloads.begin(&step.url, &download_path);
        steps.push((step, format, download_path, handle));
    }

    for (step, format, download_path, handle) in steps {
        await_step(downloads, handle, &download_path, format, staging_dir, step)?;
    }
    Ok(())
}

fn await_step(
    downloads: &dyn DownloadManager,
    handle: DownloadHandle,
    download_path: &Path,
    format: ArchiveFormat,
    staging_dir: &Path,
    step: &DownloadSource,
) -> Result<()> {
    super::wait_handle(downloads, handle)?;
    archive::extract(download_path, format, staging_dir, step.extract.as_deref())
}

/// The single-archive case: not a `Recipe`, just one `DownloadSource`
/// (spec.md §3 `RetrievalMethod::DownloadSource`).
pub fn cook_single(
    source: &DownloadSource,
    downloads: &dyn DownloadManager,
    staging_dir: &Path,
    tmp_dir: &Path,
) -> Result<()> {
    let recipe = Recipe {
        steps: vec![source.clone()],
    };
    cook(&recipe, downloads, staging_dir, tmp_dir)
}
