//! Per-application config/cache directory layout.
//!
//! The original tool keeps a small `basedir.py` that lays config and
//! cache files out under `$XDG_CONFIG_HOME`/`$XDG_CACHE_HOME` (with
//! `~/.config`/`~/.cache` fallbacks) beneath a `site/prog` pair, e.g.
//! `~/.config/0install.net/injector/global`. `dirs` gives us the
//! platform-correct base paths; this module only adds the `site/prog`
//! join and directory creation on top.

use std::io;
use std::path::PathBuf;

/// Directory for this application's persistent configuration (spec.md
/// §4.3, §6: the `[global]` config file lives here under `prog`).
pub fn config_dir(site: &str, prog: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join(site).join(prog))
}

/// Directory for this application's cache (spec.md §6: the content
/// store lives under `<cache>/<site>/implementations/<digest>`).
pub fn cache_dir(site: &str) -> Option<PathBuf> {
    dirs::cache_dir().map(|base| base.join(site))
}

/// `config_dir`, creating it (and its parents) if missing.
pub fn ensure_config_dir(site: &str, prog: &str) -> io::Result<PathBuf> {
    let dir = config_dir(site, prog)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no config directory for platform"))?;
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
