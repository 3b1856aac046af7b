//! The `[global]` config file (spec.md §4.3, §6).
//!
//! Format: a single `ini`-style section with three keys. Not TOML: the
//! shape in spec.md §6 is bare `key = value` pairs with no quoting rules
//! for the `network_use` string, which is exactly what the `ini` crate
//! round-trips and a strict TOML writer would not (TOML requires string
//! values to be quoted).

use std::path::Path;

use ini::Ini;

use super::NetworkUse;

const SECTION: &str = "global";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    pub help_with_testing: bool,
    pub network_use: NetworkUse,
    pub freshness: i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            help_with_testing: false,
            network_use: NetworkUse::Full,
            freshness: 60 * 60 * 24 * 30,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: ini::Error,
    },
    #[error("failed to write config at {path}: {source}")]
    Write {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("missing [global] section in {0}")]
    MissingSection(std::path::PathBuf),
    #[error("malformed key '{key}' in {path}: {value:?}")]
    MalformedValue {
        path: std::path::PathBuf,
        key: &'static str,
        value: String,
    },
}

/// Load the config at `path`. Missing file is not an error — callers get
/// `Config::default()`, matching the "nothing configured yet" case in
/// spec.md §4.3 (the original silently keeps its built-in defaults when
/// no config file has ever been saved).
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let section = ini
        .section(Some(SECTION))
        .ok_or_else(|| ConfigError::MissingSection(path.to_path_buf()))?;

    let help_with_testing = match section.get("help_with_testing") {
        Some(v) => parse_bool(path, "help_with_testing", v)?,
        None => Config::default().help_with_testing,
    };
    let network_use = match section.get("network_use") {
        Some(v) => v
            .parse()
            .map_err(|_| ConfigError::MalformedValue {
                path: path.to_path_buf(),
                key: "network_use",
                value: v.to_string(),
            })?,
        None => Config::default().network_use,
    };
    let freshness = match section.get("freshness") {
        Some(v) => v.parse::<i64>().map_err(|_| ConfigError::MalformedValue {
            path: path.to_path_buf(),
            key: "freshness",
            value: v.to_string(),
        })?,
        None => Config::default().freshness,
    };

    Ok(Config {
        help_with_testing,
        network_use,
        freshness,
    })
}

/// Persist `config` to `path`, writing new-then-rename (spec.md §5:
/// "The config file is written new-then-rename.").
pub fn save_config(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let mut ini = Ini::new();
    ini.with_section(Some(SECTION))
        .set("help_with_testing", if config.help_with_testing { "True" } else { "False" })
        .set("network_use", config.network_use.as_str())
        .set("freshness", config.freshness.to_string());

    let mut buf = Vec::new();
    ini.write_to(&mut buf).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    zi_util::write_file_atomic(path, &buf).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::Other, source.to_string()),
    })
}

fn parse_bool(path: &Path, key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        _ => Err(ConfigError::MalformedValue {
            path: path.to_path_buf(),
            key,
            value: value.to_string(),
        }),
    }
}
