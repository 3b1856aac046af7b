//! User-visible resolution policy (spec.md §4.3).

pub mod config;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::Uri;

pub use config::{load_config, save_config, ConfigError};

/// How willing the solver is to use the network (spec.md §3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkUse {
    Full,
    Minimal,
    Offline,
}

impl NetworkUse {
    pub fn as_str(self) -> &'static str {
        match self {
            NetworkUse::Full => "full",
            NetworkUse::Minimal => "minimal",
            NetworkUse::Offline => "offline",
        }
    }
}

impl fmt::Display for NetworkUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown network_use value {0:?}, expected full|minimal|offline")]
pub struct NetworkUseParseError(String);

impl FromStr for NetworkUse {
    type Err = NetworkUseParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(NetworkUse::Full),
            "minimal" => Ok(NetworkUse::Minimal),
            "offline" => Ok(NetworkUse::Offline),
            other => Err(NetworkUseParseError(other.to_string())),
        }
    }
}

/// User-interaction abstraction: download progress and the one blocking
/// primitive the caller may use (spec.md §5, §9 "Policy/Handler callback
/// surface"). Never invoked from `Solver`/`Ranker`.
pub trait Handler: Send + Sync {
    /// Block until every outstanding download the caller is interested
    /// in has completed, failed, or been cancelled.
    fn wait_for_downloads(&self);

    /// Best-effort progress notification; the default implementation
    /// does nothing.
    fn on_progress(&self, _url: &str, _downloaded: u64, _expected: Option<u64>) {}
}

/// A `Handler` that never blocks because there is nothing to wait for;
/// useful for offline-only resolution and for tests.
pub struct NullHandler;

impl Handler for NullHandler {
    fn wait_for_downloads(&self) {}
}

/// The resolution policy (spec.md §4.3): network mode, freshness window,
/// testing opt-in, and the handler used for blocking waits/progress.
pub struct Policy {
    pub root: Uri,
    pub network_use: NetworkUse,
    /// Seconds allowed since `last_checked` before a background refresh
    /// is triggered (spec.md §4.5, §6).
    pub freshness: i64,
    pub help_with_testing: bool,
    /// Whether the user has already been warned that we're offline and
    /// know nothing about an interface; only warn once per process.
    warned_offline: AtomicBool,
    pub handler: Arc<dyn Handler>,
}

impl Policy {
    pub fn new(root: impl Into<Uri>) -> Self {
        Policy {
            root: root.into(),
            network_use: NetworkUse::Full,
            freshness: 60 * 60 * 24 * 30,
            help_with_testing: false,
            warned_offline: AtomicBool::new(false),
            handler: Arc::new(NullHandler),
        }
    }

    pub fn with_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handler = handler;
        self
    }

    pub fn is_offline(&self) -> bool {
        self.network_use == NetworkUse::Offline
    }

    /// True the first time it's called while offline; false afterwards,
    /// so the caller only logs the "we know nothing and can't fetch"
    /// warning once per process (spec.md §4.5 step 1, original
    /// `policy.py.get_interface`).
    pub fn warn_offline_once(&self) -> bool {
        self.warned_offline
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_use_round_trips_through_str() {
        for mode in [NetworkUse::Full, NetworkUse::Minimal, NetworkUse::Offline] {
            let parsed: NetworkUse = mode.as_str().parse().unwrap();
            assert_eq!(parsed, mode);
        }
    }

    #[test]
    fn warn_offline_once_fires_a_single_time() {
        let policy = Policy::new("http://example.com/Foo.xml");
        assert!(policy.warn_offline_once());
        assert!(!policy.warn_offline_once());
    }
}
