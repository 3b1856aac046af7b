//! Static OS/machine compatibility ranking.
//!
//! An [`ArchRanker`] answers exactly one question for the solver: given an
//! implementation's declared `os` and `machine` strings, is it usable on
//! this host, and if several implementations are usable, which one is more
//! specific (and therefore preferred)? Higher rank means more preferred;
//! `None` means "unknown to this host" and makes an implementation
//! unusable regardless of every other ranking key.
//!
//! Kept in its own crate because it has no dependency on anything else in
//! the workspace and is useful to test in isolation from the solver.

use std::collections::HashMap;

/// The wildcard os/machine value: an implementation built for `"any"`
/// machine (e.g. pure scripts, source archives) is compatible with every
/// host whose own os/machine is itself acceptable.
pub const ANY: &str = "any";

// Ordered worst-to-best. A host machine ranks every entry up to and
// including its own position; entries past the host's position require
// capabilities the host doesn't have and are left out of the table
// entirely (so they compare as "unknown" and are therefore unusable).
const MACHINE_FAMILIES: &[&[&str]] = &[
    &["i386", "i486", "i586", "i686", "x86_64"],
    &["armv5tel", "armv6l", "armv7l", "aarch64"],
    &["ppc", "ppc64"],
    &["sparc", "sparc64"],
];

const OS_FAMILIES: &[&[&str]] = &[
    &["Linux"],
    &["Darwin", "MacOSX"],
    &["Windows", "Cygwin"],
    &["FreeBSD"],
    &["Solaris"],
];

/// Rank tables computed once for a given host os/machine.
#[derive(Debug, Clone)]
pub struct ArchRanker {
    os_ranks: HashMap<String, i32>,
    machine_ranks: HashMap<String, i32>,
}

impl ArchRanker {
    /// Build the tables from the running process's actual os/arch.
    pub fn for_host() -> Self {
        let (os, machine) = host_names();
        Self::with_host(&os, &machine)
    }

    /// Build the tables as if running on the given os/machine. Tests use
    /// this so fixtures don't depend on the CI runner's own architecture.
    pub fn with_host(os: &str, machine: &str) -> Self {
        Self {
            os_ranks: build_ranks(OS_FAMILIES, os),
            machine_ranks: build_ranks(MACHINE_FAMILIES, machine),
        }
    }

    /// Rank of `os`, or `None` if this host can't run it.
    pub fn os_rank(&self, os: &str) -> Option<i32> {
        self.os_ranks.get(os).copied()
    }

    /// Rank of `machine`, or `None` if this host can't run it.
    pub fn machine_rank(&self, machine: &str) -> Option<i32> {
        self.machine_ranks.get(machine).copied()
    }

    /// True if both `os` and `machine` are known to this host.
    pub fn is_usable(&self, os: &str, machine: &str) -> bool {
        self.os_rank(os).is_some() && self.machine_rank(machine).is_some()
    }
}

fn build_ranks(families: &[&[&str]], host: &str) -> HashMap<String, i32> {
    let mut ranks = HashMap::new();

    let family = families.iter().find(|f| f.contains(&host)).copied();

    match family {
        Some(family) => {
            // unwrap: `family` was found by searching for `host` in it.
            let host_pos = family.iter().position(|m| *m == host).unwrap();
            for (i, name) in family.iter().enumerate().take(host_pos + 1) {
                ranks.insert((*name).to_string(), (i + 1) as i32);
            }
        }
        None => {
            // Not in any known family: still usable on itself, nothing else.
            ranks.insert(host.to_string(), 1);
        }
    }

    // `any` is acceptable whenever the host's own os/machine is, which is
    // guaranteed by the inserts above; it ranks above every specific
    // match (spec.md §4.1).
    ranks.insert(ANY.to_string(), i32::MAX);
    ranks
}

fn host_names() -> (String, String) {
    let os = match std::env::consts::OS {
        "macos" => "Darwin",
        "windows" => "Windows",
        "linux" => "Linux",
        "freebsd" => "FreeBSD",
        "solaris" => "Solaris",
        other => other,
    }
    .to_string();

    let machine = match std::env::consts::ARCH {
        "x86" => "i686",
        "arm" => "armv7l",
        "powerpc" => "ppc",
        "powerpc64" => "ppc64",
        other => other,
    }
    .to_string();

    (os, machine)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_host_match_is_usable() {
        let r = ArchRanker::with_host("Linux", "x86_64");
        assert!(r.is_usable("Linux", "x86_64"));
    }

    #[test]
    fn older_32bit_machine_runs_on_64bit_host() {
        let r = ArchRanker::with_host("Linux", "x86_64");
        assert!(r.machine_rank("i686").is_some());
        assert!(r.machine_rank("i686") < r.machine_rank("x86_64"));
    }

    #[test]
    fn newer_machine_does_not_run_on_older_host() {
        let r = ArchRanker::with_host("Linux", "i686");
        assert_eq!(r.machine_rank("x86_64"), None);
    }

    #[test]
    fn unknown_os_is_unusable() {
        let r = ArchRanker::with_host("Linux", "x86_64");
        assert_eq!(r.os_rank("BeOS"), None);
    }

    #[test]
    fn any_outranks_every_specific_match() {
        let r = ArchRanker::with_host("Linux", "x86_64");
        let any_rank = r.machine_rank(ANY).unwrap();
        assert!(any_rank > r.machine_rank("x86_64").unwrap());
        assert!(any_rank > r.machine_rank("i686").unwrap());
    }

    #[test]
    fn os_family_aliases_share_rank_table() {
        let r = ArchRanker::with_host("Darwin", "aarch64");
        assert!(r.os_rank("MacOSX").is_some());
    }
}
