//! The total order over implementations of one interface (spec.md §4.4).
//!
//! `compare` is a pure function: it takes everything it needs (the
//! interface, the policy, the arch tables, and a cache-probe closure) as
//! arguments instead of reaching into shared state, so it is trivially
//! unit-testable and the antisymmetry/transitivity properties in
//! spec.md §8 can be checked directly against it.

use std::cmp::Ordering;

use zi_platform::ArchRanker;

use crate::core::{Implementation, Interface, Stability};
use crate::policy::{NetworkUse, Policy};

/// Why an implementation is unusable, or `None` if it's fine (spec.md
/// §4.4 "Unusable-reason").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnusableReason {
    TooBuggy,
    NotCachedAndOffline,
    UnsupportedOs,
    UnsupportedMachine,
}

impl UnusableReason {
    pub fn message(&self) -> &'static str {
        match self {
            UnusableReason::TooBuggy => "buggy",
            UnusableReason::NotCachedAndOffline => "Not cached and we are off-line",
            UnusableReason::UnsupportedOs => "Unsupported OS",
            UnusableReason::UnsupportedMachine => "Unsupported machine type",
        }
    }
}

/// Tells the ranker whether an implementation's files are already on
/// disk. A trait rather than a plain closure so call sites can pass
/// `&FetchCoordinator` directly.
pub trait CacheProbe {
    fn is_cached(&self, implementation: &Implementation) -> bool;
}

impl<F: Fn(&Implementation) -> bool> CacheProbe for F {
    fn is_cached(&self, implementation: &Implementation) -> bool {
        self(implementation)
    }
}

/// spec.md §4.4 "Unusable-reason": stability at or below `buggy`;
/// offline and not cached; os/machine unknown to this host.
pub fn unusable_reason(
    implementation: &Implementation,
    policy: &Policy,
    arch: &ArchRanker,
    cache: &dyn CacheProbe,
) -> Option<UnusableReason> {
    if implementation.stability <= Stability::Buggy {
        return Some(UnusableReason::TooBuggy);
    }
    if policy.network_use == NetworkUse::Offline && !cache.is_cached(implementation) {
        return Some(UnusableReason::NotCachedAndOffline);
    }
    if arch.os_rank(&implementation.os).is_none() {
        return Some(UnusableReason::UnsupportedOs);
    }
    if arch.machine_rank(&implementation.machine).is_none() {
        return Some(UnusableReason::UnsupportedMachine);
    }
    None
}

/// The stability an implementation effectively has once clamped to the
/// interface/policy's minimum-stability threshold (spec.md §4.4 key 4).
fn effective_stability(interface: &Interface, policy: &Policy, stability: Stability) -> Stability {
    let threshold = interface.stability_policy.unwrap_or(if policy.help_with_testing {
        Stability::Testing
    } else {
        Stability::Stable
    });
    stability.max(threshold)
}

/// Total order comparator: `Less` means `a` is preferred over `b`. See
/// spec.md §4.4 for the exact, order-sensitive list of comparison keys;
/// each key short-circuits on the first non-equal result.
pub fn compare(
    interface: &Interface,
    policy: &Policy,
    arch: &ArchRanker,
    cache: &dyn CacheProbe,
    a: &Implementation,
    b: &Implementation,
) -> Ordering {
    let a_unusable = unusable_reason(a, policy, arch, cache).is_some();
    let b_unusable = unusable_reason(b, policy, arch, cache).is_some();

    // 1. Usable first.
    let order = a_unusable.cmp(&b_unusable);
    if order != Ordering::Equal {
        return order;
    }

    // 2. Overridden preferred first.
    let order = rank(a.stability == Stability::Preferred, b.stability == Stability::Preferred);
    if order != Ordering::Equal {
        return order;
    }

    // 3. Cached first when scarce (skipped in full mode, see key 8).
    if policy.network_use != NetworkUse::Full {
        let order = rank(cache.is_cached(a), cache.is_cached(b));
        if order != Ordering::Equal {
            return order;
        }
    }

    // 4. Stability clamped to the policy threshold.
    let a_eff = effective_stability(interface, policy, a.stability);
    let b_eff = effective_stability(interface, policy, b.stability);
    let order = b_eff.cmp(&a_eff); // higher precedes lower
    if order != Ordering::Equal {
        return order;
    }

    // 5. Higher version precedes lower.
    let order = b.version.cmp(&a.version);
    if order != Ordering::Equal {
        return order;
    }

    // 6. Higher OS rank precedes lower; unknown sorts last.
    let order = arch_rank_desc(arch.os_rank(&a.os), arch.os_rank(&b.os));
    if order != Ordering::Equal {
        return order;
    }

    // 7. Higher machine rank precedes lower; unknown sorts last.
    let order = arch_rank_desc(arch.machine_rank(&a.machine), arch.machine_rank(&b.machine));
    if order != Ordering::Equal {
        return order;
    }

    // 8. Cached first when plentiful (tiebreaker only in full mode).
    if policy.network_use == NetworkUse::Full {
        let order = rank(cache.is_cached(a), cache.is_cached(b));
        if order != Ordering::Equal {
            return order;
        }
    }

    // 9. Implementation id, purely for determinism.
    a.id.cmp(&b.id)
}

/// `true` sorts before `false`.
fn rank(a_wins: bool, b_wins: bool) -> Ordering {
    // booleans: false < true, so invert so that "wins" (true) sorts first.
    b_wins.cmp(&a_wins)
}

fn arch_rank_desc(a: Option<i32>, b: Option<i32>) -> Ordering {
    let a = a.unwrap_or(i32::MIN);
    let b = b.unwrap_or(i32::MIN);
    b.cmp(&a)
}

/// Sort `candidates` best-first and return them (spec.md §4.4,
/// `get_ranked_implementations`).
pub fn rank_all<'a>(
    interface: &Interface,
    policy: &Policy,
    arch: &ArchRanker,
    cache: &dyn CacheProbe,
    mut candidates: Vec<&'a Implementation>,
) -> Vec<&'a Implementation> {
    candidates.sort_by(|a, b| compare(interface, policy, arch, cache, a, b));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Interface, Uri};
    use indexmap::IndexMap;
    use std::collections::BTreeSet;

    fn impl_(id: &str, version: &str, stability: Stability) -> Implementation {
        Implementation {
            id: id.to_string(),
            version: version.parse().unwrap(),
            stability,
            os: "Linux".into(),
            machine: "x86_64".into(),
            dependencies: IndexMap::<Uri, _>::new(),
            bindings: Vec::new(),
            download_sources: Vec::new(),
            digests: BTreeSet::new(),
            attrs: IndexMap::new(),
        }
    }

    fn always_uncached(_: &Implementation) -> bool {
        false
    }

    fn interface() -> Interface {
        Interface::empty("http://example.com/Foo.xml")
    }

    #[test]
    fn higher_version_wins_when_otherwise_equal() {
        let arch = ArchRanker::with_host("Linux", "x86_64");
        let policy = Policy::new("http://example.com/Foo.xml");
        let iface = interface();
        let a = impl_("sha1=1", "2.0", Stability::Stable);
        let b = impl_("sha1=2", "1.0", Stability::Stable);
        assert_eq!(
            compare(&iface, &policy, &arch, &always_uncached, &a, &b),
            Ordering::Less
        );
    }

    #[test]
    fn unusable_always_loses_to_usable() {
        let arch = ArchRanker::with_host("Linux", "x86_64");
        let policy = Policy::new("http://example.com/Foo.xml");
        let iface = interface();
        let usable = impl_("sha1=1", "1.0", Stability::Stable);
        let buggy = impl_("sha1=2", "9.0", Stability::Buggy);
        assert_eq!(
            compare(&iface, &policy, &arch, &always_uncached, &usable, &buggy),
            Ordering::Less
        );
    }

    #[test]
    fn offline_prefers_cached_even_if_older() {
        let arch = ArchRanker::with_host("Linux", "x86_64");
        let mut policy = Policy::new("http://example.com/Foo.xml");
        policy.network_use = NetworkUse::Offline;
        let iface = interface();

        let uncached_new = impl_("sha1=new", "2.0", Stability::Stable);
        let cached_old = impl_("sha1=old", "1.0", Stability::Stable);

        let cache_probe = |impl_: &Implementation| impl_.id == "sha1=old";
        assert_eq!(
            unusable_reason(&uncached_new, &policy, &arch, &cache_probe),
            Some(UnusableReason::NotCachedAndOffline)
        );
        assert_eq!(
            compare(&iface, &policy, &arch, &cache_probe, &cached_old, &uncached_new),
            Ordering::Less
        );
    }

    #[test]
    fn comparator_is_antisymmetric() {
        let arch = ArchRanker::with_host("Linux", "x86_64");
        let policy = Policy::new("http://example.com/Foo.xml");
        let iface = interface();
        let a = impl_("sha1=1", "2.0", Stability::Stable);
        let b = impl_("sha1=2", "1.0", Stability::Stable);
        let forward = compare(&iface, &policy, &arch, &always_uncached, &a, &b);
        let backward = compare(&iface, &policy, &arch, &always_uncached, &b, &a);
        assert_eq!(forward, backward.reverse());
    }

    #[test]
    fn cached_tiebreak_is_dominant_outside_full_mode_but_late_inside_it() {
        let arch = ArchRanker::with_host("Linux", "x86_64");
        let iface = interface();

        // cached 1.0 vs uncached 2.0
        let cached = impl_("sha1=cached", "1.0", Stability::Stable);
        let uncached = impl_("sha1=uncached", "2.0", Stability::Stable);
        let cache_probe = |impl_: &Implementation| impl_.id == "sha1=cached";

        let mut minimal = Policy::new("http://example.com/Foo.xml");
        minimal.network_use = NetworkUse::Minimal;
        assert_eq!(
            compare(&iface, &minimal, &arch, &cache_probe, &cached, &uncached),
            Ordering::Less,
            "outside full mode, cached should dominate over a newer uncached version"
        );

        let full = Policy::new("http://example.com/Foo.xml");
        assert_eq!(
            compare(&iface, &full, &arch, &cache_probe, &cached, &uncached),
            Ordering::Greater,
            "in full mode, version should win and cached is only a late tiebreak"
        );
    }
}
