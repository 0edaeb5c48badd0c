//! Phase set assignment.
//!
//! Workers decide which adjacent variants of a region belong together and label them with
//! region-local groups. Global phase set ids are minted later from the shared
//! [`PhaseSetCounter`] by the aggregator, in region order, so ids do not depend on which worker
//! finished first.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::PhasingConfig;
use crate::core::variant::CalledVariant;

/// Process-wide source of phase set ids
#[derive(Debug)]
pub struct PhaseSetCounter {
    next: AtomicU64,
}

impl PhaseSetCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    #[must_use]
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Mint a new, never before returned id
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for PhaseSetCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// A variant together with the names of tumor fragments supporting its alt allele
#[derive(Debug, Clone, Copy)]
pub struct PhasingCandidate<'a> {
    pub variant: &'a CalledVariant,
    pub alt_fragments: &'a BTreeSet<Vec<u8>>,
}

/// Decides whether two adjacent variants share a phase set
pub trait PhasingRule: Send + Sync {
    fn in_phase(&self, left: &PhasingCandidate<'_>, right: &PhasingCandidate<'_>) -> bool;
}

/// Never phases
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPhasing;

impl PhasingRule for NoPhasing {
    fn in_phase(&self, _left: &PhasingCandidate<'_>, _right: &PhasingCandidate<'_>) -> bool {
        false
    }
}

/// Phases variants whose alt alleles were seen on enough of the same fragments
#[derive(Debug, Clone, Copy)]
pub struct SharedFragmentPhasing {
    pub min_shared_fragments: u32,
}

impl PhasingRule for SharedFragmentPhasing {
    fn in_phase(&self, left: &PhasingCandidate<'_>, right: &PhasingCandidate<'_>) -> bool {
        if self.min_shared_fragments == 0 {
            return false;
        }
        let shared = left
            .alt_fragments
            .intersection(right.alt_fragments)
            .take(self.min_shared_fragments as usize)
            .count();
        shared >= self.min_shared_fragments as usize
    }
}

/// The configured phasing rule
#[must_use]
pub fn rule_for(config: &PhasingConfig) -> Box<dyn PhasingRule> {
    if config.enabled {
        Box::new(SharedFragmentPhasing {
            min_shared_fragments: config.min_shared_fragments,
        })
    } else {
        Box::new(NoPhasing)
    }
}

/// Label chains of in-phase adjacent variants with region-local groups.
///
/// `alt_fragments[i]` belongs to `variants[i]`; both are in position order.
pub fn assign_local_groups(
    rule: &dyn PhasingRule,
    variants: &mut [CalledVariant],
    alt_fragments: &[BTreeSet<Vec<u8>>],
) {
    debug_assert_eq!(variants.len(), alt_fragments.len());

    let mut next_group = 0u32;
    for i in 1..variants.len().min(alt_fragments.len()) {
        let linked = {
            let left = PhasingCandidate {
                variant: &variants[i - 1],
                alt_fragments: &alt_fragments[i - 1],
            };
            let right = PhasingCandidate {
                variant: &variants[i],
                alt_fragments: &alt_fragments[i],
            };
            rule.in_phase(&left, &right)
        };
        if !linked {
            continue;
        }

        let group = match variants[i - 1].local_phase_group {
            Some(group) => group,
            None => {
                let group = next_group;
                next_group += 1;
                variants[i - 1].local_phase_group = Some(group);
                group
            }
        };
        variants[i].local_phase_group = Some(group);
    }
}

/// Replace region-local groups with ids minted from the shared counter, in variant order
pub fn mint_phase_sets(variants: &mut [CalledVariant], counter: &PhaseSetCounter) {
    let mut minted: HashMap<u32, u64> = HashMap::new();
    for variant in variants.iter_mut() {
        if let Some(group) = variant.local_phase_group.take() {
            let id = *minted.entry(group).or_insert_with(|| counter.next_id());
            variant.phase_set = Some(id);
        }
    }
}
