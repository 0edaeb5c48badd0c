//! Candidate locus detection.
//!
//! Candidates come from two places: alleles observed in tumor reads (mismatches, MNVs, anchored
//! insertions and deletions) and the hotspot list, whose loci are always instantiated. Each
//! candidate is then assigned a [`Tier`] from the configured panel and high-confidence regions.

pub mod detector;

use std::collections::BTreeMap;

use crate::core::candidate::{CandidateLocus, VariantKey};
use crate::core::types::Tier;
use crate::parsing::bed::IntervalIndex;
use crate::parsing::hotspots::HotspotIndex;

pub use detector::CandidateDetector;

/// Candidates of one region, keyed and ordered by [`VariantKey`]
pub type CandidateSet = BTreeMap<VariantKey, CandidateLocus>;

/// Externally supplied loci and intervals that shape candidate detection
#[derive(Debug, Clone, Default)]
pub struct TargetAnnotations {
    pub hotspots: HotspotIndex,
    /// When present, non-hotspot candidates outside these intervals are dropped
    pub panel: Option<IntervalIndex>,
    pub high_confidence: Option<IntervalIndex>,
}

impl TargetAnnotations {
    /// Tier of a non-hotspot candidate at a position
    #[must_use]
    pub fn tier_for(&self, chromosome: &str, position: u64) -> Tier {
        if self
            .panel
            .as_ref()
            .is_some_and(|panel| panel.contains(chromosome, position))
        {
            Tier::Panel
        } else if self
            .high_confidence
            .as_ref()
            .is_some_and(|hc| hc.contains(chromosome, position))
        {
            Tier::HighConfidence
        } else {
            Tier::LowConfidence
        }
    }

    /// False only when a panel is configured and the position lies outside it
    #[must_use]
    pub fn in_panel(&self, chromosome: &str, position: u64) -> bool {
        self.panel
            .as_ref()
            .map_or(true, |panel| panel.contains(chromosome, position))
    }
}

/// Union per-sample candidate sets; a candidate seen in any sample is a candidate for all
#[must_use]
pub fn union_candidates<I>(sets: I) -> CandidateSet
where
    I: IntoIterator<Item = CandidateSet>,
{
    let mut union = CandidateSet::new();
    for set in sets {
        for (key, locus) in set {
            match union.get_mut(&key) {
                Some(existing) => existing.merge(&locus),
                None => {
                    union.insert(key, locus);
                }
            }
        }
    }
    union
}
