use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::core::types::Tier;

/// Identity of a candidate within a chromosome: position plus ref/alt alleles.
///
/// Ordering is by position, then ref, then alt, which is the output order of called variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariantKey {
    pub position: u64,
    pub ref_allele: String,
    pub alt_allele: String,
}

impl VariantKey {
    pub fn new(position: u64, ref_allele: impl Into<String>, alt_allele: impl Into<String>) -> Self {
        Self {
            position,
            ref_allele: ref_allele.into(),
            alt_allele: alt_allele.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> VariantKind {
        let ref_len = self.ref_allele.len();
        let alt_len = self.alt_allele.len();
        match ref_len.cmp(&alt_len) {
            std::cmp::Ordering::Less => VariantKind::Insertion,
            std::cmp::Ordering::Greater => VariantKind::Deletion,
            std::cmp::Ordering::Equal if ref_len == 1 => VariantKind::Snv,
            std::cmp::Ordering::Equal => VariantKind::Mnv,
        }
    }

    /// Last reference position touched by the ref allele
    #[must_use]
    pub fn end_position(&self) -> u64 {
        self.position + self.ref_allele.len().max(1) as u64 - 1
    }
}

impl std::fmt::Display for VariantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}>{}", self.position, self.ref_allele, self.alt_allele)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantKind {
    Snv,
    Mnv,
    Insertion,
    Deletion,
}

/// A locus under consideration as a possible variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateLocus {
    pub chromosome: String,
    pub key: VariantKey,
    pub tier: Tier,
    /// Listed in the externally supplied hotspot collection
    pub hotspot: bool,
    /// Samples in which at least one read showed the alt allele during detection
    pub samples: BTreeSet<String>,
    /// Reads that showed the alt allele during detection, summed over samples
    pub raw_support: u32,
}

impl CandidateLocus {
    pub fn new(chromosome: impl Into<String>, key: VariantKey, tier: Tier) -> Self {
        Self {
            chromosome: chromosome.into(),
            key,
            tier,
            hotspot: tier == Tier::Hotspot,
            samples: BTreeSet::new(),
            raw_support: 0,
        }
    }

    #[must_use]
    pub fn position(&self) -> u64 {
        self.key.position
    }

    /// Fold another observation of the same locus into this one
    pub fn merge(&mut self, other: &CandidateLocus) {
        debug_assert_eq!(self.key, other.key);
        self.raw_support += other.raw_support;
        self.samples.extend(other.samples.iter().cloned());
        if other.hotspot {
            self.hotspot = true;
        }
        self.tier = self.tier.min(other.tier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_kind() {
        assert_eq!(VariantKey::new(10, "A", "T").kind(), VariantKind::Snv);
        assert_eq!(VariantKey::new(10, "AC", "TG").kind(), VariantKind::Mnv);
        assert_eq!(VariantKey::new(10, "A", "ATT").kind(), VariantKind::Insertion);
        assert_eq!(VariantKey::new(10, "ACG", "A").kind(), VariantKind::Deletion);
    }

    #[test]
    fn test_variant_key_ordering() {
        let mut keys = vec![
            VariantKey::new(20, "A", "C"),
            VariantKey::new(10, "A", "T"),
            VariantKey::new(10, "A", "G"),
            VariantKey::new(10, "AC", "A"),
        ];
        keys.sort();
        assert_eq!(keys[0], VariantKey::new(10, "A", "G"));
        assert_eq!(keys[1], VariantKey::new(10, "A", "T"));
        assert_eq!(keys[2], VariantKey::new(10, "AC", "A"));
        assert_eq!(keys[3], VariantKey::new(20, "A", "C"));
    }

    #[test]
    fn test_merge_keeps_strongest_tier() {
        let key = VariantKey::new(100, "A", "T");
        let mut observed = CandidateLocus::new("chr1", key.clone(), Tier::LowConfidence);
        observed.raw_support = 3;
        observed.samples.insert("tumor_a".to_string());

        let mut hotspot = CandidateLocus::new("chr1", key, Tier::Hotspot);
        hotspot.samples.insert("tumor_b".to_string());
        hotspot.raw_support = 1;

        observed.merge(&hotspot);
        assert_eq!(observed.tier, Tier::Hotspot);
        assert!(observed.hotspot);
        assert_eq!(observed.raw_support, 4);
        assert_eq!(observed.samples.len(), 2);
    }

    #[test]
    fn test_end_position() {
        assert_eq!(VariantKey::new(100, "ACG", "A").end_position(), 102);
        assert_eq!(VariantKey::new(100, "A", "AT").end_position(), 100);
    }
}
