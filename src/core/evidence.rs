use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::core::candidate::VariantKey;
use crate::core::types::SampleRole;

/// How one read was classified at one candidate locus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadClass {
    SupportsRef,
    SupportsAlt,
    SupportsNeither,
    /// Alignment cannot tell ref from alt at this locus (indel boundary effects)
    Ambiguous,
    /// The candidate bases are below the minimum base quality
    LowQuality,
}

/// Per-sample read support at one candidate locus
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadSupportCounter {
    /// Reads overlapping the locus that passed read-level filters
    pub depth: u32,
    /// Reads showing the reference allele (matches)
    pub ref_support: u32,
    /// Reads showing the candidate allele (raw alt support)
    pub alt_support: u32,
    /// Reads showing some third allele
    pub other_support: u32,
    /// Distinct fragments showing the candidate allele
    pub alt_fragments: u32,
    /// Sum of recalibrated qualities over alt-supporting reads
    pub alt_quality: f64,
    /// Sum of recalibrated qualities over ref-supporting reads
    pub ref_quality: f64,
    pub ambiguous: u32,
    pub low_quality: u32,
}

impl ReadSupportCounter {
    /// Reads that were classified, i.e. counted towards ref, alt or neither
    #[must_use]
    pub fn classified(&self) -> u32 {
        self.ref_support + self.alt_support + self.other_support
    }

    /// Alt support as a fraction of classified reads
    #[must_use]
    pub fn allele_frequency(&self) -> f64 {
        let classified = self.classified();
        if classified == 0 {
            0.0
        } else {
            f64::from(self.alt_support) / f64::from(classified)
        }
    }

    /// Add another counter's totals into this one
    pub fn absorb(&mut self, other: &ReadSupportCounter) {
        self.depth += other.depth;
        self.ref_support += other.ref_support;
        self.alt_support += other.alt_support;
        self.other_support += other.other_support;
        self.alt_fragments += other.alt_fragments;
        self.alt_quality += other.alt_quality;
        self.ref_quality += other.ref_quality;
        self.ambiguous += other.ambiguous;
        self.low_quality += other.low_quality;
    }
}

/// Evidence for one locus in one sample, including which fragments carried the alt allele
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocusEvidence {
    pub counter: ReadSupportCounter,
    pub alt_fragment_names: BTreeSet<Vec<u8>>,
}

/// All locus evidence for one sample within one region
#[derive(Debug, Clone, PartialEq)]
pub struct SampleEvidenceSet {
    pub sample: String,
    pub role: SampleRole,
    loci: BTreeMap<VariantKey, LocusEvidence>,
}

impl SampleEvidenceSet {
    pub fn new(sample: impl Into<String>, role: SampleRole) -> Self {
        Self {
            sample: sample.into(),
            role,
            loci: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, key: VariantKey, evidence: LocusEvidence) {
        self.loci.insert(key, evidence);
    }

    #[must_use]
    pub fn get(&self, key: &VariantKey) -> Option<&LocusEvidence> {
        self.loci.get(key)
    }

    #[must_use]
    pub fn counter(&self, key: &VariantKey) -> Option<&ReadSupportCounter> {
        self.loci.get(key).map(|evidence| &evidence.counter)
    }

    #[must_use]
    pub fn contains(&self, key: &VariantKey) -> bool {
        self.loci.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.loci.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loci.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&VariantKey, &LocusEvidence)> {
        self.loci.iter()
    }
}
