//! Per-read classification of candidate loci.
//!
//! For every usable read covering a candidate's position the read is classified as supporting
//! the reference allele, the candidate allele, neither, or is set aside as ambiguous or low
//! quality. Classification depends on the candidate kind:
//!
//! | Kind | Alt | Ref | Ambiguous |
//! |------|-----|-----|-----------|
//! | SNV/MNV | read bases equal ALT | read bases equal REF | an indel within `indel_boundary_distance` of the span |
//! | Insertion | same inserted bases after the anchor | alignment continues past the anchor | aligned block ends at the anchor |
//! | Deletion | same-length deletion after the anchor | alignment continues through the last deleted base | aligned block ends inside the deleted span |
//!
//! A substitution position that falls inside one of the read's deletions counts as neither, as
//! does a different indel at an indel candidate's anchor.

use std::collections::BTreeMap;

use crate::config::PipelineConfig;
use crate::core::candidate::{VariantKey, VariantKind};
use crate::core::evidence::{LocusEvidence, ReadClass, SampleEvidenceSet};
use crate::core::read::{AlignedRead, IndelEvent, IndelKind, ReadPosition};
use crate::core::sequence::ChromosomeSequence;
use crate::core::types::SampleRole;
use crate::evidence::quality::{QualityContext, QualityRecalibration};

#[derive(Debug, Clone, Copy)]
pub struct AccumulatorSettings {
    pub min_mapping_quality: u8,
    pub min_base_quality: u8,
    pub max_read_depth: u32,
    pub indel_boundary_distance: u64,
}

impl From<&PipelineConfig> for AccumulatorSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            min_mapping_quality: config.min_mapping_quality,
            min_base_quality: config.min_base_quality,
            max_read_depth: config.max_read_depth,
            indel_boundary_distance: config.indel_boundary_distance,
        }
    }
}

/// A read's classification at one locus and the base quality it carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub class: ReadClass,
    pub quality: u8,
}

impl Classification {
    fn new(class: ReadClass, quality: u8) -> Self {
        Self { class, quality }
    }

    fn without_quality(class: ReadClass) -> Self {
        Self { class, quality: 0 }
    }
}

pub struct EvidenceAccumulator<'a> {
    reference: &'a ChromosomeSequence,
    recalibration: &'a dyn QualityRecalibration,
    settings: AccumulatorSettings,
}

impl<'a> EvidenceAccumulator<'a> {
    #[must_use]
    pub fn new(
        reference: &'a ChromosomeSequence,
        recalibration: &'a dyn QualityRecalibration,
        settings: AccumulatorSettings,
    ) -> Self {
        Self {
            reference,
            recalibration,
            settings,
        }
    }

    /// Gather one sample's evidence for exactly the given candidates
    pub fn accumulate<'k, I>(
        &self,
        sample: &str,
        role: SampleRole,
        keys: I,
        reads: &[AlignedRead],
    ) -> SampleEvidenceSet
    where
        I: IntoIterator<Item = &'k VariantKey>,
    {
        let mut loci: BTreeMap<VariantKey, LocusEvidence> = keys
            .into_iter()
            .map(|key| (key.clone(), LocusEvidence::default()))
            .collect();

        if !loci.is_empty() {
            for read in reads {
                if !read.is_usable(self.settings.min_mapping_quality) {
                    continue;
                }
                let from = VariantKey::new(read.alignment_start, String::new(), String::new());
                let end = read.alignment_end();
                for (key, evidence) in loci.range_mut(from..) {
                    if key.position > end {
                        break;
                    }
                    self.record(sample, key, read, evidence);
                }
            }
        }

        let mut set = SampleEvidenceSet::new(sample, role);
        for (key, evidence) in loci {
            set.insert(key, evidence);
        }
        set
    }

    fn record(&self, sample: &str, key: &VariantKey, read: &AlignedRead, evidence: &mut LocusEvidence) {
        let Some(classification) = self.classify(read, key) else {
            return;
        };

        let counter = &mut evidence.counter;
        counter.depth += 1;
        if counter.classified() >= self.settings.max_read_depth {
            return;
        }

        match classification.class {
            ReadClass::SupportsAlt => {
                counter.alt_support += 1;
                counter.alt_quality += self.weight(sample, key, classification.quality);
                if evidence.alt_fragment_names.insert(read.name.clone()) {
                    counter.alt_fragments += 1;
                }
            }
            ReadClass::SupportsRef => {
                counter.ref_support += 1;
                counter.ref_quality += self.weight(sample, key, classification.quality);
            }
            ReadClass::SupportsNeither => counter.other_support += 1,
            ReadClass::Ambiguous => counter.ambiguous += 1,
            ReadClass::LowQuality => counter.low_quality += 1,
        }
    }

    fn weight(&self, sample: &str, key: &VariantKey, quality: u8) -> f64 {
        let context = QualityContext {
            trinucleotide: self.reference.trinucleotide(key.position),
            ref_base: key.ref_allele.bytes().next().unwrap_or(b'N'),
            alt_base: key.alt_allele.bytes().next().unwrap_or(b'N'),
        };
        self.recalibration.recalibrate(sample, &context, quality)
    }

    /// Classify one read at one candidate; `None` if the read does not cover the candidate
    #[must_use]
    pub fn classify(&self, read: &AlignedRead, key: &VariantKey) -> Option<Classification> {
        let classification = match key.kind() {
            VariantKind::Snv | VariantKind::Mnv => self.classify_substitution(read, key)?,
            VariantKind::Insertion => self.classify_insertion(read, key)?,
            VariantKind::Deletion => self.classify_deletion(read, key)?,
        };

        let supports_allele = matches!(
            classification.class,
            ReadClass::SupportsAlt | ReadClass::SupportsRef
        );
        if supports_allele && classification.quality < self.settings.min_base_quality {
            return Some(Classification::new(ReadClass::LowQuality, classification.quality));
        }
        Some(classification)
    }

    fn classify_substitution(&self, read: &AlignedRead, key: &VariantKey) -> Option<Classification> {
        let mut offsets = Vec::with_capacity(key.ref_allele.len());
        let mut deleted = false;
        for position in key.position..=key.end_position() {
            match read.position_of(position) {
                ReadPosition::NotCovered => return None,
                ReadPosition::Deleted => deleted = true,
                ReadPosition::Aligned(offset) => offsets.push(offset),
            }
        }
        if deleted {
            return Some(Classification::without_quality(ReadClass::SupportsNeither));
        }

        let distance = self.settings.indel_boundary_distance;
        let near_indel = read.indels().iter().any(|event| {
            let (lo, hi) = event_span(event);
            gap(lo, hi, key.position, key.end_position()) <= distance
        });
        if near_indel {
            return Some(Classification::without_quality(ReadClass::Ambiguous));
        }

        let bases: Vec<u8> = offsets
            .iter()
            .map(|&offset| read.base_at(offset).unwrap_or(b'N'))
            .collect();
        let quality = offsets
            .iter()
            .map(|&offset| read.quality_at(offset))
            .min()
            .unwrap_or(0);

        let class = if bases == key.alt_allele.as_bytes() {
            ReadClass::SupportsAlt
        } else if bases == key.ref_allele.as_bytes() {
            ReadClass::SupportsRef
        } else {
            ReadClass::SupportsNeither
        };
        Some(Classification::new(class, quality))
    }

    fn classify_insertion(&self, read: &AlignedRead, key: &VariantKey) -> Option<Classification> {
        let anchor = key.position;
        let offset = match read.position_of(anchor) {
            ReadPosition::NotCovered => return None,
            ReadPosition::Deleted => {
                return Some(Classification::without_quality(ReadClass::SupportsNeither))
            }
            ReadPosition::Aligned(offset) => offset,
        };

        let events = read.indels();
        let inserted = &key.alt_allele.as_bytes()[key.ref_allele.len()..];
        if let Some(event) = events.iter().find(|e| e.anchor == Some(anchor)) {
            if event.kind == IndelKind::Insertion {
                let end = event.read_offset + event.len;
                let read_inserted: Vec<u8> = (event.read_offset..end)
                    .map(|o| read.base_at(o).unwrap_or(b'N'))
                    .collect();
                if read_inserted == inserted {
                    let quality = min_quality(read, offset..=end - 1);
                    return Some(Classification::new(ReadClass::SupportsAlt, quality));
                }
            }
            return Some(Classification::without_quality(ReadClass::SupportsNeither));
        }

        let block = read.block_containing(anchor)?;
        if block.ref_end() == anchor {
            return Some(Classification::without_quality(ReadClass::Ambiguous));
        }
        let quality = min_quality(read, offset..=offset + 1);
        Some(Classification::new(ReadClass::SupportsRef, quality))
    }

    fn classify_deletion(&self, read: &AlignedRead, key: &VariantKey) -> Option<Classification> {
        let anchor = key.position;
        let last_deleted = key.end_position();
        let deleted_len = key.ref_allele.len() - key.alt_allele.len();

        let offset = match read.position_of(anchor) {
            ReadPosition::NotCovered => return None,
            ReadPosition::Deleted => {
                return Some(Classification::without_quality(ReadClass::SupportsNeither))
            }
            ReadPosition::Aligned(offset) => offset,
        };

        let events = read.indels();
        if let Some(event) = events.iter().find(|e| e.anchor == Some(anchor)) {
            if event.kind == IndelKind::Deletion && event.len == deleted_len {
                let quality = min_quality(read, offset..=offset + 1);
                return Some(Classification::new(ReadClass::SupportsAlt, quality));
            }
            return Some(Classification::without_quality(ReadClass::SupportsNeither));
        }
        let other_indel = events
            .iter()
            .any(|e| e.anchor.is_some_and(|a| a > anchor && a < last_deleted));
        if other_indel {
            return Some(Classification::without_quality(ReadClass::SupportsNeither));
        }

        let block = read.block_containing(anchor)?;
        if block.ref_end() < last_deleted {
            return Some(Classification::without_quality(ReadClass::Ambiguous));
        }
        let quality = min_quality(read, offset..=offset + 1);
        Some(Classification::new(ReadClass::SupportsRef, quality))
    }
}

/// Reference interval touched by an indel; an insertion touches the bases on either side
fn event_span(event: &IndelEvent) -> (u64, u64) {
    match event.kind {
        IndelKind::Insertion => (event.ref_start.saturating_sub(1), event.ref_start),
        IndelKind::Deletion => (event.ref_start, event.ref_start + event.len as u64 - 1),
    }
}

/// Bases between two closed intervals; 0 when they overlap
fn gap(a_start: u64, a_end: u64, b_start: u64, b_end: u64) -> u64 {
    if a_end < b_start {
        b_start - a_end
    } else if b_end < a_start {
        a_start - b_end
    } else {
        0
    }
}

fn min_quality(read: &AlignedRead, offsets: std::ops::RangeInclusive<usize>) -> u8 {
    offsets
        .filter(|&offset| offset < read.bases.len())
        .map(|offset| read.quality_at(offset))
        .min()
        .unwrap_or(0)
}
