//! Per-sample candidate detection over one region.
//!
//! Each usable read is compared against the reference along its aligned blocks:
//!
//! - every good-quality mismatching base is an SNV candidate
//! - a run of 2 to `max_mnv_length` adjacent good-quality mismatches inside one block is also an
//!   MNV candidate covering the whole run
//! - an insertion or deletion preceded by an aligned base is an indel candidate anchored on that
//!   base; one with no anchor is skipped
//!
//! Only candidates positioned inside the region are kept, so a read spanning two regions
//! contributes each candidate to exactly one of them.

use tracing::{debug, warn};

use crate::candidate::{union_candidates, CandidateSet, TargetAnnotations};
use crate::config::PipelineConfig;
use crate::core::candidate::{CandidateLocus, VariantKey};
use crate::core::read::{AlignedRead, IndelEvent, IndelKind};
use crate::core::sequence::ChromosomeSequence;
use crate::core::types::{Region, Tier};

#[derive(Debug, Clone, Copy)]
pub struct DetectorSettings {
    pub min_mapping_quality: u8,
    pub min_base_quality: u8,
    pub max_mnv_length: usize,
}

impl From<&PipelineConfig> for DetectorSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            min_mapping_quality: config.min_mapping_quality,
            min_base_quality: config.min_base_quality,
            max_mnv_length: config.max_mnv_length,
        }
    }
}

pub struct CandidateDetector<'a> {
    reference: &'a ChromosomeSequence,
    annotations: &'a TargetAnnotations,
    settings: DetectorSettings,
}

impl<'a> CandidateDetector<'a> {
    #[must_use]
    pub fn new(
        reference: &'a ChromosomeSequence,
        annotations: &'a TargetAnnotations,
        settings: DetectorSettings,
    ) -> Self {
        Self {
            reference,
            annotations,
            settings,
        }
    }

    /// Candidates for a region across all tumor samples.
    ///
    /// Per-sample observations are unioned, hotspots in the region are added, tiers are assigned
    /// and, when a panel is configured, non-hotspot candidates outside it are dropped.
    #[must_use]
    pub fn detect(&self, region: &Region, samples: &[(&str, &[AlignedRead])]) -> CandidateSet {
        let observed = samples
            .iter()
            .map(|(sample, reads)| self.observe(region, sample, reads));
        let mut candidates = union_candidates(observed);

        self.add_hotspots(region, &mut candidates);

        let annotations = self.annotations;
        candidates.retain(|key, locus| {
            if locus.hotspot {
                locus.tier = Tier::Hotspot;
                return true;
            }
            if !annotations.in_panel(&region.chromosome, key.position) {
                return false;
            }
            locus.tier = annotations.tier_for(&region.chromosome, key.position);
            true
        });

        candidates
    }

    /// Alleles observed in one sample's reads, before hotspots and tiering
    #[must_use]
    pub fn observe(&self, region: &Region, sample: &str, reads: &[AlignedRead]) -> CandidateSet {
        let mut candidates = CandidateSet::new();
        let mut skipped = 0usize;

        for read in reads {
            if !read.is_usable(self.settings.min_mapping_quality) {
                skipped += 1;
                continue;
            }

            let mut record = |key: VariantKey| {
                if !region.contains(key.position) {
                    return;
                }
                candidates
                    .entry(key)
                    .or_insert_with_key(|key| {
                        let mut locus = CandidateLocus::new(
                            region.chromosome.as_str(),
                            key.clone(),
                            Tier::LowConfidence,
                        );
                        locus.samples.insert(sample.to_string());
                        locus
                    })
                    .raw_support += 1;
            };

            self.observe_substitutions(read, &mut record);
            for event in read.indels() {
                if let Some(key) = self.indel_key(read, &event) {
                    record(key);
                }
            }
        }

        debug!(
            region = %region,
            sample,
            reads = reads.len(),
            skipped,
            candidates = candidates.len(),
            "Observed candidates"
        );

        candidates
    }

    fn observe_substitutions(&self, read: &AlignedRead, record: &mut impl FnMut(VariantKey)) {
        for block in read.aligned_blocks() {
            // Consecutive mismatches within this block: (ref_pos, ref_base, read_base)
            let mut run: Vec<(u64, u8, u8)> = Vec::new();

            for i in 0..block.len {
                let ref_pos = block.ref_start + i as u64;
                let offset = block.read_start + i;

                match self.mismatch_at(read, ref_pos, offset) {
                    Some((ref_base, read_base)) => {
                        record(VariantKey::new(
                            ref_pos,
                            char::from(ref_base).to_string(),
                            char::from(read_base).to_string(),
                        ));
                        run.push((ref_pos, ref_base, read_base));
                    }
                    None => self.flush_run(&mut run, record),
                }
            }
            self.flush_run(&mut run, record);
        }
    }

    /// Reference and read base if the read base is a good-quality mismatch
    fn mismatch_at(&self, read: &AlignedRead, ref_pos: u64, offset: usize) -> Option<(u8, u8)> {
        let ref_base = self.reference.base_at(ref_pos)?;
        let read_base = read.base_at(offset)?;
        if !is_called_base(ref_base) || !is_called_base(read_base) || ref_base == read_base {
            return None;
        }
        if read.quality_at(offset) < self.settings.min_base_quality {
            return None;
        }
        Some((ref_base, read_base))
    }

    fn flush_run(&self, run: &mut Vec<(u64, u8, u8)>, record: &mut impl FnMut(VariantKey)) {
        if run.len() >= 2 && run.len() <= self.settings.max_mnv_length {
            let ref_allele: String = run.iter().map(|&(_, r, _)| char::from(r)).collect();
            let alt_allele: String = run.iter().map(|&(_, _, a)| char::from(a)).collect();
            record(VariantKey::new(run[0].0, ref_allele, alt_allele));
        }
        run.clear();
    }

    fn indel_key(&self, read: &AlignedRead, event: &IndelEvent) -> Option<VariantKey> {
        let anchor = event.anchor?;
        let anchor_base = self.reference.base_at(anchor).filter(|&b| is_called_base(b))?;
        let anchor_offset = event.read_offset.checked_sub(1)?;
        if read.quality_at(anchor_offset) < self.settings.min_base_quality {
            return None;
        }

        match event.kind {
            IndelKind::Insertion => {
                let end = event.read_offset + event.len;
                let inserted = read.bases.get(event.read_offset..end)?;
                let all_good = (event.read_offset..end).all(|offset| {
                    read.quality_at(offset) >= self.settings.min_base_quality
                });
                if !all_good || !inserted.iter().all(|&b| is_called_base(b.to_ascii_uppercase())) {
                    return None;
                }

                let mut alt = String::with_capacity(event.len + 1);
                alt.push(char::from(anchor_base));
                alt.extend(inserted.iter().map(|&b| char::from(b.to_ascii_uppercase())));
                Some(VariantKey::new(
                    anchor,
                    char::from(anchor_base).to_string(),
                    alt,
                ))
            }
            IndelKind::Deletion => {
                let ref_allele = self
                    .reference
                    .slice(anchor, anchor + event.len as u64)?;
                Some(VariantKey::new(
                    anchor,
                    String::from_utf8_lossy(ref_allele).into_owned(),
                    char::from(anchor_base).to_string(),
                ))
            }
        }
    }

    /// Instantiate every hotspot in the region whose REF matches the reference
    fn add_hotspots(&self, region: &Region, candidates: &mut CandidateSet) {
        let hotspots =
            self.annotations
                .hotspots
                .in_region(&region.chromosome, region.start, region.end);

        for key in hotspots {
            let ref_matches = self
                .reference
                .slice(key.position, key.end_position())
                .is_some_and(|bases| bases == key.ref_allele.as_bytes());
            if !ref_matches {
                warn!(
                    chromosome = %region.chromosome,
                    hotspot = %key,
                    "Skipping hotspot whose REF does not match the reference"
                );
                continue;
            }

            candidates
                .entry(key.clone())
                .and_modify(|locus| locus.hotspot = true)
                .or_insert_with(|| {
                    CandidateLocus::new(region.chromosome.as_str(), key.clone(), Tier::Hotspot)
                });
        }
    }
}

fn is_called_base(base: u8) -> bool {
    matches!(base, b'A' | b'C' | b'G' | b'T')
}
