//! Base quality adjustment applied when weighting read support.
//!
//! The pipeline never builds recalibration models itself; it only looks them up. A lookup is keyed
//! by sample and by the sequencing context of the candidate: the reference trinucleotide centred on
//! the candidate position plus the first base of the ref and alt alleles.

use std::collections::HashMap;
use std::path::Path;

use crate::parsing::recalibration::{load_recalibration_file, RecalibrationEntry};
use crate::parsing::ParseError;

/// Sequencing context of a candidate locus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QualityContext {
    pub trinucleotide: [u8; 3],
    pub ref_base: u8,
    pub alt_base: u8,
}

/// Maps `(sample, context, raw quality)` to an adjusted quality
pub trait QualityRecalibration: Send + Sync {
    fn recalibrate(&self, sample: &str, context: &QualityContext, quality: u8) -> f64;
}

/// Uses raw base qualities unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRecalibration;

impl QualityRecalibration for NoRecalibration {
    fn recalibrate(&self, _sample: &str, _context: &QualityContext, quality: u8) -> f64 {
        f64::from(quality)
    }
}

type LookupKey = (u8, u8, [u8; 3], u8);

/// Per-sample recalibration lookups; missing entries fall back to the raw quality
#[derive(Debug, Clone, Default)]
pub struct RecalibrationTable {
    samples: HashMap<String, HashMap<LookupKey, f64>>,
}

impl RecalibrationTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sample's table entries, replacing any earlier table for that sample
    pub fn insert_sample(&mut self, sample: impl Into<String>, entries: &[RecalibrationEntry]) {
        let lookups = entries
            .iter()
            .map(|entry| {
                (
                    (
                        entry.ref_base,
                        entry.alt_base,
                        entry.context,
                        entry.original_quality,
                    ),
                    entry.recalibrated_quality,
                )
            })
            .collect();
        self.samples.insert(sample.into(), lookups);
    }

    /// Load a sample's table from a TSV file
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if the file cannot be read or is malformed.
    pub fn load_sample(&mut self, sample: impl Into<String>, path: &Path) -> Result<(), ParseError> {
        let entries = load_recalibration_file(path)?;
        self.insert_sample(sample, &entries);
        Ok(())
    }

    #[must_use]
    pub fn has_sample(&self, sample: &str) -> bool {
        self.samples.contains_key(sample)
    }
}

impl QualityRecalibration for RecalibrationTable {
    fn recalibrate(&self, sample: &str, context: &QualityContext, quality: u8) -> f64 {
        self.samples
            .get(sample)
            .and_then(|lookups| {
                lookups.get(&(
                    context.ref_base,
                    context.alt_base,
                    context.trinucleotide,
                    quality,
                ))
            })
            .copied()
            .unwrap_or_else(|| f64::from(quality))
    }
}
