//! Read support accumulation for candidate loci.
//!
//! [`EvidenceAccumulator`] classifies every usable read at every requested candidate and folds
//! the results into a [`SampleEvidenceSet`](crate::core::evidence::SampleEvidenceSet). Support is
//! weighted by base quality passed through a [`QualityRecalibration`].

pub mod accumulator;
pub mod quality;

pub use accumulator::{AccumulatorSettings, Classification, EvidenceAccumulator};
pub use quality::{NoRecalibration, QualityContext, QualityRecalibration, RecalibrationTable};
