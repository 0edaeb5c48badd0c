//! Core data types for the variant evidence pipeline.
//!
//! This module provides the fundamental types used throughout the library:
//!
//! - [`Region`], [`PartitionTask`]: genomic work units and their processing order
//! - [`AlignedRead`]: an aligned record decoded from an alignment source
//! - [`CandidateLocus`], [`VariantKey`]: loci under consideration as variants
//! - [`ReadSupportCounter`], [`SampleEvidenceSet`]: per-sample read support
//! - [`CalledVariant`]: the terminal artifact handed to output sinks
//! - [`ChromosomeSequence`]: reference bases for one chromosome
//!
//! ## Coordinates
//!
//! All positions are 1-based and intervals are closed, as in SAM and VCF:
//!
//! | Type | Field | Convention |
//! |------|-------|------------|
//! | Region | start, end | 1-based, inclusive |
//! | AlignedRead | alignment_start | 1-based |
//! | VariantKey | position | 1-based, first base of the ref allele |
//!
//! Indels are anchored on the preceding reference base, so an insertion `A>ATT` at 100 and a
//! deletion `ACG>A` at 100 both start at the anchor base.
//!
//! [`Region`]: types::Region
//! [`PartitionTask`]: types::PartitionTask
//! [`AlignedRead`]: read::AlignedRead
//! [`CandidateLocus`]: candidate::CandidateLocus
//! [`VariantKey`]: candidate::VariantKey
//! [`ReadSupportCounter`]: evidence::ReadSupportCounter
//! [`SampleEvidenceSet`]: evidence::SampleEvidenceSet
//! [`CalledVariant`]: variant::CalledVariant
//! [`ChromosomeSequence`]: sequence::ChromosomeSequence

pub mod candidate;
pub mod evidence;
pub mod read;
pub mod sequence;
pub mod types;
pub mod variant;
