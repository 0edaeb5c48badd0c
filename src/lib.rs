//! # evidence-caller
//!
//! A region-parallel pipeline that turns aligned reads into per-sample evidence for candidate
//! variants.
//!
//! Each chromosome is split into regions that are processed independently on a pool of worker
//! threads. Within a region, candidate alleles are discovered in the tumor samples, tumor support
//! is counted and filtered, and only the surviving candidates are evaluated in the reference
//! samples. Results are re-ordered so output is always in genomic order, whatever order the
//! regions finish in.
//!
//! ## Example
//!
//! ```rust
//! use evidence_caller::candidate::TargetAnnotations;
//! use evidence_caller::config::{PipelineConfig, SampleSpec};
//! use evidence_caller::core::read::{AlignedRead, CigarOp};
//! use evidence_caller::core::sequence::ChromosomeSequence;
//! use evidence_caller::core::types::SampleRole;
//! use evidence_caller::pipeline::{ChromosomeDriver, CollectingSink, PhaseSetCounter};
//! use evidence_caller::source::InMemoryReadSourceFactory;
//!
//! let reference = ChromosomeSequence::new("chr1", "ACGT".repeat(10));
//! let config = PipelineConfig {
//!     samples: vec![SampleSpec::new("TUMOR", "tumor.bam", SampleRole::Tumor)],
//!     ..Default::default()
//! };
//! let reads = vec![
//!     AlignedRead::new("r1", 1, CigarOp::parse_all("8M").unwrap(), b"ACGTTCGT".to_vec(), vec![30; 8]),
//!     AlignedRead::new("r2", 3, CigarOp::parse_all("8M").unwrap(), b"GTTCGTAC".to_vec(), vec![30; 8]),
//! ];
//! let factory = InMemoryReadSourceFactory::new().with_sample("TUMOR", reads);
//! let annotations = TargetAnnotations::default();
//! let phase_sets = PhaseSetCounter::new();
//!
//! let driver = ChromosomeDriver::new(&config, &factory, &annotations, &phase_sets);
//! let mut sink = CollectingSink::new();
//! let summary = driver.run(&reference, &mut sink).unwrap();
//!
//! assert_eq!(summary.variants, 1);
//! assert_eq!(sink.variants()[0].locus.key.to_string(), "5 A>T");
//! ```
//!
//! ## Modules
//!
//! - [`partition`]: splitting chromosomes into regions
//! - [`candidate`]: candidate discovery, hotspots and tiering
//! - [`evidence`]: per-read classification and support counting
//! - [`pipeline`]: workers, scheduling, ordered aggregation and output sinks
//! - [`core`]: shared data types
//! - [`parsing`]: BAM, FASTA, BED, hotspot VCF and recalibration table readers
//! - [`source`]: per-sample read access
//! - [`cli`]: command-line interface implementation

pub mod candidate;
pub mod cli;
pub mod config;
pub mod core;
pub mod evidence;
pub mod parsing;
pub mod partition;
pub mod pipeline;
pub mod source;
pub mod utils;

// Re-export commonly used types for convenience
pub use candidate::{CandidateDetector, TargetAnnotations};
pub use config::{PipelineConfig, SampleSpec};
pub use core::candidate::{CandidateLocus, VariantKey};
pub use core::evidence::ReadSupportCounter;
pub use core::types::*;
pub use core::variant::CalledVariant;
pub use evidence::EvidenceAccumulator;
pub use partition::RegionPartitioner;
pub use pipeline::{ChromosomeDriver, PipelineError, ResultAggregator, RunSummary, VariantSink};
