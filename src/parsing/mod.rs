//! Readers for the pipeline's external inputs.
//!
//! This module provides access to:
//!
//! - **Indexed BAM files**: per-sample aligned reads for a region ([`bam`])
//! - **FASTA and .fai files**: chromosome lengths and reference bases ([`fai`], [`fasta`])
//! - **BED files**: panel and high-confidence intervals ([`bed`])
//! - **Hotspot VCFs**: curated loci that are always candidates ([`hotspots`])
//! - **Recalibration tables**: per-sample base quality adjustments ([`recalibration`])
//!
//! Text inputs may be gzip or bgzip compressed; compression is detected from the extension.
//!
//! ## Coordinates
//!
//! | Input | Native convention | Converted to |
//! |-------|-------------------|--------------|
//! | BED   | 0-based, half-open | 1-based, closed |
//! | VCF   | 1-based | unchanged |
//! | BAM   | 1-based (noodles `Position`) | unchanged |

use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use thiserror::Error;

pub mod bam;
pub mod bed;
pub mod fai;
pub mod fasta;
pub mod hotspots;
pub mod recalibration;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("noodles error: {0}")]
    Noodles(String),

    #[error("Chromosome '{0}' not found")]
    UnknownChromosome(String),
}

/// Check if the path is a gzipped file
#[allow(clippy::case_sensitive_file_extension_comparisons)] // Already lowercased
pub(crate) fn is_gzipped(path: &Path) -> bool {
    let path_str = path.to_string_lossy().to_lowercase();
    path_str.ends_with(".gz") || path_str.ends_with(".bgz")
}

/// Open a text file, transparently decompressing gzip/bgzip input
pub(crate) fn open_text(path: &Path) -> Result<Box<dyn BufRead>, ParseError> {
    let file = std::fs::File::open(path)?;
    if is_gzipped(path) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}
