//! Parsing and validation of command-line values.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::types::Region;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid region '{0}': expected CHROM or CHROM:START-END")]
    InvalidRegion(String),
    #[error("Invalid sample '{0}': expected NAME=PATH")]
    InvalidSample(String),
}

/// A region argument, before the chromosome length is known
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionArg {
    Chromosome(String),
    Interval(Region),
}

impl RegionArg {
    #[must_use]
    pub fn chromosome(&self) -> &str {
        match self {
            Self::Chromosome(name) => name,
            Self::Interval(region) => &region.chromosome,
        }
    }
}

/// Parse `chr1` or `chr1:1,000-2,000` (1-based, inclusive; commas allowed in numbers).
///
/// # Examples
///
/// ```
/// use evidence_caller::utils::validation::{parse_region, RegionArg};
///
/// assert_eq!(parse_region("chrX").unwrap(), RegionArg::Chromosome("chrX".to_string()));
/// assert!(matches!(parse_region("chr1:1,001-2000").unwrap(), RegionArg::Interval(r) if r.start == 1001));
/// assert!(parse_region("chr1:200-100").is_err());
/// ```
///
/// # Errors
///
/// Returns `ValidationError::InvalidRegion` for an empty name, unparseable coordinates, a zero
/// start, or an end before the start.
pub fn parse_region(text: &str) -> Result<RegionArg, ValidationError> {
    let invalid = || ValidationError::InvalidRegion(text.to_string());
    let text = text.trim();

    let Some((chromosome, range)) = text.rsplit_once(':') else {
        if text.is_empty() {
            return Err(invalid());
        }
        return Ok(RegionArg::Chromosome(text.to_string()));
    };

    let (start, end) = range.split_once('-').ok_or_else(invalid)?;
    let parse = |value: &str| value.replace(',', "").trim().parse::<u64>().ok();
    let start = parse(start).ok_or_else(invalid)?;
    let end = parse(end).ok_or_else(invalid)?;

    if chromosome.is_empty() || start == 0 || end < start {
        return Err(invalid());
    }
    Ok(RegionArg::Interval(Region::new(chromosome, start, end)))
}

/// Parse a `NAME=PATH` sample argument
///
/// # Errors
///
/// Returns `ValidationError::InvalidSample` if either side is empty or `=` is missing.
pub fn parse_sample_arg(text: &str) -> Result<(String, PathBuf), ValidationError> {
    match text.split_once('=') {
        Some((name, path)) if !name.trim().is_empty() && !path.trim().is_empty() => {
            Ok((name.trim().to_string(), PathBuf::from(path.trim())))
        }
        _ => Err(ValidationError::InvalidSample(text.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_region_forms() {
        assert_eq!(
            parse_region("chr1:1,000-2,000").unwrap(),
            RegionArg::Interval(Region::new("chr1", 1000, 2000))
        );
        assert_eq!(
            parse_region("HLA-A*01:01:01:01:1-50").unwrap(),
            RegionArg::Interval(Region::new("HLA-A*01:01:01:01", 1, 50))
        );
        assert_eq!(parse_region("chr1").unwrap().chromosome(), "chr1");
    }

    #[test]
    fn test_parse_region_rejects() {
        for bad in ["", "chr1:0-10", "chr1:10", "chr1:a-b", ":1-10", "chr1:20-10"] {
            assert!(parse_region(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_parse_sample_arg() {
        assert_eq!(
            parse_sample_arg("TUMOR=/data/t.bam").unwrap(),
            ("TUMOR".to_string(), PathBuf::from("/data/t.bam"))
        );
        assert!(parse_sample_arg("TUMOR").is_err());
        assert!(parse_sample_arg("=t.bam").is_err());
        assert!(parse_sample_arg("TUMOR=").is_err());
    }
}
