//! Chromosome lengths from FASTA index (.fai) files using noodles.
//!
//! Format: `name\tlength\toffset\tline_bases\tline_width`. Only name and length are used; they
//! drive partitioning of whole chromosomes.

use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::parsing::ParseError;

/// Chromosome names and lengths, in index order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChromosomeLengths {
    entries: Vec<(String, u64)>,
}

impl ChromosomeLengths {
    #[must_use]
    pub fn new(entries: Vec<(String, u64)>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn length(&self, chromosome: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(name, _)| name == chromosome)
            .map(|&(_, length)| length)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries
            .iter()
            .map(|(name, length)| (name.as_str(), *length))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Path of the `.fai` that accompanies a FASTA file
#[must_use]
pub fn index_path_for(fasta: &Path) -> PathBuf {
    let mut path = fasta.as_os_str().to_owned();
    path.push(".fai");
    PathBuf::from(path)
}

/// Parse a FASTA index (.fai) file using noodles
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, `ParseError::Noodles` if
/// parsing fails, or `ParseError::InvalidFormat` if no chromosomes are found.
pub fn parse_fai_file(path: &Path) -> Result<ChromosomeLengths, ParseError> {
    use noodles::fasta;

    let reader = std::fs::File::open(path).map(BufReader::new)?;

    let index = fasta::fai::io::Reader::new(reader)
        .read_index()
        .map_err(|e| ParseError::Noodles(format!("Failed to parse FAI file: {e}")))?;

    let entries: Vec<(String, u64)> = index
        .as_ref()
        .iter()
        .map(|record| {
            (
                String::from_utf8_lossy(record.name()).to_string(),
                record.length(),
            )
        })
        .collect();

    if entries.is_empty() {
        return Err(ParseError::InvalidFormat(
            "No chromosomes found in FAI file".to_string(),
        ));
    }

    Ok(ChromosomeLengths::new(entries))
}

/// Parse FAI content from text
///
/// # Errors
///
/// Returns `ParseError::InvalidFormat` if a length is not numeric or no chromosomes are found.
pub fn parse_fai_text(text: &str) -> Result<ChromosomeLengths, ParseError> {
    let mut entries = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 2 {
            continue;
        }

        let name = fields[0].to_string();
        let length: u64 = fields[1].parse().map_err(|_| {
            ParseError::InvalidFormat(format!(
                "Invalid length for chromosome '{}': {}",
                name, fields[1]
            ))
        })?;

        entries.push((name, length));
    }

    if entries.is_empty() {
        return Err(ParseError::InvalidFormat(
            "No chromosomes found in FAI file".to_string(),
        ));
    }

    Ok(ChromosomeLengths::new(entries))
}
