//! Reference sequence loading using noodles.
//!
//! A chromosome is loaded once per run and shared read-only between workers. The file is
//! streamed record by record and only the requested chromosome is kept. Gzip and bgzip
//! compressed files are supported.

use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use noodles::fasta;
use tracing::debug;

use crate::core::sequence::ChromosomeSequence;
use crate::parsing::fai::ChromosomeLengths;
use crate::parsing::{is_gzipped, ParseError};

/// Load one chromosome's bases from a FASTA file
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, `ParseError::Noodles` if a record is
/// malformed, or `ParseError::UnknownChromosome` if no record has the requested name.
pub fn load_chromosome(path: &Path, chromosome: &str) -> Result<ChromosomeSequence, ParseError> {
    let file = std::fs::File::open(path)?;
    let sequence = if is_gzipped(path) {
        let mut reader = fasta::io::Reader::new(BufReader::new(MultiGzDecoder::new(file)));
        find_chromosome(&mut reader, chromosome)?
    } else {
        let mut reader = fasta::io::Reader::new(BufReader::new(file));
        find_chromosome(&mut reader, chromosome)?
    };

    debug!(
        chromosome,
        length = sequence.len(),
        "Loaded reference sequence"
    );
    Ok(sequence)
}

fn find_chromosome<R: BufRead>(
    reader: &mut fasta::io::Reader<R>,
    chromosome: &str,
) -> Result<ChromosomeSequence, ParseError> {
    for result in reader.records() {
        let record = result
            .map_err(|e| ParseError::Noodles(format!("Failed to parse FASTA record: {e}")))?;

        let name: &[u8] = record.name();
        if name == chromosome.as_bytes() {
            return Ok(ChromosomeSequence::new(
                chromosome,
                record.sequence().as_ref().to_vec(),
            ));
        }
    }

    Err(ParseError::UnknownChromosome(chromosome.to_string()))
}

/// Scan a FASTA file for chromosome names and lengths, for references without a `.fai`
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, `ParseError::Noodles` if a record is
/// malformed, or `ParseError::InvalidFormat` if the file holds no records.
pub fn scan_lengths(path: &Path) -> Result<ChromosomeLengths, ParseError> {
    let file = std::fs::File::open(path)?;
    let entries = if is_gzipped(path) {
        let mut reader = fasta::io::Reader::new(BufReader::new(MultiGzDecoder::new(file)));
        collect_lengths(&mut reader)?
    } else {
        let mut reader = fasta::io::Reader::new(BufReader::new(file));
        collect_lengths(&mut reader)?
    };

    if entries.is_empty() {
        return Err(ParseError::InvalidFormat(
            "No sequences found in FASTA file".to_string(),
        ));
    }
    Ok(ChromosomeLengths::new(entries))
}

fn collect_lengths<R: BufRead>(
    reader: &mut fasta::io::Reader<R>,
) -> Result<Vec<(String, u64)>, ParseError> {
    let mut entries = Vec::new();
    for result in reader.records() {
        let record = result
            .map_err(|e| ParseError::Noodles(format!("Failed to parse FASTA record: {e}")))?;
        let name = String::from_utf8_lossy(record.name()).to_string();
        entries.push((name, record.sequence().len() as u64));
    }
    Ok(entries)
}

/// Chromosome lengths for a reference, preferring its `.fai` when one exists
///
/// # Errors
///
/// Returns a `ParseError` if neither the index nor the FASTA can be read.
pub fn reference_lengths(path: &Path) -> Result<ChromosomeLengths, ParseError> {
    let fai = crate::parsing::fai::index_path_for(path);
    if fai.exists() {
        crate::parsing::fai::parse_fai_file(&fai)
    } else {
        scan_lengths(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fasta(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_chromosome() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fasta(
            dir.path(),
            "ref.fa",
            ">chr1 description\nACGTacgt\nNNAA\n>chr2\nGGGG\n",
        );

        let chr1 = load_chromosome(&path, "chr1").unwrap();
        assert_eq!(chr1.len(), 12);
        assert_eq!(chr1.slice(1, 8), Some(&b"ACGTACGT"[..]));

        let chr2 = load_chromosome(&path, "chr2").unwrap();
        assert_eq!(chr2.base_at(4), Some(b'G'));

        assert!(matches!(
            load_chromosome(&path, "chr3"),
            Err(ParseError::UnknownChromosome(name)) if name == "chr3"
        ));
    }

    #[test]
    fn test_load_gzipped_chromosome() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ref.fa.gz");
        let file = std::fs::File::create(&path).unwrap();
        let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        encoder.write_all(b">chrX\nTTTTCCCC\n").unwrap();
        encoder.finish().unwrap();

        let chr = load_chromosome(&path, "chrX").unwrap();
        assert_eq!(chr.len(), 8);
        assert_eq!(chr.base_at(5), Some(b'C'));
    }

    #[test]
    fn test_reference_lengths_without_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fasta(dir.path(), "ref.fa", ">a\nACGT\n>b\nAC\n");
        let lengths = reference_lengths(&path).unwrap();
        assert_eq!(lengths.length("a"), Some(4));
        assert_eq!(lengths.length("b"), Some(2));
    }
}
