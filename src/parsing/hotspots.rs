//! Hotspot loci from VCF files.
//!
//! Only the fixed columns are read: `#CHROM POS ID REF ALT`. Header lines are skipped,
//! multi-allelic records are split into one locus per ALT allele, and symbolic (`<DEL>`),
//! breakend, missing (`.`) and spanning-deletion (`*`) alleles are ignored.
//!
//! Alleles are reduced to their minimal form before indexing: the shared suffix is trimmed, then
//! the shared prefix, keeping a single anchor base for indels. `AC>ACT` at 100 becomes `C>CT` at
//! 101. Indels that do not reduce to an anchored form (`A>TG`) cannot be matched against read
//! alignments and are skipped with a warning.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use tracing::{debug, warn};

use crate::core::candidate::VariantKey;
use crate::parsing::{open_text, ParseError};

/// Hotspot loci grouped by chromosome and sorted by [`VariantKey`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HotspotIndex {
    by_chromosome: HashMap<String, Vec<VariantKey>>,
}

impl HotspotIndex {
    pub fn from_loci<I, S>(loci: I) -> Self
    where
        I: IntoIterator<Item = (S, VariantKey)>,
        S: Into<String>,
    {
        let mut by_chromosome: HashMap<String, Vec<VariantKey>> = HashMap::new();
        for (chromosome, key) in loci {
            by_chromosome.entry(chromosome.into()).or_default().push(key);
        }
        for keys in by_chromosome.values_mut() {
            keys.sort();
            keys.dedup();
        }
        Self { by_chromosome }
    }

    /// Hotspots whose position lies in `[start, end]`
    #[must_use]
    pub fn in_region(&self, chromosome: &str, start: u64, end: u64) -> &[VariantKey] {
        let Some(keys) = self.by_chromosome.get(chromosome) else {
            return &[];
        };
        let from = keys.partition_point(|key| key.position < start);
        let to = keys.partition_point(|key| key.position <= end);
        &keys[from..to]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_chromosome.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Load hotspots from a VCF file (optionally gzipped)
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read or `ParseError::InvalidFormat` for
/// records with missing columns or a non-numeric position.
pub fn load_hotspots(path: &Path) -> Result<HotspotIndex, ParseError> {
    let index = parse_hotspots(open_text(path)?)?;
    debug!(path = %path.display(), hotspots = index.len(), "Loaded hotspots");
    Ok(index)
}

/// Parse hotspot VCF content from a reader
///
/// # Errors
///
/// Returns `ParseError::InvalidFormat` for malformed records.
pub fn parse_hotspots<R: BufRead>(reader: R) -> Result<HotspotIndex, ParseError> {
    let mut loci = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line_num = i + 1;
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 5 {
            return Err(ParseError::InvalidFormat(format!(
                "VCF line {line_num} has fewer than 5 columns"
            )));
        }

        let position: u64 = fields[1].parse().map_err(|_| {
            ParseError::InvalidFormat(format!(
                "Invalid position on VCF line {line_num}: '{}'",
                fields[1]
            ))
        })?;
        if position == 0 {
            return Err(ParseError::InvalidFormat(format!(
                "Position 0 on VCF line {line_num}"
            )));
        }

        let ref_allele = fields[3].to_ascii_uppercase();
        if !is_plain_allele(&ref_allele) {
            continue;
        }

        for alt in fields[4].split(',') {
            let alt = alt.to_ascii_uppercase();
            if !is_plain_allele(&alt) || alt == ref_allele {
                continue;
            }
            match minimal_representation(position, &ref_allele, &alt) {
                Some(key) => loci.push((fields[0].to_string(), key)),
                None => warn!(
                    chromosome = fields[0],
                    position,
                    ref_allele = %ref_allele,
                    alt = %alt,
                    "Skipping hotspot indel without a shared anchor base"
                ),
            }
        }
    }

    Ok(HotspotIndex::from_loci(loci))
}

/// Trim shared bases from a REF/ALT pair; `None` for indels that keep no common anchor
fn minimal_representation(position: u64, ref_allele: &str, alt: &str) -> Option<VariantKey> {
    let mut ref_bases = ref_allele.as_bytes();
    let mut alt_bases = alt.as_bytes();
    let mut position = position;

    while ref_bases.len() > 1 && alt_bases.len() > 1 && ref_bases.last() == alt_bases.last() {
        ref_bases = &ref_bases[..ref_bases.len() - 1];
        alt_bases = &alt_bases[..alt_bases.len() - 1];
    }
    while ref_bases.len() > 1 && alt_bases.len() > 1 && ref_bases[0] == alt_bases[0] {
        ref_bases = &ref_bases[1..];
        alt_bases = &alt_bases[1..];
        position += 1;
    }

    if ref_bases.len() != alt_bases.len()
        && (ref_bases.len().min(alt_bases.len()) != 1 || ref_bases[0] != alt_bases[0])
    {
        return None;
    }

    Some(VariantKey::new(
        position,
        String::from_utf8_lossy(ref_bases).into_owned(),
        String::from_utf8_lossy(alt_bases).into_owned(),
    ))
}

fn is_plain_allele(allele: &str) -> bool {
    !allele.is_empty()
        && allele
            .bytes()
            .all(|b| matches!(b, b'A' | b'C' | b'G' | b'T' | b'N'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use crate::core::evidence::ReadClass;
    use crate::core::read::{AlignedRead, CigarOp};
    use crate::core::sequence::ChromosomeSequence;
    use crate::evidence::{AccumulatorSettings, EvidenceAccumulator, NoRecalibration};

    const VCF: &str = "##fileformat=VCFv4.2\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
chr1\t500\trs1\tA\tT,g\t.\t.\t.\n\
chr1\t100\t.\tAC\tA\t.\t.\t.\n\
chr1\t900\t.\tG\t<DEL>\t.\t.\t.\n\
chr1\t950\t.\tG\t*\t.\t.\t.\n\
chr2\t10\t.\tC\tCTT\t.\t.\t.\n";

    #[test]
    fn test_parse_hotspots() {
        let index = parse_hotspots(Cursor::new(VCF)).unwrap();
        assert_eq!(index.len(), 4);

        let chr1 = index.in_region("chr1", 1, 1_000);
        assert_eq!(
            chr1,
            &[
                VariantKey::new(100, "AC", "A"),
                VariantKey::new(500, "A", "G"),
                VariantKey::new(500, "A", "T"),
            ]
        );
        assert_eq!(index.in_region("chr2", 10, 10).len(), 1);
    }

    #[test]
    fn test_in_region_bounds() {
        let index = parse_hotspots(Cursor::new(VCF)).unwrap();
        assert!(index.in_region("chr1", 101, 499).is_empty());
        assert_eq!(index.in_region("chr1", 100, 100).len(), 1);
        assert!(index.in_region("chr3", 1, 1_000).is_empty());
    }

    #[test]
    fn test_alleles_reduced_to_minimal_form() {
        let vcf = "chr1\t1\t.\tAC\tACT\t.\t.\t.\n\
chr1\t10\t.\tACT\tAT\t.\t.\t.\n\
chr1\t20\t.\tACG\tATG\t.\t.\t.\n\
chr1\t30\t.\tCAA\tCA,CAAA\t.\t.\t.\n";
        let index = parse_hotspots(Cursor::new(vcf)).unwrap();
        assert_eq!(
            index.in_region("chr1", 1, 100),
            &[
                VariantKey::new(2, "C", "CT"),
                VariantKey::new(10, "AC", "A"),
                VariantKey::new(21, "C", "T"),
                VariantKey::new(30, "C", "CA"),
                VariantKey::new(30, "CA", "C"),
            ]
        );
    }

    #[test]
    fn test_unanchored_indels_skipped() {
        let vcf = "chr1\t5\t.\tA\tTG\t.\t.\t.\n\
chr1\t8\t.\tGAT\tC,GT\t.\t.\t.\n";
        let index = parse_hotspots(Cursor::new(vcf)).unwrap();
        assert_eq!(index.in_region("chr1", 1, 100), &[VariantKey::new(8, "GA", "G")]);
    }

    #[test]
    fn test_trimmed_insertion_matches_reads() {
        let index = parse_hotspots(Cursor::new("chr1\t1\t.\tAC\tACT\t.\t.\t.\n")).unwrap();
        let key = &index.in_region("chr1", 1, 10)[0];

        let reference = ChromosomeSequence::new("chr1", "ACGTACGTACGT");
        let settings = AccumulatorSettings {
            min_mapping_quality: 10,
            min_base_quality: 13,
            max_read_depth: 1_000,
            indel_boundary_distance: 1,
        };
        let accumulator = EvidenceAccumulator::new(&reference, &NoRecalibration, settings);
        let cigar = CigarOp::parse_all("2M1I6M").unwrap();
        let read = AlignedRead::new("r1", 1, cigar, b"ACTGTACGT".to_vec(), vec![30; 9]);

        let classification = accumulator.classify(&read, key).unwrap();
        assert_eq!(classification.class, ReadClass::SupportsAlt);
    }

    #[test]
    fn test_parse_hotspots_errors() {
        assert!(parse_hotspots(Cursor::new("chr1\t100\t.\tA\n")).is_err());
        assert!(parse_hotspots(Cursor::new("chr1\tabc\t.\tA\tT\n")).is_err());
    }
}
