//! Indexed BAM access using noodles.
//!
//! Each [`BamReadSource`] owns its own indexed reader and header. Records are decoded into
//! [`AlignedRead`]; records without an alignment start, or whose CIGAR disagrees with the stored
//! sequence length, are dropped at decode time.

use std::path::Path;

use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record_buf::RecordBuf;
use tracing::debug;

use crate::config::SampleSpec;
use crate::core::read::{AlignedRead, CigarKind, CigarOp, ReadFlags};
use crate::core::types::Region;
use crate::source::{ReadSource, ReadSourceError, ReadSourceFactory};

type QueryFn = Box<dyn FnMut(&Region) -> Result<Vec<AlignedRead>, ReadSourceError>>;

/// A private handle onto one indexed BAM file
pub struct BamReadSource {
    query: QueryFn,
}

impl BamReadSource {
    /// Open a BAM file and its `.bai` index
    ///
    /// # Errors
    ///
    /// Returns `ReadSourceError::Open` if the file, its index or its header cannot be read.
    pub fn open(sample: &str, path: &Path) -> Result<Self, ReadSourceError> {
        use noodles::bam;

        let open_error = |e: std::io::Error| ReadSourceError::Open {
            sample: sample.to_string(),
            reason: format!("{}: {e}", path.display()),
        };

        let mut reader = bam::io::indexed_reader::Builder::default()
            .build_from_path(path)
            .map_err(open_error)?;
        let header = reader.read_header().map_err(open_error)?;

        let query = move |region: &Region| -> Result<Vec<AlignedRead>, ReadSourceError> {
            if !header
                .reference_sequences()
                .contains_key(region.chromosome.as_bytes())
            {
                return Ok(Vec::new());
            }

            let query_region = to_noodles_region(region)?;
            let query = reader.query(&header, &query_region)?;

            let mut reads = Vec::new();
            for result in query {
                let bam_record = result?;
                let record = RecordBuf::try_from_alignment_record(&header, &bam_record)?;
                if let Some(read) = decode_record(&record) {
                    reads.push(read);
                }
            }
            Ok(reads)
        };

        Ok(Self {
            query: Box::new(query),
        })
    }
}

impl ReadSource for BamReadSource {
    fn fetch(&mut self, region: &Region) -> Result<Vec<AlignedRead>, ReadSourceError> {
        (self.query)(region)
    }
}

/// Opens a [`BamReadSource`] on each sample's configured path
#[derive(Debug, Clone, Copy, Default)]
pub struct BamReadSourceFactory;

impl ReadSourceFactory for BamReadSourceFactory {
    fn open(&self, sample: &SampleSpec) -> Result<Box<dyn ReadSource>, ReadSourceError> {
        Ok(Box::new(BamReadSource::open(&sample.name, &sample.path)?))
    }
}

fn to_noodles_region(region: &Region) -> Result<noodles::core::Region, ReadSourceError> {
    use noodles::core::Position;

    let position = |value: u64| {
        usize::try_from(value)
            .ok()
            .and_then(|v| Position::try_from(v).ok())
            .ok_or_else(|| ReadSourceError::InvalidRegion {
                region: region.to_string(),
                reason: format!("position {value} is out of range"),
            })
    };

    let start = position(region.start)?;
    let end = position(region.end)?;
    Ok(noodles::core::Region::new(
        region.chromosome.as_str(),
        start..=end,
    ))
}

/// Convert a noodles record into the pipeline's read representation
pub(crate) fn decode_record(record: &RecordBuf) -> Option<AlignedRead> {
    let start = record.alignment_start()?;
    let flags = record.flags();

    let cigar: Vec<CigarOp> = record
        .cigar()
        .as_ref()
        .iter()
        .map(|op| CigarOp::new(cigar_kind(op.kind()), op.len()))
        .collect();

    let read = AlignedRead {
        name: record.name().map(|name| name.to_vec()).unwrap_or_default(),
        flags: ReadFlags {
            unmapped: flags.is_unmapped(),
            secondary: flags.is_secondary(),
            supplementary: flags.is_supplementary(),
            duplicate: flags.is_duplicate(),
            qc_fail: flags.is_qc_fail(),
        },
        // Missing mapping quality is stored as 255 in SAM
        mapping_quality: record.mapping_quality().map_or(u8::MAX, |q| q.get()),
        alignment_start: usize::from(start) as u64,
        cigar,
        bases: record.sequence().as_ref().to_vec(),
        qualities: record.quality_scores().as_ref().to_vec(),
    };

    if read.is_consistent() {
        Some(read)
    } else {
        debug!(
            read = %String::from_utf8_lossy(&read.name),
            "Skipping read whose CIGAR disagrees with its sequence length"
        );
        None
    }
}

fn cigar_kind(kind: Kind) -> CigarKind {
    match kind {
        Kind::Match => CigarKind::Match,
        Kind::Insertion => CigarKind::Insertion,
        Kind::Deletion => CigarKind::Deletion,
        Kind::Skip => CigarKind::Skip,
        Kind::SoftClip => CigarKind::SoftClip,
        Kind::HardClip => CigarKind::HardClip,
        Kind::Pad => CigarKind::Pad,
        Kind::SequenceMatch => CigarKind::SequenceMatch,
        Kind::SequenceMismatch => CigarKind::SequenceMismatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SampleRole;
    use noodles::sam::alignment::io::Write as AlignmentWrite;
    use noodles::{bam, sam};
    use tempfile::TempDir;

    const SAM: &str = "@HD\tVN:1.6\tSO:coordinate\n\
@SQ\tSN:chr1\tLN:1000\n\
r1\t0\tchr1\t100\t60\t4M\t*\t0\t0\tACGT\tIIII\n\
r2\t1024\tchr1\t150\t255\t2M1I2M\t*\t0\t0\tACTGT\tIIIII\n\
r3\t2\tchr1\t500\t30\t2S4M\t*\t0\t0\tTTACGT\tIIIIII\n";

    fn sam_records() -> (sam::Header, Vec<RecordBuf>) {
        let mut reader = sam::io::Reader::new(SAM.as_bytes());
        let header = reader.read_header().unwrap();
        let records = reader
            .record_bufs(&header)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        (header, records)
    }

    /// Write a coordinate-sorted BAM and its `.bai` next to it
    fn write_indexed_bam(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("sample.bam");
        let (header, records) = sam_records();
        {
            let mut writer = bam::io::Writer::new(std::fs::File::create(&path).unwrap());
            writer.write_header(&header).unwrap();
            for record in &records {
                writer.write_alignment_record(&header, record).unwrap();
            }
        }

        let index = bam::fs::index(&path).unwrap();
        let mut index_writer =
            bam::bai::io::Writer::new(std::fs::File::create(path.with_extension("bam.bai")).unwrap());
        index_writer.write_index(&index).unwrap();
        path
    }

    #[test]
    fn test_decode_record() {
        let (_, records) = sam_records();

        let read = decode_record(&records[0]).unwrap();
        assert_eq!(read.name, b"r1");
        assert_eq!(read.alignment_start, 100);
        assert_eq!(read.mapping_quality, 60);
        assert_eq!(read.flags, ReadFlags::default());
        assert_eq!(read.cigar, CigarOp::parse_all("4M").unwrap());
        assert_eq!(read.bases, b"ACGT");
        assert_eq!(read.qualities, vec![40; 4]);

        let duplicate = decode_record(&records[1]).unwrap();
        assert!(duplicate.flags.duplicate);
        assert_eq!(duplicate.mapping_quality, u8::MAX);
        assert_eq!(duplicate.cigar, CigarOp::parse_all("2M1I2M").unwrap());
        assert_eq!(duplicate.alignment_end(), 153);

        let clipped = decode_record(&records[2]).unwrap();
        assert_eq!(clipped.alignment_start, 500);
        assert_eq!(clipped.alignment_end(), 503);
    }

    #[test]
    fn test_fetch_from_indexed_bam() {
        let dir = TempDir::new().unwrap();
        let path = write_indexed_bam(&dir);
        let sample = SampleSpec::new("TUMOR", path.clone(), SampleRole::Tumor);
        let mut source = BamReadSourceFactory.open(&sample).unwrap();

        let reads = source.fetch(&Region::new("chr1", 90, 120)).unwrap();
        let names: Vec<&[u8]> = reads.iter().map(|r| r.name.as_slice()).collect();
        assert_eq!(names, vec![b"r1".as_slice()]);

        // r1 ends at 103, so only the later reads overlap
        let reads = source.fetch(&Region::new("chr1", 104, 1_000)).unwrap();
        let names: Vec<&[u8]> = reads.iter().map(|r| r.name.as_slice()).collect();
        assert_eq!(names, vec![b"r2".as_slice(), b"r3".as_slice()]);
        assert_eq!(reads[1].alignment_start, 500);

        assert!(source.fetch(&Region::new("chr2", 1, 100)).unwrap().is_empty());
    }

    #[test]
    fn test_cigar_kind_mapping() {
        assert_eq!(cigar_kind(Kind::Match), CigarKind::Match);
        assert_eq!(cigar_kind(Kind::Deletion), CigarKind::Deletion);
        assert_eq!(cigar_kind(Kind::SequenceMismatch), CigarKind::SequenceMismatch);
    }

    #[test]
    fn test_to_noodles_region() {
        let region = to_noodles_region(&Region::new("chr1", 100, 200)).unwrap();
        assert_eq!(region.to_string(), "chr1:100-200");
        assert!(to_noodles_region(&Region::new("chr1", 0, 200)).is_err());
    }

    #[test]
    fn test_open_missing_file() {
        let result = BamReadSource::open("T", Path::new("/nonexistent/sample.bam"));
        assert!(matches!(result, Err(ReadSourceError::Open { sample, .. }) if sample == "T"));
    }
}
