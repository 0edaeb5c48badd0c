//! BED interval loading.
//!
//! BED lines are `chrom\tstart\tend[\t...]` with 0-based, half-open coordinates. They are
//! converted to 1-based closed intervals, sorted, and overlapping intervals merged per chromosome.
//! `track` and `browser` lines, comments and blank lines are skipped.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use crate::parsing::{open_text, ParseError};

/// Chromosome-indexed, merged, 1-based closed intervals
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntervalIndex {
    by_chromosome: HashMap<String, Vec<(u64, u64)>>,
}

impl IntervalIndex {
    /// Build an index from 1-based closed intervals
    pub fn from_intervals<I, S>(intervals: I) -> Self
    where
        I: IntoIterator<Item = (S, u64, u64)>,
        S: Into<String>,
    {
        let mut by_chromosome: HashMap<String, Vec<(u64, u64)>> = HashMap::new();
        for (chromosome, start, end) in intervals {
            by_chromosome
                .entry(chromosome.into())
                .or_default()
                .push((start, end));
        }

        for intervals in by_chromosome.values_mut() {
            intervals.sort_unstable();
            let mut merged: Vec<(u64, u64)> = Vec::with_capacity(intervals.len());
            for &(start, end) in intervals.iter() {
                match merged.last_mut() {
                    Some(last) if start <= last.1 => last.1 = last.1.max(end),
                    _ => merged.push((start, end)),
                }
            }
            *intervals = merged;
        }

        Self { by_chromosome }
    }

    /// All intervals on a chromosome, sorted and non-overlapping
    #[must_use]
    pub fn intervals(&self, chromosome: &str) -> &[(u64, u64)] {
        self.by_chromosome
            .get(chromosome)
            .map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn contains(&self, chromosome: &str, position: u64) -> bool {
        let intervals = self.intervals(chromosome);
        let index = intervals.partition_point(|&(_, end)| end < position);
        intervals
            .get(index)
            .is_some_and(|&(start, _)| start <= position)
    }

    /// Intervals overlapping `[start, end]`, clipped to it
    #[must_use]
    pub fn overlapping(&self, chromosome: &str, start: u64, end: u64) -> Vec<(u64, u64)> {
        let intervals = self.intervals(chromosome);
        let first = intervals.partition_point(|&(_, e)| e < start);
        intervals[first..]
            .iter()
            .take_while(|&&(s, _)| s <= end)
            .map(|&(s, e)| (s.max(start), e.min(end)))
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_chromosome.values().all(Vec::is_empty)
    }
}

/// Load a BED file (optionally gzipped)
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read or `ParseError::InvalidFormat` for lines
/// with missing or non-numeric coordinates.
pub fn load_bed_file(path: &Path) -> Result<IntervalIndex, ParseError> {
    parse_bed(open_text(path)?)
}

/// Parse BED content from a reader
///
/// # Errors
///
/// Returns `ParseError::InvalidFormat` for malformed lines.
pub fn parse_bed<R: BufRead>(reader: R) -> Result<IntervalIndex, ParseError> {
    let mut intervals = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty()
            || line.starts_with('#')
            || line.starts_with("track")
            || line.starts_with("browser")
        {
            continue;
        }

        // Line numbers in errors are 1-based for user friendliness
        let line_num = i + 1;
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 3 {
            return Err(ParseError::InvalidFormat(format!(
                "BED line {line_num} has fewer than 3 fields"
            )));
        }

        let start: u64 = fields[1].trim().parse().map_err(|_| {
            ParseError::InvalidFormat(format!(
                "Invalid start on BED line {line_num}: '{}'",
                fields[1]
            ))
        })?;
        let end: u64 = fields[2].trim().parse().map_err(|_| {
            ParseError::InvalidFormat(format!(
                "Invalid end on BED line {line_num}: '{}'",
                fields[2]
            ))
        })?;
        if end <= start {
            return Err(ParseError::InvalidFormat(format!(
                "Empty interval on BED line {line_num}: {start}-{end}"
            )));
        }

        intervals.push((fields[0].to_string(), start + 1, end));
    }

    Ok(IntervalIndex::from_intervals(intervals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_bed_converts_and_merges() {
        let bed = "track name=panel\n\
# comment\n\
chr1\t99\t200\tgeneA\n\
chr1\t150\t300\n\
chr1\t1000\t1001\n\
chr2\t0\t10\n";
        let index = parse_bed(Cursor::new(bed)).unwrap();

        assert_eq!(index.intervals("chr1"), &[(100, 300), (1001, 1001)]);
        assert_eq!(index.intervals("chr2"), &[(1, 10)]);
        assert!(index.intervals("chr3").is_empty());
    }

    #[test]
    fn test_contains() {
        let index = IntervalIndex::from_intervals(vec![("chr1", 100, 200), ("chr1", 300, 400)]);
        assert!(index.contains("chr1", 100));
        assert!(index.contains("chr1", 200));
        assert!(!index.contains("chr1", 250));
        assert!(index.contains("chr1", 400));
        assert!(!index.contains("chr1", 401));
        assert!(!index.contains("chr2", 150));
    }

    #[test]
    fn test_overlapping_clips() {
        let index = IntervalIndex::from_intervals(vec![
            ("chr1", 100, 200),
            ("chr1", 300, 400),
            ("chr1", 500, 600),
        ]);
        assert_eq!(
            index.overlapping("chr1", 150, 350),
            vec![(150, 200), (300, 350)]
        );
        assert!(index.overlapping("chr1", 201, 299).is_empty());
    }

    #[test]
    fn test_parse_bed_errors() {
        assert!(parse_bed(Cursor::new("chr1\t10\n")).is_err());
        assert!(parse_bed(Cursor::new("chr1\tx\t20\n")).is_err());
        assert!(parse_bed(Cursor::new("chr1\t20\t20\n")).is_err());
    }
}
