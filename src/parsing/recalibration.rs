//! Base quality recalibration tables.
//!
//! One table per sample, tab-separated with a header line:
//!
//! ```text
//! ref  alt  trinucleotideContext  count  originalQual  recalibratedQual
//! A    C    TAC                   1520   37            31.4
//! ```
//!
//! The `count` column records how many observations backed the estimate; it is read but not used
//! in lookups.

use std::io::BufRead;
use std::path::Path;

use crate::parsing::{open_text, ParseError};

const EXPECTED_HEADER: [&str; 6] = [
    "ref",
    "alt",
    "trinucleotideContext",
    "count",
    "originalQual",
    "recalibratedQual",
];

#[derive(Debug, Clone, PartialEq)]
pub struct RecalibrationEntry {
    pub ref_base: u8,
    pub alt_base: u8,
    pub context: [u8; 3],
    pub count: u64,
    pub original_quality: u8,
    pub recalibrated_quality: f64,
}

/// Load a recalibration table file (optionally gzipped)
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read or `ParseError::InvalidFormat` if the
/// header or a row is malformed.
pub fn load_recalibration_file(path: &Path) -> Result<Vec<RecalibrationEntry>, ParseError> {
    parse_recalibration(open_text(path)?)
}

/// Parse recalibration table content from a reader
///
/// # Errors
///
/// Returns `ParseError::InvalidFormat` for a missing or unexpected header or malformed rows.
pub fn parse_recalibration<R: BufRead>(reader: R) -> Result<Vec<RecalibrationEntry>, ParseError> {
    let mut lines = reader.lines();

    let header = lines
        .next()
        .transpose()?
        .ok_or_else(|| ParseError::InvalidFormat("Empty recalibration table".to_string()))?;
    let columns: Vec<&str> = header.trim().split('\t').collect();
    if columns != EXPECTED_HEADER {
        return Err(ParseError::InvalidFormat(format!(
            "Unexpected recalibration header: '{}'",
            header.trim()
        )));
    }

    let mut entries = Vec::new();
    for (i, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        // Header is line 1
        let line_num = i + 2;
        entries.push(parse_row(line.trim(), line_num)?);
    }

    Ok(entries)
}

fn parse_row(line: &str, line_num: usize) -> Result<RecalibrationEntry, ParseError> {
    let invalid = |what: &str| {
        ParseError::InvalidFormat(format!(
            "Invalid {what} on recalibration line {line_num}: '{line}'"
        ))
    };

    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != EXPECTED_HEADER.len() {
        return Err(invalid("column count"));
    }

    let single_base = |field: &str, what: &str| match field.as_bytes() {
        [base] => Ok(base.to_ascii_uppercase()),
        _ => Err(invalid(what)),
    };
    let ref_base = single_base(fields[0], "ref base")?;
    let alt_base = single_base(fields[1], "alt base")?;

    let context: [u8; 3] = fields[2]
        .to_ascii_uppercase()
        .as_bytes()
        .try_into()
        .map_err(|_| invalid("trinucleotide context"))?;

    let count: u64 = fields[3].parse().map_err(|_| invalid("count"))?;
    let original_quality: u8 = fields[4].parse().map_err(|_| invalid("original quality"))?;
    let recalibrated_quality: f64 = fields[5]
        .parse()
        .ok()
        .filter(|q: &f64| q.is_finite() && *q >= 0.0)
        .ok_or_else(|| invalid("recalibrated quality"))?;

    Ok(RecalibrationEntry {
        ref_base,
        alt_base,
        context,
        count,
        original_quality,
        recalibrated_quality,
    })
}
