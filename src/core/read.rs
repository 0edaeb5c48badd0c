//! Aligned read representation shared by candidate detection and evidence accumulation.
//!
//! Reads are decoded from the alignment source into [`AlignedRead`], which keeps only what the
//! pipeline needs: name, flags, mapping quality, 1-based alignment start, CIGAR, bases and
//! base qualities. Positional queries walk the CIGAR; nothing here touches the reference.

use serde::{Deserialize, Serialize};

/// CIGAR operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CigarKind {
    Match,
    Insertion,
    Deletion,
    Skip,
    SoftClip,
    HardClip,
    Pad,
    SequenceMatch,
    SequenceMismatch,
}

impl CigarKind {
    #[must_use]
    pub fn consumes_reference(self) -> bool {
        matches!(
            self,
            Self::Match | Self::Deletion | Self::Skip | Self::SequenceMatch | Self::SequenceMismatch
        )
    }

    #[must_use]
    pub fn consumes_read(self) -> bool {
        matches!(
            self,
            Self::Match
                | Self::Insertion
                | Self::SoftClip
                | Self::SequenceMatch
                | Self::SequenceMismatch
        )
    }

    /// True for ops that place a read base against a reference base
    #[must_use]
    pub fn is_aligned(self) -> bool {
        matches!(
            self,
            Self::Match | Self::SequenceMatch | Self::SequenceMismatch
        )
    }

    fn from_code(code: char) -> Option<Self> {
        match code {
            'M' => Some(Self::Match),
            'I' => Some(Self::Insertion),
            'D' => Some(Self::Deletion),
            'N' => Some(Self::Skip),
            'S' => Some(Self::SoftClip),
            'H' => Some(Self::HardClip),
            'P' => Some(Self::Pad),
            '=' => Some(Self::SequenceMatch),
            'X' => Some(Self::SequenceMismatch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CigarOp {
    pub kind: CigarKind,
    pub len: usize,
}

impl CigarOp {
    #[must_use]
    pub fn new(kind: CigarKind, len: usize) -> Self {
        Self { kind, len }
    }

    /// Parse a SAM CIGAR string such as `40M2I38M`.
    ///
    /// Returns `None` for malformed strings or zero-length ops.
    #[must_use]
    pub fn parse_all(text: &str) -> Option<Vec<Self>> {
        let mut ops = Vec::new();
        let mut len: usize = 0;
        let mut have_digits = false;

        for c in text.chars() {
            if let Some(digit) = c.to_digit(10) {
                len = len.checked_mul(10)?.checked_add(digit as usize)?;
                have_digits = true;
            } else {
                let kind = CigarKind::from_code(c)?;
                if !have_digits || len == 0 {
                    return None;
                }
                ops.push(Self::new(kind, len));
                len = 0;
                have_digits = false;
            }
        }

        if have_digits {
            return None;
        }
        Some(ops)
    }
}

/// SAM flags the pipeline cares about
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadFlags {
    pub unmapped: bool,
    pub secondary: bool,
    pub supplementary: bool,
    pub duplicate: bool,
    pub qc_fail: bool,
}

/// Where a reference position falls within a read's alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPosition {
    /// A read base is aligned to the position; holds the offset into the read
    Aligned(usize),
    /// The position lies inside a deletion or reference skip
    Deleted,
    /// The alignment does not span the position
    NotCovered,
}

/// A gapless run of read bases aligned against reference bases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignedBlock {
    pub ref_start: u64,
    pub read_start: usize,
    pub len: usize,
}

impl AlignedBlock {
    #[must_use]
    pub fn ref_end(&self) -> u64 {
        self.ref_start + self.len as u64 - 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndelKind {
    Insertion,
    Deletion,
}

/// An insertion or deletion in a read's alignment.
///
/// `anchor` is the reference position of the aligned base immediately preceding the event, or
/// `None` when the event is not preceded by an aligned base (e.g. directly after a soft clip).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndelEvent {
    pub kind: IndelKind,
    pub anchor: Option<u64>,
    /// Reference position right after the anchor (first deleted base for deletions)
    pub ref_start: u64,
    /// Read offset of the first inserted base, or of the base following a deletion
    pub read_offset: usize,
    pub len: usize,
}

/// A single aligned record from an alignment source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignedRead {
    pub name: Vec<u8>,
    pub flags: ReadFlags,
    pub mapping_quality: u8,
    /// 1-based position of the first reference-consuming base
    pub alignment_start: u64,
    pub cigar: Vec<CigarOp>,
    pub bases: Vec<u8>,
    pub qualities: Vec<u8>,
}

impl AlignedRead {
    pub fn new(
        name: impl Into<Vec<u8>>,
        alignment_start: u64,
        cigar: Vec<CigarOp>,
        bases: impl Into<Vec<u8>>,
        qualities: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            flags: ReadFlags::default(),
            mapping_quality: 60,
            alignment_start,
            cigar,
            bases: bases.into(),
            qualities: qualities.into(),
        }
    }

    #[must_use]
    pub fn with_mapping_quality(mut self, mapping_quality: u8) -> Self {
        self.mapping_quality = mapping_quality;
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: ReadFlags) -> Self {
        self.flags = flags;
        self
    }

    /// True if the read passes the read-level filters used by detection and evidence
    #[must_use]
    pub fn is_usable(&self, min_mapping_quality: u8) -> bool {
        let flags = &self.flags;
        !(flags.unmapped
            || flags.secondary
            || flags.supplementary
            || flags.duplicate
            || flags.qc_fail)
            && self.mapping_quality >= min_mapping_quality
            && self.is_consistent()
    }

    /// Number of reference bases spanned by the alignment
    #[must_use]
    pub fn reference_span(&self) -> u64 {
        self.cigar
            .iter()
            .filter(|op| op.kind.consumes_reference())
            .map(|op| op.len as u64)
            .sum()
    }

    /// 1-based position of the last reference-consuming base
    #[must_use]
    pub fn alignment_end(&self) -> u64 {
        (self.alignment_start + self.reference_span()).saturating_sub(1)
    }

    #[must_use]
    pub fn overlaps(&self, start: u64, end: u64) -> bool {
        self.reference_span() > 0 && self.alignment_start <= end && self.alignment_end() >= start
    }

    /// True when the CIGAR's read length agrees with the stored bases and qualities
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let read_len: usize = self
            .cigar
            .iter()
            .filter(|op| op.kind.consumes_read())
            .map(|op| op.len)
            .sum();
        read_len == self.bases.len()
            && (self.qualities.is_empty() || self.qualities.len() == self.bases.len())
    }

    /// Base quality at a read offset; reads without stored qualities report 0
    #[must_use]
    pub fn quality_at(&self, offset: usize) -> u8 {
        self.qualities.get(offset).copied().unwrap_or(0)
    }

    /// Uppercased read base at an offset
    #[must_use]
    pub fn base_at(&self, offset: usize) -> Option<u8> {
        self.bases.get(offset).map(u8::to_ascii_uppercase)
    }

    /// Gapless aligned runs, in alignment order
    #[must_use]
    pub fn aligned_blocks(&self) -> Vec<AlignedBlock> {
        let mut blocks: Vec<AlignedBlock> = Vec::new();
        let mut ref_pos = self.alignment_start;
        let mut read_pos = 0usize;

        for op in &self.cigar {
            if op.kind.is_aligned() {
                // =/X/M runs are contiguous on both sequences and merge into one block
                match blocks.last_mut() {
                    Some(last)
                        if last.ref_start + last.len as u64 == ref_pos
                            && last.read_start + last.len == read_pos =>
                    {
                        last.len += op.len;
                    }
                    _ => blocks.push(AlignedBlock {
                        ref_start: ref_pos,
                        read_start: read_pos,
                        len: op.len,
                    }),
                }
            }
            if op.kind.consumes_reference() {
                ref_pos += op.len as u64;
            }
            if op.kind.consumes_read() {
                read_pos += op.len;
            }
        }

        blocks
    }

    /// Insertions and deletions, in alignment order
    #[must_use]
    pub fn indels(&self) -> Vec<IndelEvent> {
        let mut events = Vec::new();
        let mut ref_pos = self.alignment_start;
        let mut read_pos = 0usize;
        let mut previous_aligned = false;

        for op in &self.cigar {
            let anchor = if previous_aligned {
                Some(ref_pos - 1)
            } else {
                None
            };

            match op.kind {
                CigarKind::Insertion => events.push(IndelEvent {
                    kind: IndelKind::Insertion,
                    anchor,
                    ref_start: ref_pos,
                    read_offset: read_pos,
                    len: op.len,
                }),
                CigarKind::Deletion => events.push(IndelEvent {
                    kind: IndelKind::Deletion,
                    anchor,
                    ref_start: ref_pos,
                    read_offset: read_pos,
                    len: op.len,
                }),
                _ => {}
            }

            if op.kind.consumes_reference() {
                ref_pos += op.len as u64;
            }
            if op.kind.consumes_read() {
                read_pos += op.len;
            }
            previous_aligned = op.kind.is_aligned();
        }

        events
    }

    /// Locate a 1-based reference position within the read
    #[must_use]
    pub fn position_of(&self, position: u64) -> ReadPosition {
        if position < self.alignment_start {
            return ReadPosition::NotCovered;
        }

        let mut ref_pos = self.alignment_start;
        let mut read_pos = 0usize;

        for op in &self.cigar {
            let len = op.len as u64;
            if op.kind.consumes_reference() && position < ref_pos + len {
                return if op.kind.is_aligned() {
                    ReadPosition::Aligned(read_pos + (position - ref_pos) as usize)
                } else {
                    ReadPosition::Deleted
                };
            }
            if op.kind.consumes_reference() {
                ref_pos += len;
            }
            if op.kind.consumes_read() {
                read_pos += op.len;
            }
        }

        ReadPosition::NotCovered
    }

    /// The aligned block containing a reference position, if any
    #[must_use]
    pub fn block_containing(&self, position: u64) -> Option<AlignedBlock> {
        self.aligned_blocks()
            .into_iter()
            .find(|block| position >= block.ref_start && position <= block.ref_end())
    }
}
