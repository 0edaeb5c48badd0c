use serde::{Deserialize, Serialize};

/// A closed, 1-based interval on one chromosome
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Region {
    pub chromosome: String,
    pub start: u64,
    pub end: u64,
}

impl Region {
    pub fn new(chromosome: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            chromosome: chromosome.into(),
            start,
            end,
        }
    }

    /// Number of reference bases covered
    #[must_use]
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start) + 1
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    #[must_use]
    pub fn contains(&self, position: u64) -> bool {
        position >= self.start && position <= self.end
    }

    /// True if `[start, end]` shares at least one base with this region
    #[must_use]
    pub fn overlaps(&self, start: u64, end: u64) -> bool {
        start <= self.end && end >= self.start
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}-{}", self.chromosome, self.start, self.end)
    }
}

/// A region tagged with its position in the chromosome-wide processing order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionTask {
    pub ordinal: u64,
    pub region: Region,
}

impl PartitionTask {
    #[must_use]
    pub fn new(ordinal: u64, region: Region) -> Self {
        Self { ordinal, region }
    }
}

/// Role a sample plays in the two evidence passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleRole {
    /// Evidence-discovery sample: candidates come from here and are filtered on its support
    Tumor,
    /// Confirmation sample: evidence is gathered only for surviving candidates
    Reference,
}

impl std::fmt::Display for SampleRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tumor => write!(f, "tumor"),
            Self::Reference => write!(f, "reference"),
        }
    }
}

/// Confidence tier of a candidate locus, used to pick filtering thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Hotspot,
    Panel,
    HighConfidence,
    LowConfidence,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hotspot => write!(f, "HOTSPOT"),
            Self::Panel => write!(f, "PANEL"),
            Self::HighConfidence => write!(f, "HIGH_CONFIDENCE"),
            Self::LowConfidence => write!(f, "LOW_CONFIDENCE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_len_and_contains() {
        let region = Region::new("chr1", 100, 199);
        assert_eq!(region.len(), 100);
        assert!(region.contains(100));
        assert!(region.contains(199));
        assert!(!region.contains(200));
        assert!(!region.contains(99));
    }

    #[test]
    fn test_region_overlaps() {
        let region = Region::new("chr1", 100, 199);
        assert!(region.overlaps(50, 100));
        assert!(region.overlaps(199, 300));
        assert!(!region.overlaps(200, 300));
        assert!(!region.overlaps(1, 99));
    }

    #[test]
    fn test_region_display() {
        assert_eq!(Region::new("chr7", 1, 5000).to_string(), "chr7:1-5000");
    }
}
