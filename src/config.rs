//! Pipeline configuration.
//!
//! [`PipelineConfig`] carries every tunable the pipeline consumes. All fields have defaults, so a
//! JSON config file only needs the values it overrides:
//!
//! ```json
//! {
//!   "threads": 8,
//!   "samples": [
//!     { "name": "TUMOR", "path": "tumor.bam", "role": "tumor" },
//!     { "name": "NORMAL", "path": "normal.bam", "role": "reference" }
//!   ],
//!   "filter": { "standard": { "min_alt_quality": 80.0 } }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::evidence::ReadSupportCounter;
use crate::core::types::{SampleRole, Tier};

/// Highest base or mapping quality accepted in thresholds
pub const MAX_QUALITY: u8 = 93;

pub const DEFAULT_MAX_SLICE_SIZE: u64 = 100_000;
pub const DEFAULT_MIN_MAPPING_QUALITY: u8 = 10;
pub const DEFAULT_MIN_BASE_QUALITY: u8 = 13;
pub const DEFAULT_MAX_READ_DEPTH: u32 = 1_000;
pub const DEFAULT_MAX_MNV_LENGTH: usize = 3;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter { parameter: String, reason: String },

    #[error("No tumor samples configured")]
    NoTumorSamples,

    #[error("Sample '{0}' is configured more than once")]
    DuplicateSample(String),
}

impl ConfigError {
    fn invalid(parameter: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }
}

/// One sample and the alignment file holding its reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSpec {
    pub name: String,
    pub path: PathBuf,
    pub role: SampleRole,
}

impl SampleSpec {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, role: SampleRole) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            role,
        }
    }
}

/// Minimum combined tumor support a candidate needs to survive filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceThresholds {
    pub min_alt_support: u32,
    pub min_alt_quality: f64,
    pub min_alt_fragments: u32,
}

impl EvidenceThresholds {
    #[must_use]
    pub fn standard() -> Self {
        Self {
            min_alt_support: 2,
            min_alt_quality: 50.0,
            min_alt_fragments: 2,
        }
    }

    #[must_use]
    pub fn hotspot() -> Self {
        Self {
            min_alt_support: 1,
            min_alt_quality: 0.0,
            min_alt_fragments: 1,
        }
    }

    /// True if combined tumor support meets every threshold
    #[must_use]
    pub fn accepts(&self, counter: &ReadSupportCounter) -> bool {
        counter.alt_support >= self.min_alt_support
            && counter.alt_quality >= self.min_alt_quality
            && counter.alt_fragments >= self.min_alt_fragments
    }
}

impl Default for EvidenceThresholds {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub standard: EvidenceThresholds,
    pub hotspot: EvidenceThresholds,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            standard: EvidenceThresholds::standard(),
            hotspot: EvidenceThresholds::hotspot(),
        }
    }
}

impl FilterConfig {
    #[must_use]
    pub fn for_tier(&self, tier: Tier) -> &EvidenceThresholds {
        match tier {
            Tier::Hotspot => &self.hotspot,
            Tier::Panel | Tier::HighConfidence | Tier::LowConfidence => &self.standard,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhasingConfig {
    pub enabled: bool,
    /// Alt-supporting tumor fragments two adjacent variants must share to be phased
    pub min_shared_fragments: u32,
}

impl Default for PhasingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_shared_fragments: 2,
        }
    }
}

/// Configuration for a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub threads: usize,
    pub max_slice_size: u64,
    pub min_mapping_quality: u8,
    pub min_base_quality: u8,
    /// Classified reads per locus and sample after which further reads are ignored
    pub max_read_depth: u32,
    pub max_mnv_length: usize,
    /// Reference bases around a substitution within which a read's indel makes it ambiguous
    pub indel_boundary_distance: u64,
    pub filter: FilterConfig,
    pub phasing: PhasingConfig,
    pub samples: Vec<SampleSpec>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            max_slice_size: DEFAULT_MAX_SLICE_SIZE,
            min_mapping_quality: DEFAULT_MIN_MAPPING_QUALITY,
            min_base_quality: DEFAULT_MIN_BASE_QUALITY,
            max_read_depth: DEFAULT_MAX_READ_DEPTH,
            max_mnv_length: DEFAULT_MAX_MNV_LENGTH,
            indel_boundary_distance: 1,
            filter: FilterConfig::default(),
            phasing: PhasingConfig::default(),
            samples: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Load a config from a JSON file; missing fields take their defaults
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Read` if the file cannot be read or `ConfigError::Parse` if it is not
    /// valid JSON for this structure.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Parse` if the text is not valid JSON for this structure.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn tumor_samples(&self) -> impl Iterator<Item = &SampleSpec> {
        self.samples.iter().filter(|s| s.role == SampleRole::Tumor)
    }

    pub fn reference_samples(&self) -> impl Iterator<Item = &SampleSpec> {
        self.samples
            .iter()
            .filter(|s| s.role == SampleRole::Reference)
    }

    /// Check the configuration before any work starts
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` describing the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::invalid("threads", "must be >= 1"));
        }
        if self.max_slice_size == 0 {
            return Err(ConfigError::invalid("max_slice_size", "must be >= 1"));
        }
        if self.min_mapping_quality > MAX_QUALITY {
            return Err(ConfigError::invalid(
                "min_mapping_quality",
                format!("must be <= {MAX_QUALITY}"),
            ));
        }
        if self.min_base_quality > MAX_QUALITY {
            return Err(ConfigError::invalid(
                "min_base_quality",
                format!("must be <= {MAX_QUALITY}"),
            ));
        }
        if self.max_read_depth == 0 {
            return Err(ConfigError::invalid("max_read_depth", "must be >= 1"));
        }
        if self.max_mnv_length == 0 {
            return Err(ConfigError::invalid("max_mnv_length", "must be >= 1"));
        }
        for (name, thresholds) in [
            ("filter.standard", &self.filter.standard),
            ("filter.hotspot", &self.filter.hotspot),
        ] {
            if !thresholds.min_alt_quality.is_finite() || thresholds.min_alt_quality < 0.0 {
                return Err(ConfigError::invalid(
                    name,
                    "min_alt_quality must be a non-negative number",
                ));
            }
        }

        if self.tumor_samples().next().is_none() {
            return Err(ConfigError::NoTumorSamples);
        }

        let mut seen = HashSet::new();
        for sample in &self.samples {
            if sample.name.trim().is_empty() {
                return Err(ConfigError::invalid("samples", "sample names must not be empty"));
            }
            if !seen.insert(sample.name.as_str()) {
                return Err(ConfigError::DuplicateSample(sample.name.clone()));
            }
        }

        Ok(())
    }
}
