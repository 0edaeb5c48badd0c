use serde::{Deserialize, Serialize};

use crate::core::candidate::CandidateLocus;
use crate::core::evidence::ReadSupportCounter;
use crate::core::types::SampleRole;

/// Read support for one sample of a called variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSupport {
    pub sample: String,
    pub role: SampleRole,
    pub counter: ReadSupportCounter,
}

/// A candidate that survived tumor filtering, with evidence from every configured sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalledVariant {
    pub locus: CandidateLocus,
    /// Tumor samples first, then reference samples, each in configured order
    pub samples: Vec<SampleSupport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_set: Option<u64>,
    /// Phase group within the producing region; replaced by `phase_set` when emitted
    #[serde(skip)]
    pub(crate) local_phase_group: Option<u32>,
}

impl CalledVariant {
    #[must_use]
    pub fn new(locus: CandidateLocus, samples: Vec<SampleSupport>) -> Self {
        Self {
            locus,
            samples,
            phase_set: None,
            local_phase_group: None,
        }
    }

    #[must_use]
    pub fn chromosome(&self) -> &str {
        &self.locus.chromosome
    }

    #[must_use]
    pub fn position(&self) -> u64 {
        self.locus.key.position
    }

    #[must_use]
    pub fn sample(&self, name: &str) -> Option<&SampleSupport> {
        self.samples.iter().find(|s| s.sample == name)
    }

    /// Summed counters over samples with the given role
    #[must_use]
    pub fn combined(&self, role: SampleRole) -> ReadSupportCounter {
        let mut total = ReadSupportCounter::default();
        for support in self.samples.iter().filter(|s| s.role == role) {
            total.absorb(&support.counter);
        }
        total
    }
}
