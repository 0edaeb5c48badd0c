//! Processing of a single region.
//!
//! A [`RegionWorker`] belongs to one pool thread. It opens its own read handle for every
//! configured sample when it is created and reuses them for every region it takes from the queue.
//! Each region runs through the same sequence of [`WorkerState`]s:
//!
//! | State | Work |
//! |-------|------|
//! | `DetectingCandidates` | fetch tumor reads, find candidate alleles |
//! | `AccumulatingTumorEvidence` | count tumor support for every candidate |
//! | `FilteringCandidates` | drop candidates below their tier's thresholds |
//! | `AccumulatingReferenceEvidence` | count reference-sample support for survivors only |
//! | `MergingResults` | build called variants and local phase groups |
//!
//! Reference samples are not read at all when no candidate survives filtering.

use std::collections::BTreeSet;
use std::fmt;

use tracing::debug;

use crate::candidate::detector::DetectorSettings;
use crate::candidate::{CandidateDetector, TargetAnnotations};
use crate::config::{PipelineConfig, SampleSpec};
use crate::core::candidate::CandidateLocus;
use crate::core::evidence::{ReadSupportCounter, SampleEvidenceSet};
use crate::core::read::AlignedRead;
use crate::core::sequence::ChromosomeSequence;
use crate::core::types::{PartitionTask, SampleRole};
use crate::core::variant::{CalledVariant, SampleSupport};
use crate::evidence::{AccumulatorSettings, EvidenceAccumulator, QualityRecalibration};
use crate::pipeline::aggregator::RegionBatch;
use crate::pipeline::phasing::{assign_local_groups, PhasingRule};
use crate::pipeline::PipelineError;
use crate::source::{ReadSource, ReadSourceError, ReadSourceFactory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    DetectingCandidates,
    AccumulatingTumorEvidence,
    FilteringCandidates,
    AccumulatingReferenceEvidence,
    MergingResults,
    Done,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::DetectingCandidates => "detecting-candidates",
            Self::AccumulatingTumorEvidence => "accumulating-tumor-evidence",
            Self::FilteringCandidates => "filtering-candidates",
            Self::AccumulatingReferenceEvidence => "accumulating-reference-evidence",
            Self::MergingResults => "merging-results",
            Self::Done => "done",
        };
        write!(f, "{name}")
    }
}

/// Read-only inputs shared by every worker processing one chromosome
#[derive(Clone, Copy)]
pub struct RegionContext<'a> {
    pub config: &'a PipelineConfig,
    pub reference: &'a ChromosomeSequence,
    pub annotations: &'a TargetAnnotations,
    pub recalibration: &'a dyn QualityRecalibration,
    pub phasing: &'a dyn PhasingRule,
}

/// Per-sample evidence for one region after filtering
pub(crate) struct RegionEvidence {
    pub candidates: usize,
    /// Candidates that passed the tumor thresholds, in key order
    pub survivors: Vec<CandidateLocus>,
    pub tumor: Vec<SampleEvidenceSet>,
    /// Empty when nothing survived; otherwise one set per reference sample, over survivors only
    pub reference: Vec<SampleEvidenceSet>,
    pub reads_processed: usize,
}

struct SampleHandle {
    spec: SampleSpec,
    source: Box<dyn ReadSource>,
}

impl SampleHandle {
    fn name(&self) -> &str {
        &self.spec.name
    }
}

pub struct RegionWorker<'a> {
    id: usize,
    context: RegionContext<'a>,
    tumors: Vec<SampleHandle>,
    references: Vec<SampleHandle>,
    state: WorkerState,
}

impl<'a> RegionWorker<'a> {
    /// Create a worker with its own read handle for every configured sample
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::OpenSample` if any sample's alignments cannot be opened.
    pub fn open(
        id: usize,
        context: RegionContext<'a>,
        factory: &dyn ReadSourceFactory,
    ) -> Result<Self, PipelineError> {
        let open = |spec: &SampleSpec| -> Result<SampleHandle, PipelineError> {
            let source = factory
                .open(spec)
                .map_err(|source| PipelineError::OpenSample {
                    worker: id,
                    sample: spec.name.clone(),
                    source,
                })?;
            Ok(SampleHandle {
                spec: spec.clone(),
                source,
            })
        };

        let tumors = context
            .config
            .tumor_samples()
            .map(open)
            .collect::<Result<Vec<_>, _>>()?;
        let references = context
            .config
            .reference_samples()
            .map(open)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            worker = id,
            tumor_samples = tumors.len(),
            reference_samples = references.len(),
            "Opened sample handles"
        );

        Ok(Self {
            id,
            context,
            tumors,
            references,
            state: WorkerState::Idle,
        })
    }

    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Run one region from candidate detection through merged results
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Region` if reads for any sample cannot be fetched.
    pub fn process(&mut self, task: &PartitionTask) -> Result<RegionBatch, PipelineError> {
        let ctx = self.context;
        let region = &task.region;
        let evidence = self.gather_evidence(task)?;

        self.transition(task, WorkerState::MergingResults);
        let mut variants = Vec::with_capacity(evidence.survivors.len());
        let mut alt_fragments = Vec::with_capacity(evidence.survivors.len());
        for locus in &evidence.survivors {
            let mut samples = Vec::with_capacity(evidence.tumor.len() + evidence.reference.len());
            let mut fragments = BTreeSet::new();
            for set in evidence.tumor.iter().chain(&evidence.reference) {
                let found = set.get(&locus.key);
                if set.role == SampleRole::Tumor {
                    if let Some(found) = found {
                        fragments.extend(found.alt_fragment_names.iter().cloned());
                    }
                }
                samples.push(SampleSupport {
                    sample: set.sample.clone(),
                    role: set.role,
                    counter: found.map(|e| e.counter.clone()).unwrap_or_default(),
                });
            }
            variants.push(CalledVariant::new(locus.clone(), samples));
            alt_fragments.push(fragments);
        }
        assign_local_groups(ctx.phasing, &mut variants, &alt_fragments);

        self.transition(task, WorkerState::Done);
        debug!(
            worker = self.id,
            ordinal = task.ordinal,
            region = %region,
            reads = evidence.reads_processed,
            candidates = evidence.candidates,
            variants = variants.len(),
            "Finished region"
        );

        Ok(RegionBatch {
            ordinal: task.ordinal,
            region: region.clone(),
            variants,
            reads_processed: evidence.reads_processed as u64,
            candidates: evidence.candidates as u64,
        })
    }

    /// Detection, both evidence passes and filtering; stops before results are merged
    pub(crate) fn gather_evidence(
        &mut self,
        task: &PartitionTask,
    ) -> Result<RegionEvidence, PipelineError> {
        let ctx = self.context;
        let region = &task.region;
        let failed = |source: ReadSourceError| PipelineError::Region {
            ordinal: task.ordinal,
            region: region.clone(),
            source,
        };

        self.transition(task, WorkerState::DetectingCandidates);
        let mut tumor_reads: Vec<Vec<AlignedRead>> = Vec::with_capacity(self.tumors.len());
        for handle in &mut self.tumors {
            tumor_reads.push(handle.source.fetch(region).map_err(failed)?);
        }
        let mut reads_processed: usize = tumor_reads.iter().map(Vec::len).sum();

        let detector =
            CandidateDetector::new(ctx.reference, ctx.annotations, DetectorSettings::from(ctx.config));
        let by_sample: Vec<(&str, &[AlignedRead])> = self
            .tumors
            .iter()
            .zip(&tumor_reads)
            .map(|(handle, reads)| (handle.name(), reads.as_slice()))
            .collect();
        let candidates = detector.detect(region, &by_sample);
        drop(by_sample);

        self.transition(task, WorkerState::AccumulatingTumorEvidence);
        let accumulator = EvidenceAccumulator::new(
            ctx.reference,
            ctx.recalibration,
            AccumulatorSettings::from(ctx.config),
        );
        let tumor: Vec<SampleEvidenceSet> = self
            .tumors
            .iter()
            .zip(&tumor_reads)
            .map(|(handle, reads)| {
                accumulator.accumulate(handle.name(), SampleRole::Tumor, candidates.keys(), reads)
            })
            .collect();
        drop(tumor_reads);

        self.transition(task, WorkerState::FilteringCandidates);
        let survivors: Vec<CandidateLocus> = candidates
            .values()
            .filter(|locus| {
                let combined = combined_support(&tumor, locus);
                ctx.config.filter.for_tier(locus.tier).accepts(&combined)
            })
            .cloned()
            .collect();

        self.transition(task, WorkerState::AccumulatingReferenceEvidence);
        let mut reference: Vec<SampleEvidenceSet> = Vec::with_capacity(self.references.len());
        if !survivors.is_empty() {
            for handle in &mut self.references {
                let reads = handle.source.fetch(region).map_err(failed)?;
                reads_processed += reads.len();
                reference.push(accumulator.accumulate(
                    &handle.spec.name,
                    SampleRole::Reference,
                    survivors.iter().map(|locus| &locus.key),
                    &reads,
                ));
            }
        }

        Ok(RegionEvidence {
            candidates: candidates.len(),
            survivors,
            tumor,
            reference,
            reads_processed,
        })
    }

    fn transition(&mut self, task: &PartitionTask, next: WorkerState) {
        debug!(
            worker = self.id,
            ordinal = task.ordinal,
            from = %self.state,
            to = %next,
            "Worker state change"
        );
        self.state = next;
    }
}

fn combined_support(sets: &[SampleEvidenceSet], locus: &CandidateLocus) -> ReadSupportCounter {
    let mut combined = ReadSupportCounter::default();
    for counter in sets.iter().filter_map(|set| set.counter(&locus.key)) {
        combined.absorb(counter);
    }
    combined
}
