//! Chromosome-level driver.
//!
//! [`ChromosomeDriver`] plans the regions of one chromosome, pushes them all onto a lock-free
//! queue and runs `min(threads, regions)` scoped worker threads over it. Each thread builds its
//! own [`RegionWorker`], so read handles are never shared between threads. Finished regions go to
//! a [`ResultAggregator`], which writes them to the sink in region order.
//!
//! The first error from any worker sets a shared abort flag. Workers check the flag before taking
//! a new task, so in-flight regions finish but no new ones start. The error is then returned and
//! the sink is left unfinished.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_queue::SegQueue;
use serde::Serialize;
use tracing::{debug, info};

use crate::candidate::TargetAnnotations;
use crate::config::PipelineConfig;
use crate::core::sequence::ChromosomeSequence;
use crate::core::types::{PartitionTask, Region};
use crate::evidence::{NoRecalibration, QualityRecalibration};
use crate::partition::RegionPartitioner;
use crate::pipeline::aggregator::{ResultAggregator, RunTotals};
use crate::pipeline::phasing::{rule_for, PhaseSetCounter, PhasingRule};
use crate::pipeline::sink::VariantSink;
use crate::pipeline::worker::{RegionContext, RegionWorker};
use crate::pipeline::PipelineError;
use crate::source::ReadSourceFactory;
use crate::utils::format::{format_count, format_duration};

/// Outcome of one chromosome (or sub-region) run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub chromosome: String,
    pub regions: u64,
    pub reads_processed: u64,
    pub candidates: u64,
    pub variants: u64,
    pub elapsed: Duration,
}

impl RunSummary {
    fn from_totals(chromosome: &str, totals: RunTotals, elapsed: Duration) -> Self {
        Self {
            chromosome: chromosome.to_string(),
            regions: totals.regions,
            reads_processed: totals.reads_processed,
            candidates: totals.candidates,
            variants: totals.variants,
            elapsed,
        }
    }
}

pub struct ChromosomeDriver<'a> {
    config: &'a PipelineConfig,
    factory: &'a dyn ReadSourceFactory,
    annotations: &'a TargetAnnotations,
    recalibration: &'a dyn QualityRecalibration,
    phasing: Box<dyn PhasingRule>,
    phase_sets: &'a PhaseSetCounter,
}

impl<'a> ChromosomeDriver<'a> {
    /// Driver using raw base qualities and the configured phasing rule.
    ///
    /// `phase_sets` should be shared by every chromosome of a run so phase set ids stay unique.
    #[must_use]
    pub fn new(
        config: &'a PipelineConfig,
        factory: &'a dyn ReadSourceFactory,
        annotations: &'a TargetAnnotations,
        phase_sets: &'a PhaseSetCounter,
    ) -> Self {
        Self {
            config,
            factory,
            annotations,
            recalibration: &NoRecalibration,
            phasing: rule_for(&config.phasing),
            phase_sets,
        }
    }

    #[must_use]
    pub fn with_recalibration(mut self, recalibration: &'a dyn QualityRecalibration) -> Self {
        self.recalibration = recalibration;
        self
    }

    #[must_use]
    pub fn with_phasing(mut self, phasing: Box<dyn PhasingRule>) -> Self {
        self.phasing = phasing;
        self
    }

    /// Process the whole of `reference`, writing variants to `sink` in position order.
    ///
    /// The sink is not finished; the caller does that once every chromosome has succeeded.
    ///
    /// # Errors
    ///
    /// Returns a `PipelineError` if the configuration is invalid or any region fails.
    pub fn run(
        &self,
        reference: &ChromosomeSequence,
        sink: &mut dyn VariantSink,
    ) -> Result<RunSummary, PipelineError> {
        if reference.is_empty() {
            return self.execute(reference, Vec::new(), sink);
        }
        let whole = Region::new(reference.name(), 1, reference.len());
        self.run_region(reference, &whole, sink)
    }

    /// Process one interval of `reference`
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::RegionOutOfBounds` if the interval is not on `reference`, or any
    /// error from [`ChromosomeDriver::run`].
    pub fn run_region(
        &self,
        reference: &ChromosomeSequence,
        region: &Region,
        sink: &mut dyn VariantSink,
    ) -> Result<RunSummary, PipelineError> {
        self.config.validate()?;

        if region.chromosome != reference.name()
            || region.start == 0
            || region.end < region.start
            || region.end > reference.len()
        {
            return Err(PipelineError::RegionOutOfBounds {
                region: region.clone(),
                chromosome: reference.name().to_string(),
                length: reference.len(),
            });
        }

        let tasks = self.plan(region)?;
        self.execute(reference, tasks, sink)
    }

    /// Regions to process, restricted to panel targets when a panel is configured
    fn plan(&self, region: &Region) -> Result<Vec<PartitionTask>, PipelineError> {
        let partitioner = RegionPartitioner::new(self.config.threads, self.config.max_slice_size)?;
        let tasks = match &self.annotations.panel {
            Some(panel) => {
                let targets = panel.overlapping(&region.chromosome, region.start, region.end);
                partitioner.partition_targets(&region.chromosome, &targets)?
            }
            None => partitioner.partition_region(region)?,
        };
        Ok(tasks)
    }

    fn execute(
        &self,
        reference: &ChromosomeSequence,
        tasks: Vec<PartitionTask>,
        sink: &mut dyn VariantSink,
    ) -> Result<RunSummary, PipelineError> {
        let started = Instant::now();
        let chromosome = reference.name();
        let expected = tasks.len() as u64;

        if tasks.is_empty() {
            info!(chromosome, "No regions to process");
            return Ok(RunSummary::from_totals(
                chromosome,
                RunTotals::default(),
                started.elapsed(),
            ));
        }

        let workers = self.config.threads.min(tasks.len());
        info!(
            chromosome,
            regions = expected,
            workers,
            "Processing chromosome"
        );

        let queue = SegQueue::new();
        for task in tasks {
            queue.push(task);
        }

        let context = RegionContext {
            config: self.config,
            reference,
            annotations: self.annotations,
            recalibration: self.recalibration,
            phasing: self.phasing.as_ref(),
        };
        let abort = AtomicBool::new(false);
        let aggregator = ResultAggregator::new(sink, self.phase_sets);

        let results: Vec<Result<usize, PipelineError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|id| {
                    let queue = &queue;
                    let abort = &abort;
                    let aggregator = &aggregator;
                    let factory = self.factory;
                    scope.spawn(move || {
                        let result = drain_queue(id, context, factory, queue, aggregator, abort);
                        if result.is_err() {
                            abort.store(true, Ordering::SeqCst);
                        }
                        result
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or(Err(PipelineError::WorkerPanicked)))
                .collect()
        });

        let mut first_error = None;
        for result in results {
            match result {
                Ok(processed) => debug!(processed, "Worker finished"),
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(e) => debug!(error = %e, "Additional worker failure"),
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let totals = aggregator.finish(expected)?;
        let summary = RunSummary::from_totals(chromosome, totals, started.elapsed());
        info!(
            chromosome,
            regions = %format_count(summary.regions),
            reads = %format_count(summary.reads_processed),
            candidates = %format_count(summary.candidates),
            variants = %format_count(summary.variants),
            elapsed = %format_duration(summary.elapsed),
            "Finished chromosome"
        );
        Ok(summary)
    }
}

/// One pool thread: take tasks until the queue is empty or the run is aborted
fn drain_queue(
    id: usize,
    context: RegionContext<'_>,
    factory: &dyn ReadSourceFactory,
    queue: &SegQueue<PartitionTask>,
    aggregator: &ResultAggregator<'_>,
    abort: &AtomicBool,
) -> Result<usize, PipelineError> {
    let mut worker = RegionWorker::open(id, context, factory)?;
    let mut processed = 0usize;

    while !abort.load(Ordering::SeqCst) {
        let Some(task) = queue.pop() else {
            break;
        };
        let batch = worker.process(&task)?;
        aggregator.submit(batch)?;
        processed += 1;
    }

    Ok(processed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SampleSpec;
    use crate::core::read::{AlignedRead, CigarOp};
    use crate::core::types::SampleRole;
    use crate::parsing::bed::IntervalIndex;
    use crate::pipeline::phasing::NoPhasing;
    use crate::pipeline::sink::CollectingSink;
    use crate::source::InMemoryReadSourceFactory;

    fn config(threads: usize) -> PipelineConfig {
        PipelineConfig {
            threads,
            max_slice_size: 10,
            samples: vec![SampleSpec::new("TUMOR", "t.bam", SampleRole::Tumor)],
            ..Default::default()
        }
    }

    fn reference() -> ChromosomeSequence {
        ChromosomeSequence::new("chr1", "ACGT".repeat(25))
    }

    #[test]
    fn test_empty_sample_covers_every_region() {
        let config = config(3);
        let annotations = TargetAnnotations::default();
        let counter = PhaseSetCounter::new();
        let factory = InMemoryReadSourceFactory::new().with_sample("TUMOR", Vec::new());
        let driver = ChromosomeDriver::new(&config, &factory, &annotations, &counter);

        let mut sink = CollectingSink::new();
        let summary = driver.run(&reference(), &mut sink).unwrap();
        assert_eq!(summary.chromosome, "chr1");
        assert_eq!(summary.regions, 10);
        assert_eq!(summary.variants, 0);
        assert_eq!(factory.opened(), 3);
        assert!(!sink.is_finished());
    }

    #[test]
    fn test_region_out_of_bounds() {
        let config = config(1);
        let annotations = TargetAnnotations::default();
        let counter = PhaseSetCounter::new();
        let factory = InMemoryReadSourceFactory::new().with_sample("TUMOR", Vec::new());
        let driver = ChromosomeDriver::new(&config, &factory, &annotations, &counter);

        let mut sink = CollectingSink::new();
        for region in [Region::new("chr1", 50, 101), Region::new("chr2", 1, 10)] {
            assert!(matches!(
                driver.run_region(&reference(), &region, &mut sink),
                Err(PipelineError::RegionOutOfBounds { length: 100, .. })
            ));
        }
    }

    #[test]
    fn test_panel_restricts_regions() {
        let config = config(2);
        let annotations = TargetAnnotations {
            panel: Some(IntervalIndex::from_intervals([("chr1", 21, 25), ("chr1", 61, 70)])),
            ..Default::default()
        };
        let counter = PhaseSetCounter::new();
        let cigar = CigarOp::parse_all("4M").unwrap();
        let read = AlignedRead::new("r1", 61, cigar, b"ACGT".to_vec(), vec![30; 4]);
        let factory = InMemoryReadSourceFactory::new().with_sample("TUMOR", vec![read]);
        let driver = ChromosomeDriver::new(&config, &factory, &annotations, &counter);

        let mut sink = CollectingSink::new();
        let summary = driver.run(&reference(), &mut sink).unwrap();
        assert_eq!(summary.regions, 2);
        assert_eq!(summary.reads_processed, 1);
    }

    #[test]
    fn test_phasing_rule_override() {
        let config = config(2);
        let annotations = TargetAnnotations::default();
        let reads = || {
            let bases = b"GTACTTACCT".to_vec();
            let cigar = CigarOp::parse_all("10M").unwrap();
            vec![
                AlignedRead::new("t1", 11, cigar.clone(), bases.clone(), vec![30; 10]),
                AlignedRead::new("t2", 11, cigar, bases, vec![30; 10]),
            ]
        };

        let counter = PhaseSetCounter::new();
        let factory = InMemoryReadSourceFactory::new().with_sample("TUMOR", reads());
        let driver = ChromosomeDriver::new(&config, &factory, &annotations, &counter);
        let mut sink = CollectingSink::new();
        driver.run(&reference(), &mut sink).unwrap();
        let phase_sets: Vec<_> = sink.variants().iter().map(|v| v.phase_set).collect();
        assert_eq!(phase_sets, vec![Some(1), Some(1)]);

        let counter = PhaseSetCounter::new();
        let factory = InMemoryReadSourceFactory::new().with_sample("TUMOR", reads());
        let driver = ChromosomeDriver::new(&config, &factory, &annotations, &counter)
            .with_phasing(Box::new(NoPhasing));
        let mut sink = CollectingSink::new();
        driver.run(&reference(), &mut sink).unwrap();
        assert_eq!(sink.variants().len(), 2);
        assert!(sink.variants().iter().all(|v| v.phase_set.is_none()));
    }

    #[test]
    fn test_invalid_config_rejected_before_work() {
        let config = PipelineConfig::default();
        let annotations = TargetAnnotations::default();
        let counter = PhaseSetCounter::new();
        let factory = InMemoryReadSourceFactory::new();
        let driver = ChromosomeDriver::new(&config, &factory, &annotations, &counter);

        let mut sink = CollectingSink::new();
        assert!(matches!(
            driver.run(&reference(), &mut sink),
            Err(PipelineError::Config(_))
        ));
        assert_eq!(factory.opened(), 0);
    }
}
