//! Region-parallel execution of the evidence pipeline.
//!
//! - [`scheduler::ChromosomeDriver`] partitions a chromosome, fills the shared task queue and runs
//!   a pool of worker threads over it
//! - [`worker::RegionWorker`] takes one region from candidate detection to called variants
//! - [`aggregator::ResultAggregator`] restores region order and writes to a
//!   [`sink::VariantSink`]
//!
//! Any error while processing a region aborts the whole chromosome; workers stop pulling new
//! tasks and the error is returned to the caller, which must not finalize its output.

pub mod aggregator;
pub mod phasing;
pub mod reorder;
pub mod scheduler;
pub mod sink;
pub mod worker;

use thiserror::Error;

use crate::config::ConfigError;
use crate::core::types::Region;
use crate::partition::PartitionError;
use crate::source::ReadSourceError;

pub use aggregator::{RegionBatch, ResultAggregator, RunTotals};
pub use phasing::{NoPhasing, PhaseSetCounter, PhasingRule, SharedFragmentPhasing};
pub use scheduler::{ChromosomeDriver, RunSummary};
pub use sink::{CollectingSink, OutputFormat, SinkError, VariantSink};
pub use worker::{RegionContext, RegionWorker, WorkerState};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid partitioning: {0}")]
    Partition(#[from] PartitionError),

    #[error("Worker {worker} failed to open sample '{sample}': {source}")]
    OpenSample {
        worker: usize,
        sample: String,
        #[source]
        source: ReadSourceError,
    },

    #[error("Failed processing region {region} (task {ordinal}): {source}")]
    Region {
        ordinal: u64,
        region: Region,
        #[source]
        source: ReadSourceError,
    },

    #[error("Region {region} extends past the end of {chromosome} ({length} bases)")]
    RegionOutOfBounds {
        region: Region,
        chromosome: String,
        length: u64,
    },

    #[error("Failed to write variants: {0}")]
    Sink(#[from] SinkError),

    #[error("Region task {0} was submitted more than once")]
    DuplicateTask(u64),

    #[error("Only {received} of {expected} regions completed")]
    IncompleteRun { expected: u64, received: u64 },

    #[error("A worker thread panicked")]
    WorkerPanicked,
}
