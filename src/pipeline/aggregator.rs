//! Ordered collection of region results.
//!
//! Workers submit [`RegionBatch`]es in whatever order they finish. The aggregator buffers them by
//! task ordinal and, on every submission, releases the longest contiguous run starting at the
//! next expected ordinal. Released batches get their phase set ids and are written to the sink.
//!
//! The state lock guards the reorder buffer, the running totals and a FIFO of drained runs that
//! still have to be written. At most one submitter at a time acts as the writer: it takes the
//! pending runs, releases the state lock, writes them and repeats until the FIFO is empty. Other
//! submitters only append to the FIFO and return, so nobody holds or waits on the state lock
//! while the sink is doing I/O, and runs reach the sink in the order they were drained.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::core::types::Region;
use crate::core::variant::CalledVariant;
use crate::pipeline::phasing::{mint_phase_sets, PhaseSetCounter};
use crate::pipeline::reorder::ReorderBuffer;
use crate::pipeline::sink::VariantSink;
use crate::pipeline::PipelineError;

/// Everything one region produced
#[derive(Debug, Clone, PartialEq)]
pub struct RegionBatch {
    pub ordinal: u64,
    pub region: Region,
    /// Called variants in position order
    pub variants: Vec<CalledVariant>,
    pub reads_processed: u64,
    pub candidates: u64,
}

/// Running totals across the regions received so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    pub regions: u64,
    pub reads_processed: u64,
    pub candidates: u64,
    pub variants: u64,
}

struct AggregatorState {
    buffer: ReorderBuffer<RegionBatch>,
    totals: RunTotals,
    /// Drained runs not yet handed to the sink
    pending: VecDeque<Vec<CalledVariant>>,
    /// Set while some submitter is writing `pending` to the sink
    writing: bool,
}

pub struct ResultAggregator<'a> {
    state: Mutex<AggregatorState>,
    sink: Mutex<&'a mut dyn VariantSink>,
    phase_sets: &'a PhaseSetCounter,
}

impl<'a> ResultAggregator<'a> {
    pub fn new(sink: &'a mut dyn VariantSink, phase_sets: &'a PhaseSetCounter) -> Self {
        Self {
            state: Mutex::new(AggregatorState {
                buffer: ReorderBuffer::new(),
                totals: RunTotals::default(),
                pending: VecDeque::new(),
                writing: false,
            }),
            sink: Mutex::new(sink),
            phase_sets,
        }
    }

    /// Accept a finished region and write out whatever is now in order
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::DuplicateTask` if the ordinal was already submitted, or
    /// `PipelineError::Sink` if writing fails.
    pub fn submit(&self, batch: RegionBatch) -> Result<(), PipelineError> {
        let mut state = self.state.lock();

        let ordinal = batch.ordinal;
        let reads = batch.reads_processed;
        let candidates = batch.candidates;
        if !state.buffer.insert(ordinal, batch) {
            return Err(PipelineError::DuplicateTask(ordinal));
        }
        state.totals.regions += 1;
        state.totals.reads_processed += reads;
        state.totals.candidates += candidates;

        let mut ready = Vec::new();
        let mut released = 0usize;
        for mut batch in state.buffer.drain_ready() {
            mint_phase_sets(&mut batch.variants, self.phase_sets);
            ready.append(&mut batch.variants);
            released += 1;
        }
        if released == 0 {
            debug!(ordinal, "Buffered out-of-order region");
            return Ok(());
        }
        state.totals.variants += ready.len() as u64;

        state.pending.push_back(ready);
        if state.writing {
            debug!(ordinal, regions = released, "Queued ordered regions behind active writer");
            return Ok(());
        }
        state.writing = true;
        drop(state);

        self.write_pending()
    }

    /// Write queued runs until none are left; only the submitter that set `writing` calls this
    fn write_pending(&self) -> Result<(), PipelineError> {
        loop {
            let runs = {
                let mut state = self.state.lock();
                if state.pending.is_empty() {
                    state.writing = false;
                    return Ok(());
                }
                std::mem::take(&mut state.pending)
            };

            let mut sink = self.sink.lock();
            for run in runs {
                debug!(variants = run.len(), "Flushing ordered regions");
                if let Err(e) = sink.write_batch(&run) {
                    self.state.lock().writing = false;
                    return Err(e.into());
                }
            }
        }
    }

    /// Snapshot of the running totals
    #[must_use]
    pub fn totals(&self) -> RunTotals {
        self.state.lock().totals
    }

    /// Confirm that every expected region was received and written
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::IncompleteRun` if any region is missing.
    pub fn finish(self, expected_regions: u64) -> Result<RunTotals, PipelineError> {
        let state = self.state.into_inner();
        if state.buffer.next_seq() != expected_regions
            || !state.buffer.is_empty()
            || !state.pending.is_empty()
        {
            return Err(PipelineError::IncompleteRun {
                expected: expected_regions,
                received: state.totals.regions,
            });
        }
        Ok(state.totals)
    }
}
