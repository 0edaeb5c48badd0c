//! Splitting a chromosome into work units for the worker pool.
//!
//! The slice size balances two pressures: enough regions for every worker to stay busy, and
//! regions small enough that a slow region does not leave the rest of the pool idle. It is
//! `total / min(threads, 4) + 1`, capped at the configured maximum. A trailing remainder shorter
//! than half a slice is folded into the previous region rather than emitted on its own.

use thiserror::Error;
use tracing::debug;

use crate::core::types::{PartitionTask, Region};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PartitionError {
    #[error("Invalid interval {chromosome}:{start}-{end}")]
    InvalidInterval {
        chromosome: String,
        start: u64,
        end: u64,
    },

    #[error("Invalid partitioning parameter '{parameter}': must be >= 1")]
    InvalidParameter { parameter: &'static str },
}

#[derive(Debug, Clone, Copy)]
pub struct RegionPartitioner {
    threads: usize,
    max_slice_size: u64,
}

impl RegionPartitioner {
    /// # Errors
    ///
    /// Returns `PartitionError::InvalidParameter` if `threads` or `max_slice_size` is zero.
    pub fn new(threads: usize, max_slice_size: u64) -> Result<Self, PartitionError> {
        if threads == 0 {
            return Err(PartitionError::InvalidParameter {
                parameter: "threads",
            });
        }
        if max_slice_size == 0 {
            return Err(PartitionError::InvalidParameter {
                parameter: "max_slice_size",
            });
        }
        Ok(Self {
            threads,
            max_slice_size,
        })
    }

    /// Effective slice size for a given amount of work
    #[must_use]
    pub fn slice_size(&self, total_length: u64) -> u64 {
        let divisor = self.threads.min(4) as u64;
        let dynamic = total_length / divisor + 1;
        dynamic.min(self.max_slice_size)
    }

    /// Partition a whole chromosome of the given length
    ///
    /// # Errors
    ///
    /// Returns `PartitionError::InvalidInterval` if `length` is zero.
    pub fn partition_chromosome(
        &self,
        chromosome: &str,
        length: u64,
    ) -> Result<Vec<PartitionTask>, PartitionError> {
        self.partition_region(&Region::new(chromosome, 1, length))
    }

    /// Partition a single interval
    ///
    /// # Errors
    ///
    /// Returns `PartitionError::InvalidInterval` if the interval is empty or starts at 0.
    pub fn partition_region(&self, region: &Region) -> Result<Vec<PartitionTask>, PartitionError> {
        validate_interval(&region.chromosome, region.start, region.end)?;

        let slice = self.slice_size(region.len());
        let mut regions = Vec::new();
        slice_interval(&region.chromosome, region.start, region.end, slice, &mut regions);

        debug!(
            region = %region,
            slice_size = slice,
            regions = regions.len(),
            "Partitioned interval"
        );

        Ok(number(regions))
    }

    /// Partition a set of target sub-ranges on one chromosome (panel mode).
    ///
    /// Targets are sorted and overlapping targets merged first. Each target is then sliced
    /// independently; targets no longer than the slice size are emitted whole.
    ///
    /// # Errors
    ///
    /// Returns `PartitionError::InvalidInterval` for any empty or zero-based target.
    pub fn partition_targets(
        &self,
        chromosome: &str,
        targets: &[(u64, u64)],
    ) -> Result<Vec<PartitionTask>, PartitionError> {
        for &(start, end) in targets {
            validate_interval(chromosome, start, end)?;
        }

        let merged = merge_intervals(targets);
        let total: u64 = merged.iter().map(|(start, end)| end - start + 1).sum();
        if merged.is_empty() {
            return Ok(Vec::new());
        }

        let slice = self.slice_size(total);
        let mut regions = Vec::new();
        for (start, end) in merged {
            slice_interval(chromosome, start, end, slice, &mut regions);
        }

        debug!(
            chromosome,
            slice_size = slice,
            regions = regions.len(),
            "Partitioned targets"
        );

        Ok(number(regions))
    }
}

fn validate_interval(chromosome: &str, start: u64, end: u64) -> Result<(), PartitionError> {
    if start == 0 || end < start {
        return Err(PartitionError::InvalidInterval {
            chromosome: chromosome.to_string(),
            start,
            end,
        });
    }
    Ok(())
}

fn slice_interval(chromosome: &str, start: u64, end: u64, slice: u64, out: &mut Vec<Region>) {
    let mut position = start;
    loop {
        let remaining = end - position + 1;
        if remaining <= slice {
            out.push(Region::new(chromosome, position, end));
            return;
        }

        let slice_end = position + slice - 1;
        let tail = end - slice_end;
        if tail * 2 < slice {
            out.push(Region::new(chromosome, position, end));
            return;
        }

        out.push(Region::new(chromosome, position, slice_end));
        position = slice_end + 1;
    }
}

/// Sort intervals and merge any that overlap
fn merge_intervals(intervals: &[(u64, u64)]) -> Vec<(u64, u64)> {
    let mut sorted = intervals.to_vec();
    sorted.sort_unstable();

    let mut merged: Vec<(u64, u64)> = Vec::with_capacity(sorted.len());
    for (start, end) in sorted {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

fn number(regions: Vec<Region>) -> Vec<PartitionTask> {
    regions
        .into_iter()
        .zip(0u64..)
        .map(|(region, ordinal)| PartitionTask::new(ordinal, region))
        .collect()
}
