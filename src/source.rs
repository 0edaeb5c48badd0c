//! Per-sample read access.
//!
//! A [`ReadSource`] is a single handle onto one sample's alignments. Handles are not shared: each
//! worker thread asks the [`ReadSourceFactory`] for its own handle per sample when it starts and
//! drops them when it exits. The factory itself is shared by reference across workers, so it must
//! be `Send + Sync`; the handles need not be.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::config::SampleSpec;
use crate::core::read::AlignedRead;
use crate::core::types::Region;

#[derive(Error, Debug)]
pub enum ReadSourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to open alignments for sample '{sample}': {reason}")]
    Open { sample: String, reason: String },

    #[error("Invalid query region {region}: {reason}")]
    InvalidRegion { region: String, reason: String },

    #[error("No reads registered for sample '{0}'")]
    UnknownSample(String),
}

/// One handle onto a sample's aligned reads
pub trait ReadSource {
    /// All reads overlapping `region`, in alignment-start order.
    ///
    /// Every call re-queries the underlying data, so the same region may be fetched repeatedly.
    ///
    /// # Errors
    ///
    /// Returns a `ReadSourceError` if the alignments cannot be read or decoded.
    fn fetch(&mut self, region: &Region) -> Result<Vec<AlignedRead>, ReadSourceError>;
}

/// Opens independent [`ReadSource`] handles, one per sample per worker thread
pub trait ReadSourceFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns a `ReadSourceError` if the sample's alignments cannot be opened.
    fn open(&self, sample: &SampleSpec) -> Result<Box<dyn ReadSource>, ReadSourceError>;
}

/// Reads held in memory, shared between handles
#[derive(Debug, Clone)]
pub struct InMemoryReadSource {
    reads: Arc<Vec<AlignedRead>>,
    failure: Option<Region>,
}

impl InMemoryReadSource {
    #[must_use]
    pub fn new(mut reads: Vec<AlignedRead>) -> Self {
        reads.sort_by_key(|read| read.alignment_start);
        Self {
            reads: Arc::new(reads),
            failure: None,
        }
    }
}

impl ReadSource for InMemoryReadSource {
    fn fetch(&mut self, region: &Region) -> Result<Vec<AlignedRead>, ReadSourceError> {
        if let Some(failure) = &self.failure {
            if failure.chromosome == region.chromosome && region.overlaps(failure.start, failure.end)
            {
                return Err(ReadSourceError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("corrupt record in {failure}"),
                )));
            }
        }

        Ok(self
            .reads
            .iter()
            .filter(|read| read.overlaps(region.start, region.end))
            .cloned()
            .collect())
    }
}

/// Factory over in-memory reads keyed by sample name.
///
/// Reads are assumed to lie on the chromosome being processed. The factory counts the handles it
/// has opened, and can be told to fail every fetch touching a given interval of one sample.
#[derive(Debug, Default)]
pub struct InMemoryReadSourceFactory {
    samples: HashMap<String, InMemoryReadSource>,
    opened: AtomicUsize,
}

impl InMemoryReadSourceFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_sample(mut self, sample: impl Into<String>, reads: Vec<AlignedRead>) -> Self {
        self.samples
            .insert(sample.into(), InMemoryReadSource::new(reads));
        self
    }

    /// Make every fetch of `sample` that overlaps `region` fail with an I/O error
    #[must_use]
    pub fn with_failure(mut self, sample: &str, region: Region) -> Self {
        if let Some(source) = self.samples.get_mut(sample) {
            source.failure = Some(region);
        }
        self
    }

    /// Number of handles opened so far
    #[must_use]
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }
}

impl ReadSourceFactory for InMemoryReadSourceFactory {
    fn open(&self, sample: &SampleSpec) -> Result<Box<dyn ReadSource>, ReadSourceError> {
        let source = self
            .samples
            .get(&sample.name)
            .ok_or_else(|| ReadSourceError::UnknownSample(sample.name.clone()))?;
        self.opened.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(source.clone()))
    }
}
