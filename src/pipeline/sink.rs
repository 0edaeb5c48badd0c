//! Destinations for called variants.
//!
//! File writers stage their output in a temporary file next to the destination and only move it
//! into place on [`VariantSink::finish`]. A writer dropped before `finish` removes its temporary
//! file, so an aborted run never leaves a truncated output behind.

use std::fmt::Write as _;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::core::variant::CalledVariant;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize variant: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to move output into place at {path}: {reason}")]
    Persist { path: PathBuf, reason: String },

    #[error("Sink has already been finished")]
    Finished,
}

/// Receives variant batches in final output order
pub trait VariantSink: Send {
    /// # Errors
    ///
    /// Returns a `SinkError` if the batch cannot be written.
    fn write_batch(&mut self, variants: &[CalledVariant]) -> Result<(), SinkError>;

    /// Complete the output; no batches may follow
    ///
    /// # Errors
    ///
    /// Returns a `SinkError` if the output cannot be flushed or moved into place.
    fn finish(&mut self) -> Result<(), SinkError>;
}

/// Output format for file sinks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Tab-separated, one row per variant
    #[default]
    Tsv,
    /// One JSON object per line
    Json,
}

/// Temporary file in the destination's directory, persisted on completion
struct StagedFile {
    writer: Option<BufWriter<NamedTempFile>>,
    destination: PathBuf,
}

impl StagedFile {
    fn create(destination: &Path) -> Result<Self, SinkError> {
        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let temp = NamedTempFile::new_in(dir)?;
        Ok(Self {
            writer: Some(BufWriter::new(temp)),
            destination: destination.to_path_buf(),
        })
    }

    fn writer(&mut self) -> Result<&mut BufWriter<NamedTempFile>, SinkError> {
        self.writer.as_mut().ok_or(SinkError::Finished)
    }

    fn persist(&mut self) -> Result<(), SinkError> {
        let writer = self.writer.take().ok_or(SinkError::Finished)?;
        let temp = writer
            .into_inner()
            .map_err(|e| SinkError::Io(e.into_error()))?;
        temp.persist(&self.destination)
            .map_err(|e| SinkError::Persist {
                path: self.destination.clone(),
                reason: e.error.to_string(),
            })?;
        Ok(())
    }
}

/// Tab-separated writer with per-sample column groups
pub struct TsvVariantWriter {
    file: StagedFile,
}

impl TsvVariantWriter {
    /// Create a writer whose columns cover `samples`, in the order variants list them
    ///
    /// # Errors
    ///
    /// Returns a `SinkError` if the temporary file cannot be created or written.
    pub fn create(destination: &Path, samples: &[String]) -> Result<Self, SinkError> {
        let mut file = StagedFile::create(destination)?;

        let mut header = String::from("chromosome\tposition\tref\talt\ttier\tphase_set");
        for sample in samples {
            for column in ["depth", "ref", "alt", "alt_fragments", "alt_quality", "af"] {
                let _ = write!(header, "\t{sample}_{column}");
            }
        }
        writeln!(file.writer()?, "{header}")?;

        Ok(Self { file })
    }
}

impl VariantSink for TsvVariantWriter {
    fn write_batch(&mut self, variants: &[CalledVariant]) -> Result<(), SinkError> {
        let writer = self.file.writer()?;
        for variant in variants {
            let locus = &variant.locus;
            write!(
                writer,
                "{}\t{}\t{}\t{}\t{}\t{}",
                locus.chromosome,
                locus.key.position,
                locus.key.ref_allele,
                locus.key.alt_allele,
                locus.tier,
                variant
                    .phase_set
                    .map_or_else(|| ".".to_string(), |id| id.to_string()),
            )?;
            for support in &variant.samples {
                let c = &support.counter;
                write!(
                    writer,
                    "\t{}\t{}\t{}\t{}\t{:.1}\t{:.4}",
                    c.depth,
                    c.ref_support,
                    c.alt_support,
                    c.alt_fragments,
                    c.alt_quality,
                    c.allele_frequency()
                )?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.file.persist()
    }
}

/// One JSON object per variant per line
pub struct JsonLinesVariantWriter {
    file: StagedFile,
}

impl JsonLinesVariantWriter {
    /// # Errors
    ///
    /// Returns a `SinkError` if the temporary file cannot be created.
    pub fn create(destination: &Path) -> Result<Self, SinkError> {
        Ok(Self {
            file: StagedFile::create(destination)?,
        })
    }
}

impl VariantSink for JsonLinesVariantWriter {
    fn write_batch(&mut self, variants: &[CalledVariant]) -> Result<(), SinkError> {
        let writer = self.file.writer()?;
        for variant in variants {
            serde_json::to_writer(&mut *writer, variant)?;
            writeln!(writer)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.file.persist()
    }
}

/// Open a file sink for the given format
///
/// # Errors
///
/// Returns a `SinkError` if the temporary output cannot be created.
pub fn create_file_sink(
    format: OutputFormat,
    destination: &Path,
    samples: &[String],
) -> Result<Box<dyn VariantSink>, SinkError> {
    Ok(match format {
        OutputFormat::Tsv => Box::new(TsvVariantWriter::create(destination, samples)?),
        OutputFormat::Json => Box::new(JsonLinesVariantWriter::create(destination)?),
    })
}

/// Keeps every written variant in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    variants: Vec<CalledVariant>,
    batches: usize,
    finished: bool,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn variants(&self) -> &[CalledVariant] {
        &self.variants
    }

    #[must_use]
    pub fn into_variants(self) -> Vec<CalledVariant> {
        self.variants
    }

    /// Number of non-empty batches received
    #[must_use]
    pub fn batches(&self) -> usize {
        self.batches
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl VariantSink for CollectingSink {
    fn write_batch(&mut self, variants: &[CalledVariant]) -> Result<(), SinkError> {
        if self.finished {
            return Err(SinkError::Finished);
        }
        if !variants.is_empty() {
            self.batches += 1;
            self.variants.extend_from_slice(variants);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        if self.finished {
            return Err(SinkError::Finished);
        }
        self.finished = true;
        Ok(())
    }
}
