//! Command-line interface for evidence-caller.
//!
//! - **call**: run the pipeline over one or more chromosomes and write called variants
//! - **partition**: print the region plan a `call` run would use for a chromosome
//!
//! ## Usage
//!
//! ```text
//! # Tumor/normal calling over the whole genome with eight workers per chromosome
//! evidence-caller call --ref-genome ref.fa --tumor TUMOR=tumor.bam --reference NORMAL=normal.bam \
//!     --output calls.tsv --threads 8
//!
//! # Re-run a single failing region in isolation
//! evidence-caller call --ref-genome ref.fa --tumor TUMOR=tumor.bam --output region.tsv \
//!     --region chr7:55,000,001-55,100,000
//!
//! # Inspect the partition plan
//! evidence-caller partition --fai ref.fa.fai --chromosome chr7 --threads 8
//! ```

use clap::{Parser, Subcommand};

pub mod call;
pub mod partition;

pub use crate::pipeline::sink::OutputFormat;

#[derive(Parser)]
#[command(name = "evidence-caller")]
#[command(author = "Fulcrum Genomics")]
#[command(version)]
#[command(about = "Region-parallel tumor/normal variant evidence pipeline")]
#[command(
    long_about = "evidence-caller splits each chromosome into regions and processes them on a pool of worker threads.\n\nFor every region it:\n- finds candidate variants in the tumor reads\n- counts tumor read support and filters candidates\n- counts reference-sample support for the candidates that survive\n\nResults are written in genomic order regardless of which region finishes first."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "tsv")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Call variants from tumor and reference alignments
    Call(call::CallArgs),

    /// Show how a chromosome would be split into regions
    Partition(partition::PartitionArgs),
}
