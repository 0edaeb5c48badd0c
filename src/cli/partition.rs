use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Args;

use crate::cli::OutputFormat;
use crate::config::DEFAULT_MAX_SLICE_SIZE;
use crate::parsing::bed::load_bed_file;
use crate::parsing::fai::parse_fai_file;
use crate::partition::RegionPartitioner;

#[derive(Args)]
pub struct PartitionArgs {
    /// Chromosome to partition
    #[arg(long)]
    pub chromosome: String,

    /// FASTA index providing the chromosome length
    #[arg(long, required_unless_present = "length", conflicts_with = "length")]
    pub fai: Option<PathBuf>,

    /// Chromosome length, instead of --fai
    #[arg(long)]
    pub length: Option<u64>,

    /// Worker threads the plan is for
    #[arg(short, long, default_value_t = 1)]
    pub threads: usize,

    /// Maximum region size in bases
    #[arg(long, default_value_t = DEFAULT_MAX_SLICE_SIZE)]
    pub max_slice_size: u64,

    /// Only plan regions over the targets of this panel BED
    #[arg(long)]
    pub panel_bed: Option<PathBuf>,
}

pub fn run(args: PartitionArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let length = match (&args.fai, args.length) {
        (_, Some(length)) => length,
        (Some(fai), None) => {
            let lengths = parse_fai_file(fai)
                .with_context(|| format!("Failed to read {}", fai.display()))?;
            match lengths.length(&args.chromosome) {
                Some(length) => length,
                None => bail!("Chromosome '{}' is not in {}", args.chromosome, fai.display()),
            }
        }
        (None, None) => bail!("Either --fai or --length is required"),
    };

    let partitioner = RegionPartitioner::new(args.threads, args.max_slice_size)?;
    let tasks = match &args.panel_bed {
        Some(path) => {
            let panel = load_bed_file(path)
                .with_context(|| format!("Failed to load panel {}", path.display()))?;
            let targets = panel.overlapping(&args.chromosome, 1, length);
            partitioner.partition_targets(&args.chromosome, &targets)?
        }
        None => partitioner.partition_chromosome(&args.chromosome, length)?,
    };

    if verbose {
        eprintln!("{}: {} region(s) for {length} bases", args.chromosome, tasks.len());
    }

    match format {
        OutputFormat::Tsv => {
            println!("ordinal\tchromosome\tstart\tend");
            for task in &tasks {
                println!(
                    "{}\t{}\t{}\t{}",
                    task.ordinal, task.region.chromosome, task.region.start, task.region.end
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&tasks)?);
        }
    }

    Ok(())
}
