use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Args;
use tracing::info;

use crate::candidate::TargetAnnotations;
use crate::cli::OutputFormat;
use crate::config::{PipelineConfig, SampleSpec};
use crate::core::types::{Region, SampleRole};
use crate::evidence::RecalibrationTable;
use crate::parsing::bam::BamReadSourceFactory;
use crate::parsing::bed::load_bed_file;
use crate::parsing::fai::ChromosomeLengths;
use crate::parsing::fasta::{load_chromosome, reference_lengths};
use crate::parsing::hotspots::load_hotspots;
use crate::pipeline::phasing::PhaseSetCounter;
use crate::pipeline::sink::create_file_sink;
use crate::pipeline::ChromosomeDriver;
use crate::utils::format::{format_count, format_duration};
use crate::utils::validation::{parse_region, parse_sample_arg, RegionArg};

#[derive(Args)]
pub struct CallArgs {
    /// Tumor sample as NAME=BAM; repeat for multiple tumor samples
    #[arg(long = "tumor", value_name = "NAME=BAM", value_parser = parse_sample_arg)]
    pub tumors: Vec<(String, PathBuf)>,

    /// Reference (e.g. matched normal) sample as NAME=BAM; repeatable
    #[arg(long = "reference", value_name = "NAME=BAM", value_parser = parse_sample_arg)]
    pub references: Vec<(String, PathBuf)>,

    /// Reference genome FASTA (optionally gzipped); a .fai index next to it is used if present
    #[arg(long, value_name = "FASTA")]
    pub ref_genome: PathBuf,

    /// Output file for called variants
    #[arg(short, long)]
    pub output: PathBuf,

    /// Only process these chromosomes (comma-separated)
    #[arg(long, value_delimiter = ',', conflicts_with = "region")]
    pub chromosomes: Vec<String>,

    /// Only process this region, as CHROM or CHROM:START-END (1-based, inclusive)
    #[arg(long, value_parser = parse_region)]
    pub region: Option<RegionArg>,

    /// Hotspot VCF (optionally gzipped); listed alleles are always evaluated
    #[arg(long)]
    pub hotspots: Option<PathBuf>,

    /// Panel BED; when given, only panel targets are processed
    #[arg(long)]
    pub panel_bed: Option<PathBuf>,

    /// High-confidence regions BED, used for tiering
    #[arg(long)]
    pub high_confidence_bed: Option<PathBuf>,

    /// Base quality recalibration table as NAME=TSV; repeatable
    #[arg(long = "recalibration", value_name = "NAME=TSV", value_parser = parse_sample_arg)]
    pub recalibrations: Vec<(String, PathBuf)>,

    /// JSON pipeline configuration; flags given on the command line take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Worker threads per chromosome
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Maximum region size in bases
    #[arg(long)]
    pub max_slice_size: Option<u64>,
}

pub fn run(args: CallArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = build_config(&args)?;
    config.validate()?;

    let annotations = load_annotations(&args)?;
    let recalibration = load_recalibration(&args, &config)?;

    let lengths = reference_lengths(&args.ref_genome)
        .with_context(|| format!("Failed to read {}", args.ref_genome.display()))?;
    let targets = select_targets(&args, &lengths)?;
    info!(
        chromosomes = targets.len(),
        reference_chromosomes = lengths.len(),
        threads = config.threads,
        "Starting run"
    );

    let samples: Vec<String> = config
        .tumor_samples()
        .chain(config.reference_samples())
        .map(|s| s.name.clone())
        .collect();
    let mut sink = create_file_sink(format, &args.output, &samples)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    let phase_sets = PhaseSetCounter::new();
    let factory = BamReadSourceFactory;
    let driver = ChromosomeDriver::new(&config, &factory, &annotations, &phase_sets)
        .with_recalibration(&recalibration);

    let mut variants = 0u64;
    let mut reads = 0u64;
    let mut elapsed = std::time::Duration::ZERO;
    for (chromosome, region) in &targets {
        let sequence = load_chromosome(&args.ref_genome, chromosome)
            .with_context(|| format!("Failed to load {chromosome} from the reference genome"))?;
        let summary = match region {
            Some(region) => driver.run_region(&sequence, region, sink.as_mut()),
            None => driver.run(&sequence, sink.as_mut()),
        }
        .with_context(|| format!("Failed calling {chromosome}"))?;

        variants += summary.variants;
        reads += summary.reads_processed;
        elapsed += summary.elapsed;
    }

    sink.finish()
        .with_context(|| format!("Failed to finalize {}", args.output.display()))?;

    info!(
        chromosomes = targets.len(),
        reads = %format_count(reads),
        variants = %format_count(variants),
        elapsed = %format_duration(elapsed),
        output = %args.output.display(),
        "Run complete"
    );
    Ok(())
}

fn build_config(args: &CallArgs) -> anyhow::Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    if let Some(max_slice_size) = args.max_slice_size {
        config.max_slice_size = max_slice_size;
    }
    for (name, path) in &args.tumors {
        config
            .samples
            .push(SampleSpec::new(name.as_str(), path.as_path(), SampleRole::Tumor));
    }
    for (name, path) in &args.references {
        config
            .samples
            .push(SampleSpec::new(name.as_str(), path.as_path(), SampleRole::Reference));
    }

    Ok(config)
}

fn load_annotations(args: &CallArgs) -> anyhow::Result<TargetAnnotations> {
    let mut annotations = TargetAnnotations::default();
    if let Some(path) = &args.hotspots {
        annotations.hotspots = load_hotspots(path)
            .with_context(|| format!("Failed to load hotspots {}", path.display()))?;
    }
    if let Some(path) = &args.panel_bed {
        annotations.panel = Some(
            load_bed_file(path).with_context(|| format!("Failed to load panel {}", path.display()))?,
        );
    }
    if let Some(path) = &args.high_confidence_bed {
        annotations.high_confidence = Some(
            load_bed_file(path)
                .with_context(|| format!("Failed to load high-confidence regions {}", path.display()))?,
        );
    }
    Ok(annotations)
}

fn load_recalibration(
    args: &CallArgs,
    config: &PipelineConfig,
) -> anyhow::Result<RecalibrationTable> {
    let mut table = RecalibrationTable::new();
    for (name, path) in &args.recalibrations {
        if !config.samples.iter().any(|s| &s.name == name) {
            bail!("Recalibration table given for unknown sample '{name}'");
        }
        table
            .load_sample(name.as_str(), path)
            .with_context(|| format!("Failed to load recalibration table {}", path.display()))?;
    }
    Ok(table)
}

/// Chromosomes to process, each with an optional sub-region
fn select_targets(
    args: &CallArgs,
    lengths: &ChromosomeLengths,
) -> anyhow::Result<Vec<(String, Option<Region>)>> {
    let known = |chromosome: &str| -> anyhow::Result<()> {
        if lengths.length(chromosome).is_none() {
            bail!("Chromosome '{chromosome}' is not in the reference genome");
        }
        Ok(())
    };

    if let Some(region) = &args.region {
        known(region.chromosome())?;
        return Ok(match region {
            RegionArg::Chromosome(name) => vec![(name.clone(), None)],
            RegionArg::Interval(region) => vec![(region.chromosome.clone(), Some(region.clone()))],
        });
    }

    if !args.chromosomes.is_empty() {
        for chromosome in &args.chromosomes {
            known(chromosome)?;
        }
        return Ok(args.chromosomes.iter().map(|c| (c.clone(), None)).collect());
    }

    Ok(lengths.names().map(|name| (name.to_string(), None)).collect())
}
