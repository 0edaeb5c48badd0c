//! End-to-end pipeline tests over in-memory read sources.
//!
//! These drive `ChromosomeDriver` the way the `call` command does, with reads generated against a
//! seeded random chromosome so the expected evidence is known exactly.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use evidence_caller::candidate::TargetAnnotations;
use evidence_caller::config::{PipelineConfig, SampleSpec};
use evidence_caller::core::candidate::{CandidateLocus, VariantKey};
use evidence_caller::core::read::{AlignedRead, CigarOp};
use evidence_caller::core::sequence::ChromosomeSequence;
use evidence_caller::core::types::{Region, SampleRole, Tier};
use evidence_caller::core::variant::CalledVariant;
use evidence_caller::parsing::hotspots::HotspotIndex;
use evidence_caller::pipeline::sink::TsvVariantWriter;
use evidence_caller::pipeline::{
    ChromosomeDriver, CollectingSink, PhaseSetCounter, PipelineError, RegionBatch,
    ResultAggregator, RunSummary, VariantSink,
};
use evidence_caller::source::InMemoryReadSourceFactory;

const LENGTH: u64 = 10_000;
const READ_LENGTH: u64 = 100;

fn random_reference(seed: u64) -> ChromosomeSequence {
    let mut rng = StdRng::seed_from_u64(seed);
    let bases: Vec<u8> = (0..LENGTH).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect();
    ChromosomeSequence::new("chr1", bases)
}

fn alt_for(base: u8) -> u8 {
    match base {
        b'A' => b'C',
        b'C' => b'G',
        b'G' => b'T',
        _ => b'A',
    }
}

/// A perfectly aligned read carrying the alt base at each of `variants`
fn read_at(reference: &ChromosomeSequence, name: &str, start: u64, variants: &[u64]) -> AlignedRead {
    let end = start + READ_LENGTH - 1;
    let mut bases = reference.slice(start, end).unwrap().to_vec();
    for &position in variants {
        let offset = (position - start) as usize;
        bases[offset] = alt_for(bases[offset]);
    }
    let cigar = CigarOp::parse_all(&format!("{READ_LENGTH}M")).unwrap();
    AlignedRead::new(name, start, cigar, bases, vec![35; READ_LENGTH as usize])
}

fn config(threads: usize, max_slice_size: u64) -> PipelineConfig {
    PipelineConfig {
        threads,
        max_slice_size,
        samples: vec![
            SampleSpec::new("TUMOR", "tumor.bam", SampleRole::Tumor),
            SampleSpec::new("NORMAL", "normal.bam", SampleRole::Reference),
        ],
        ..Default::default()
    }
}

/// Tumor reads with a heterozygous SNV at 5000 plus a phased pair at 2600/2603 and a lone SNV at
/// 8000; normal reads over the same loci carry only the reference
fn sample_reads(reference: &ChromosomeSequence) -> (Vec<AlignedRead>, Vec<AlignedRead>) {
    let mut tumor = Vec::new();
    for i in 0..40u64 {
        let variants: &[u64] = if i % 2 == 0 { &[5000] } else { &[] };
        tumor.push(read_at(reference, &format!("t5k-{i}"), 4901 + i * 2, variants));
    }
    for i in 0..10u64 {
        tumor.push(read_at(reference, &format!("t2k-{i}"), 2550 + i, &[2600, 2603]));
    }
    for i in 0..6u64 {
        tumor.push(read_at(reference, &format!("t8k-{i}"), 7950 + i * 5, &[8000]));
    }

    let mut normal = Vec::new();
    for i in 0..30u64 {
        normal.push(read_at(reference, &format!("n5k-{i}"), 4921 + i, &[]));
    }
    for i in 0..8u64 {
        normal.push(read_at(reference, &format!("n2k-{i}"), 2560 + i, &[]));
    }
    (tumor, normal)
}

fn factory(reference: &ChromosomeSequence) -> InMemoryReadSourceFactory {
    let (tumor, normal) = sample_reads(reference);
    InMemoryReadSourceFactory::new()
        .with_sample("TUMOR", tumor)
        .with_sample("NORMAL", normal)
}

fn run(
    config: &PipelineConfig,
    reference: &ChromosomeSequence,
    factory: &InMemoryReadSourceFactory,
    annotations: &TargetAnnotations,
) -> (RunSummary, Vec<CalledVariant>) {
    let phase_sets = PhaseSetCounter::new();
    let driver = ChromosomeDriver::new(config, factory, annotations, &phase_sets);
    let mut sink = CollectingSink::new();
    let summary = driver.run(reference, &mut sink).unwrap();
    (summary, sink.into_variants())
}

/// A heterozygous tumor SNV is called once with exact tumor and normal support
#[test]
fn test_het_snv_end_to_end() {
    let reference = random_reference(7);
    let factory = factory(&reference);
    let (summary, variants) = run(
        &config(4, 1_000),
        &reference,
        &factory,
        &TargetAnnotations::default(),
    );

    assert_eq!(summary.chromosome, "chr1");
    assert_eq!(summary.regions, 10);
    assert_eq!(summary.variants, variants.len() as u64);

    let positions: Vec<u64> = variants.iter().map(CalledVariant::position).collect();
    assert_eq!(positions, vec![2600, 2603, 5000, 8000]);

    let snv = &variants[2];
    let ref_base = reference.base_at(5000).unwrap();
    assert_eq!(
        snv.locus.key,
        VariantKey::new(
            5000,
            char::from(ref_base).to_string(),
            char::from(alt_for(ref_base)).to_string()
        )
    );
    assert_eq!(snv.locus.tier, Tier::LowConfidence);

    let tumor = &snv.sample("TUMOR").unwrap().counter;
    assert_eq!(tumor.depth, 40);
    assert_eq!(tumor.alt_support, 20);
    assert_eq!(tumor.ref_support, 20);
    assert_eq!(tumor.alt_fragments, 20);
    assert!((tumor.allele_frequency() - 0.5).abs() < 1e-9);
    assert!((tumor.alt_quality - 20.0 * 35.0).abs() < 1e-9);

    let normal = &snv.sample("NORMAL").unwrap().counter;
    assert_eq!(normal.depth, 30);
    assert_eq!(normal.ref_support, 30);
    assert_eq!(normal.alt_support, 0);
    assert_eq!(snv.samples[0].role, SampleRole::Tumor);
    assert_eq!(snv.samples[1].role, SampleRole::Reference);
}

/// Variants sharing supporting fragments receive one phase set; a lone variant receives none
#[test]
fn test_phase_sets_assigned() {
    let reference = random_reference(7);
    let factory = factory(&reference);
    let (_, variants) = run(
        &config(2, 1_000),
        &reference,
        &factory,
        &TargetAnnotations::default(),
    );

    let phase_sets: Vec<Option<u64>> = variants.iter().map(|v| v.phase_set).collect();
    assert_eq!(phase_sets, vec![Some(1), Some(1), None, None]);
}

/// Output does not depend on the number of worker threads, and re-running is idempotent
#[test]
fn test_thread_count_invariance() {
    let reference = random_reference(11);
    let factory = factory(&reference);
    let annotations = TargetAnnotations::default();

    let (_, baseline) = run(&config(1, 500), &reference, &factory, &annotations);
    assert_eq!(baseline.len(), 4);
    for threads in [2, 3, 4, 8, 16] {
        let (summary, variants) = run(&config(threads, 500), &reference, &factory, &annotations);
        assert_eq!(summary.regions, 20);
        assert_eq!(variants, baseline, "threads = {threads}");
    }

    let (_, again) = run(&config(4, 500), &reference, &factory, &annotations);
    assert_eq!(again, baseline);
}

/// Changing region boundaries does not change which variants are called or their support
#[test]
fn test_slice_size_invariance() {
    let reference = random_reference(3);
    let factory = factory(&reference);
    let annotations = TargetAnnotations::default();

    let key = |v: &CalledVariant| (v.locus.key.clone(), v.samples.clone());
    let (_, baseline) = run(&config(4, 100_000), &reference, &factory, &annotations);
    for max_slice_size in [37, 250, 1_999] {
        let (_, variants) = run(&config(4, max_slice_size), &reference, &factory, &annotations);
        assert_eq!(
            variants.iter().map(key).collect::<Vec<_>>(),
            baseline.iter().map(key).collect::<Vec<_>>(),
            "max_slice_size = {max_slice_size}"
        );
    }
}

/// A hotspot is always a candidate, is filtered when unsupported, and is called on a single read
#[test]
fn test_hotspot_candidates() {
    let reference = random_reference(5);
    let ref_base = reference.base_at(3000).unwrap();
    let hotspot = VariantKey::new(
        3000,
        char::from(ref_base).to_string(),
        char::from(alt_for(ref_base)).to_string(),
    );
    let annotations = TargetAnnotations {
        hotspots: HotspotIndex::from_loci([("chr1", hotspot.clone())]),
        ..Default::default()
    };

    // No tumor read carries the hotspot allele
    let base = factory(&reference);
    let (with_hotspot, variants) = run(&config(2, 1_000), &reference, &base, &annotations);
    let (without_hotspot, _) = run(
        &config(2, 1_000),
        &reference,
        &base,
        &TargetAnnotations::default(),
    );
    assert_eq!(with_hotspot.candidates, without_hotspot.candidates + 1);
    assert!(variants.iter().all(|v| v.position() != 3000));

    // One supporting read is enough for a hotspot, though not for the standard thresholds
    let (tumor, normal) = sample_reads(&reference);
    let mut tumor = tumor;
    tumor.push(read_at(&reference, "hot-1", 2950, &[3000]));
    let supported = InMemoryReadSourceFactory::new()
        .with_sample("TUMOR", tumor)
        .with_sample("NORMAL", normal);

    let (_, variants) = run(&config(2, 1_000), &reference, &supported, &annotations);
    let called = variants.iter().find(|v| v.position() == 3000).unwrap();
    assert_eq!(called.locus.key, hotspot);
    assert_eq!(called.locus.tier, Tier::Hotspot);
    assert!(called.locus.hotspot);
    assert_eq!(called.sample("TUMOR").unwrap().counter.alt_support, 1);

    let (_, plain) = run(
        &config(2, 1_000),
        &reference,
        &supported,
        &TargetAnnotations::default(),
    );
    assert!(plain.iter().all(|v| v.position() != 3000));
}

/// A candidate below the tumor thresholds is counted but produces no output
#[test]
fn test_below_threshold_candidate_not_called() {
    let reference = random_reference(9);
    let (mut tumor, normal) = sample_reads(&reference);
    tumor.push(read_at(&reference, "single", 6950, &[7000]));
    let factory = InMemoryReadSourceFactory::new()
        .with_sample("TUMOR", tumor)
        .with_sample("NORMAL", normal);

    let (baseline, _) = run(
        &config(4, 1_000),
        &reference,
        &self::factory(&reference),
        &TargetAnnotations::default(),
    );
    let (summary, variants) = run(
        &config(4, 1_000),
        &reference,
        &factory,
        &TargetAnnotations::default(),
    );

    assert_eq!(summary.candidates, baseline.candidates + 1);
    assert_eq!(summary.variants, baseline.variants);
    assert!(variants.iter().all(|v| v.position() != 7000));
}

/// Every worker opens exactly one handle per sample
#[test]
fn test_handles_opened_per_worker() {
    let reference = random_reference(1);

    // 10 regions, 4 workers, 2 samples
    let factory = factory(&reference);
    run(&config(4, 1_000), &reference, &factory, &TargetAnnotations::default());
    assert_eq!(factory.opened(), 8);

    // 8 threads requested but only 4 regions
    let factory = self::factory(&reference);
    let (summary, _) = run(
        &config(8, 100_000),
        &reference,
        &factory,
        &TargetAnnotations::default(),
    );
    assert_eq!(summary.regions, 4);
    assert_eq!(factory.opened(), 8);
}

/// A failing region aborts the run with the region in the error and no finished output
#[test]
fn test_region_failure_aborts() {
    let reference = random_reference(13);
    let factory = factory(&reference).with_failure("TUMOR", Region::new("chr1", 6500, 6500));
    let config = config(4, 1_000);
    let annotations = TargetAnnotations::default();
    let phase_sets = PhaseSetCounter::new();
    let driver = ChromosomeDriver::new(&config, &factory, &annotations, &phase_sets);

    let mut sink = CollectingSink::new();
    let err = driver.run(&reference, &mut sink).unwrap_err();
    match &err {
        PipelineError::Region { ordinal, region, .. } => {
            assert_eq!(*ordinal, 6);
            assert_eq!(region, &Region::new("chr1", 6001, 7000));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("chr1:6001-7000"));
    assert!(!sink.is_finished());
    assert!(sink.variants().iter().all(|v| v.position() < 6001));

    // A file sink dropped after the failure leaves no output behind
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calls.tsv");
    {
        let mut writer = TsvVariantWriter::create(
            &path,
            &["TUMOR".to_string(), "NORMAL".to_string()],
        )
        .unwrap();
        assert!(driver.run(&reference, &mut writer).is_err());
    }
    assert!(!path.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

/// A finished TSV has one row per variant with both samples' columns
#[test]
fn test_tsv_output() {
    let reference = random_reference(7);
    let factory = factory(&reference);
    let config = config(3, 1_000);
    let annotations = TargetAnnotations::default();
    let phase_sets = PhaseSetCounter::new();
    let driver = ChromosomeDriver::new(&config, &factory, &annotations, &phase_sets);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calls.tsv");
    let mut writer =
        TsvVariantWriter::create(&path, &["TUMOR".to_string(), "NORMAL".to_string()]).unwrap();
    driver.run(&reference, &mut writer).unwrap();
    writer.finish().unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0].split('\t').count(), 6 + 2 * 6);
    let snv: Vec<&str> = lines[3].split('\t').collect();
    assert_eq!(snv[0], "chr1");
    assert_eq!(snv[1], "5000");
    assert_eq!(snv[5], ".");
    assert_eq!(&snv[6..9], &["40", "20", "20"]);
    assert_eq!(&snv[12..15], &["30", "30", "0"]);
}

fn batch(ordinal: u64) -> RegionBatch {
    let start = ordinal * 100 + 1;
    RegionBatch {
        ordinal,
        region: Region::new("chr1", start, start + 99),
        variants: vec![CalledVariant::new(
            CandidateLocus::new("chr1", VariantKey::new(start + 50, "A", "G"), Tier::LowConfidence),
            Vec::new(),
        )],
        reads_processed: 1,
        candidates: 1,
    }
}

fn written_positions(submit: impl FnOnce(&ResultAggregator<'_>), regions: u64) -> Vec<u64> {
    let phase_sets = PhaseSetCounter::new();
    let mut sink = CollectingSink::new();
    {
        let aggregator = ResultAggregator::new(&mut sink, &phase_sets);
        submit(&aggregator);
        let totals = aggregator.finish(regions).unwrap();
        assert_eq!(totals.regions, regions);
    }
    sink.variants().iter().map(CalledVariant::position).collect()
}

/// Output order follows region order whatever order regions complete in
#[test]
fn test_aggregator_order_under_any_completion() {
    let expected: Vec<u64> = (0..64).map(|o| o * 100 + 51).collect();

    let reversed = written_positions(
        |aggregator| {
            for ordinal in (0..64).rev() {
                aggregator.submit(batch(ordinal)).unwrap();
            }
        },
        64,
    );
    assert_eq!(reversed, expected);

    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..5 {
        let mut ordinals: Vec<u64> = (0..64).collect();
        ordinals.shuffle(&mut rng);
        let shuffled = written_positions(
            |aggregator| {
                std::thread::scope(|scope| {
                    for chunk in ordinals.chunks(16) {
                        scope.spawn(move || {
                            for &ordinal in chunk {
                                aggregator.submit(batch(ordinal)).unwrap();
                            }
                        });
                    }
                });
            },
            64,
        );
        assert_eq!(shuffled, expected);
    }
}
