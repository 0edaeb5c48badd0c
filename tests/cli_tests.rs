//! Command-line tests for the `evidence-caller` binary.

use assert_cmd::Command;
use predicates::prelude::*;

fn evidence_caller() -> Command {
    Command::cargo_bin("evidence-caller").unwrap()
}

/// The partition plan for a given length is printed as TSV with one row per region
#[test]
fn test_partition_by_length() {
    evidence_caller()
        .args([
            "partition",
            "--chromosome",
            "chr1",
            "--length",
            "1000",
            "--threads",
            "4",
            "--max-slice-size",
            "100",
        ])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("ordinal\tchromosome\tstart\tend\n"))
        .stdout(predicate::str::contains("0\tchr1\t1\t100\n"))
        .stdout(predicate::str::contains("9\tchr1\t901\t1000\n"))
        .stdout(predicate::str::contains("10\tchr1").not());
}

/// Chromosome lengths can come from a FASTA index
#[test]
fn test_partition_from_fai() {
    let dir = tempfile::tempdir().unwrap();
    let fai = dir.path().join("ref.fa.fai");
    std::fs::write(&fai, "chr1\t1000\t6\t60\t61\nchr2\t500\t1030\t60\t61\n").unwrap();

    evidence_caller()
        .args(["partition", "--chromosome", "chr2", "--fai"])
        .arg(&fai)
        .assert()
        .success()
        .stdout(predicate::str::contains("0\tchr2\t1\t500\n"));

    evidence_caller()
        .args(["partition", "--chromosome", "chr3", "--fai"])
        .arg(&fai)
        .assert()
        .failure()
        .stderr(predicate::str::contains("chr3"));
}

/// JSON output lists the same tasks
#[test]
fn test_partition_json() {
    let output = evidence_caller()
        .args([
            "partition",
            "--chromosome",
            "chr1",
            "--length",
            "240",
            "--max-slice-size",
            "100",
            "--format",
            "json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let tasks: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let tasks = tasks.as_array().unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[1]["ordinal"], 1);
    assert_eq!(tasks[1]["region"]["end"], 240);
}

/// Either --fai or --length must be given
#[test]
fn test_partition_requires_length_source() {
    evidence_caller()
        .args(["partition", "--chromosome", "chr1"])
        .assert()
        .failure();
}

/// Calling without any tumor sample is rejected before any input is read
#[test]
fn test_call_requires_tumor() {
    let dir = tempfile::tempdir().unwrap();
    evidence_caller()
        .args(["call", "--ref-genome", "missing.fa", "--output"])
        .arg(dir.path().join("calls.tsv"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("No tumor samples configured"));
}

/// Malformed sample arguments are rejected by argument parsing
#[test]
fn test_call_rejects_bad_sample_argument() {
    evidence_caller()
        .args([
            "call",
            "--ref-genome",
            "ref.fa",
            "--output",
            "calls.tsv",
            "--tumor",
            "tumor.bam",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NAME=PATH"));
}

/// A sample that cannot be opened fails the run and leaves no output file
#[test]
fn test_call_missing_bam_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let fasta = dir.path().join("ref.fa");
    std::fs::write(&fasta, format!(">chr1\n{}\n", "ACGT".repeat(25))).unwrap();
    let output = dir.path().join("calls.tsv");

    evidence_caller()
        .arg("call")
        .arg("--ref-genome")
        .arg(&fasta)
        .arg("--tumor")
        .arg(format!("TUMOR={}", dir.path().join("missing.bam").display()))
        .arg("--output")
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Starting run"))
        .stderr(predicate::str::contains("Failed calling chr1"))
        .stderr(predicate::str::contains("failed to open sample 'TUMOR'"));

    assert!(!output.exists());
}

/// An unknown chromosome in --region is reported by name
#[test]
fn test_call_unknown_region_chromosome() {
    let dir = tempfile::tempdir().unwrap();
    let fasta = dir.path().join("ref.fa");
    std::fs::write(&fasta, ">chr1\nACGTACGT\n").unwrap();

    evidence_caller()
        .arg("call")
        .arg("--ref-genome")
        .arg(&fasta)
        .args(["--tumor", "T=t.bam", "--region", "chr9:1-5", "--output"])
        .arg(dir.path().join("calls.tsv"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Chromosome 'chr9' is not in the reference genome"));
}
