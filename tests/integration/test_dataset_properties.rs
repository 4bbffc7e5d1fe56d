//! Properties of region queries, window filtering, and stitching over real BGZF files.

use rstest::rstest;
use tempfile::TempDir;
use watchdog_lib::config::QualityField;
use watchdog_lib::dataset::normalize;
use watchdog_lib::locus::DroppedLocus;
use watchdog_lib::quantile::quantile;
use watchdog_lib::record_stream::{HeaderMode, RecordQuery, Region};
use watchdog_lib::stitch::stitch;
use watchdog_lib::toolkit::{Bcftools, ScanToolkit, Toolkit};
use watchdog_lib::window::Window;
use watchdog_lib::window_filter::filter_window;

use crate::helpers::{FakeBcftools, read_body, standard_records, write_vcf};

fn body_of(path: &std::path::Path, region: Region) -> Vec<String> {
    ScanToolkit
        .view(path, &RecordQuery::region(region, HeaderMode::Exclude))
        .unwrap()
        .map(|l| l.unwrap())
        .collect()
}

#[rstest]
#[case(1)]
#[case(99)]
#[case(100)]
#[case(250)]
#[case(480)]
#[case(10_000)]
fn test_split_ranges_partition_a_chromosome(#[case] mid: u64) {
    let dir = TempDir::new().unwrap();
    let input = write_vcf(dir.path(), "input.vcf", &standard_records());
    let dataset = normalize(&ScanToolkit, &input).unwrap();

    let left = body_of(dataset.path(), Region::closed("chr1", 1, mid));
    let right = body_of(dataset.path(), Region::from_start("chr1", mid + 1));
    let whole: Vec<String> =
        read_body(dataset.path()).into_iter().filter(|l| l.starts_with("chr1\t")).collect();

    let mut joined = left;
    joined.extend(right);
    assert_eq!(joined, whole);
}

#[rstest]
#[case(0.05)]
#[case(0.25)]
#[case(0.5)]
fn test_filter_keeps_exactly_the_records_at_or_above_the_cutoff(#[case] fraction: f64) {
    let dir = TempDir::new().unwrap();
    let records = standard_records();
    let input = write_vcf(dir.path(), "input.vcf", &records);
    let dataset = normalize(&ScanToolkit, &input).unwrap();
    let window = Window::new("chr1", 100, 500);

    let mut loci: Vec<DroppedLocus> = Vec::new();
    let filtered = filter_window(
        &ScanToolkit,
        dataset.path(),
        &window,
        &QualityField::default(),
        fraction,
        &input,
        &mut loci,
    )
    .unwrap();

    let in_window: Vec<_> =
        records.iter().filter(|r| window.contains(r.chrom, r.pos)).collect();
    let scores: Vec<f64> = in_window.iter().map(|r| r.score).collect();
    let cutoff = quantile(&scores, fraction).unwrap();
    assert!((filtered.cutoff - cutoff).abs() < 1e-12);

    let expected: Vec<String> =
        in_window.iter().filter(|r| r.score >= cutoff).map(|r| r.line()).collect();
    assert_eq!(read_body(filtered.dataset.path()), expected);
    assert_eq!(filtered.retained + filtered.dropped, in_window.len() as u64);
    assert_eq!(filtered.total(), in_window.len() as u64);
    assert_eq!(loci.len() as u64, filtered.dropped);
    assert!(loci.iter().all(|l| window.contains(&l.chromosome, l.start)));
}

#[test]
fn test_stitching_an_unfiltered_window_reproduces_the_dataset() {
    let dir = TempDir::new().unwrap();
    let input = write_vcf(dir.path(), "input.vcf", &standard_records());
    let dataset = normalize(&ScanToolkit, &input).unwrap();
    let window = Window::new("chr1", 100, 500);

    let mut loci: Vec<DroppedLocus> = Vec::new();
    let filtered = filter_window(
        &ScanToolkit,
        dataset.path(),
        &window,
        &QualityField::default(),
        0.0,
        &input,
        &mut loci,
    )
    .unwrap();
    assert_eq!(filtered.dropped, 0);
    assert!(loci.is_empty());

    let stitched =
        stitch(&ScanToolkit, dataset.path(), &window, filtered.dataset.path()).unwrap();
    let original = crate::helpers::read_lines(dataset.path());
    assert_eq!(crate::helpers::read_lines(stitched.path()), original);
}

#[test]
fn test_stitch_reads_one_dataset_at_a_time() {
    let dir = TempDir::new().unwrap();
    let fake = FakeBcftools::install(dir.path(), false);
    let toolkit = Bcftools::new(&fake.program);
    let records = standard_records();
    let input = write_vcf(dir.path(), "input.vcf", &records);
    let dataset = normalize(&toolkit, &input).unwrap();
    let window = Window::new("chr1", 100, 500);

    let mut loci: Vec<DroppedLocus> = Vec::new();
    let filtered = filter_window(
        &toolkit,
        dataset.path(),
        &window,
        &QualityField::default(),
        0.1,
        &input,
        &mut loci,
    )
    .unwrap();
    let stitched = stitch(&toolkit, dataset.path(), &window, filtered.dataset.path()).unwrap();

    assert!(fake.overlaps().is_empty(), "overlapping views: {:?}", fake.overlaps());
    let expected: Vec<String> = records
        .iter()
        .filter(|r| !window.contains(r.chrom, r.pos) || r.score > 2.0)
        .map(|r| r.line())
        .collect();
    assert_eq!(read_body(stitched.path()), expected);
}
