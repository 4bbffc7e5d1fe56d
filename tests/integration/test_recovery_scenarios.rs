//! End-to-end recovery scenarios against the fake job.

use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use watchdog_lib::errors::WatchdogError;
use watchdog_lib::interrupt::Interrupt;
use watchdog_lib::locus::{DroppedLocus, FeatureKind};
use watchdog_lib::recovery::Watchdog;
use watchdog_lib::toolkit::ScanToolkit;
use watchdog_lib::window::Window;

use crate::helpers::{
    FAKE_WINDOW, FakeBeagle, TestRecord, dataset_arg, read_body, standard_records, write_vcf,
};

fn in_window(line: &str) -> bool {
    let window: Window = FAKE_WINDOW.parse().unwrap();
    let mut fields = line.split('\t');
    let chrom = fields.next().unwrap();
    let pos: u64 = fields.next().unwrap().parse().unwrap();
    window.contains(chrom, pos)
}

#[test]
fn test_one_stall_then_success() {
    let dir = TempDir::new().unwrap();
    let fake = FakeBeagle::install(dir.path());
    let mut records = standard_records();
    // The lowest-scoring record in the window is the one the job cannot get past.
    records[1] = records[1].clone().poisoned();
    let input = write_vcf(dir.path(), "input.vcf", &records);
    let original_body = read_body(&input);

    let mut watchdog = Watchdog::new(
        fake.config(dir.path(), input.clone()),
        ScanToolkit,
        Vec::<DroppedLocus>::new(),
        Interrupt::never(),
    )
    .unwrap();
    let summary = watchdog.run().unwrap();

    // Full run stalls, the filtered window completes, the stitched run completes.
    assert_eq!(summary.attempts, 3);
    assert_eq!(summary.repairs, 1);
    assert_eq!(summary.dropped, 1);
    assert_eq!(summary.heap_growths, 0);

    let calls = fake.calls();
    assert_eq!(calls.len(), 3);
    assert_ne!(dataset_arg(&calls[0]), dataset_arg(&calls[1]));
    assert_ne!(dataset_arg(&calls[1]), dataset_arg(&calls[2]));

    let repaired_body = read_body(watchdog.dataset().path());
    let outside = |body: &[String]| -> Vec<String> {
        body.iter().filter(|l| !in_window(l)).cloned().collect()
    };
    assert_eq!(outside(&repaired_body), outside(&original_body));
    let inside_before = original_body.iter().filter(|l| in_window(l)).count();
    let inside_after = repaired_body.iter().filter(|l| in_window(l)).count();
    assert_eq!(inside_after, inside_before - 1);
    assert!(repaired_body.iter().all(|l| !l.contains("POISON")));
    // Order is preserved: the repaired body is the original minus the dropped record.
    let expected: Vec<String> =
        original_body.iter().filter(|l| !l.contains("POISON")).cloned().collect();
    assert_eq!(repaired_body, expected);

    let loci = watchdog.loci();
    assert_eq!(loci.len(), 1);
    assert_eq!((loci[0].chromosome.as_str(), loci[0].start, loci[0].end), ("chr1", 100, 100));
    assert_eq!(loci[0].feature, FeatureKind::PointVariant);
    assert_eq!(loci[0].source, input);
    assert_eq!(loci[0].name.as_deref(), Some("id100"));
    assert_eq!(loci[0].attributes["POISON"], "true");
}

#[test]
fn test_repeated_stalls_refilter_the_same_window() {
    let dir = TempDir::new().unwrap();
    let fake = FakeBeagle::install(dir.path());
    let mut records = standard_records();
    // Scores 1 and 2: the first pass only drops score 1, so the candidate stalls again.
    records[1] = records[1].clone().poisoned();
    records[2] = records[2].clone().poisoned();
    let input = write_vcf(dir.path(), "input.vcf", &records);

    let mut watchdog = Watchdog::new(
        fake.config(dir.path(), input),
        ScanToolkit,
        Vec::<DroppedLocus>::new(),
        Interrupt::never(),
    )
    .unwrap();
    let summary = watchdog.run().unwrap();

    assert_eq!(summary.repairs, 1);
    assert_eq!(summary.dropped, 2);
    // Full stall, candidate stall, second candidate completes, stitched run completes.
    assert_eq!(summary.attempts, 4);
    let starts: Vec<u64> = watchdog.loci().iter().map(|l| l.start).collect();
    assert_eq!(starts, vec![100, 120]);
    assert_eq!(read_body(watchdog.dataset().path()).len(), records.len() - 2);
}

#[test]
fn test_clean_dataset_is_not_touched() {
    let dir = TempDir::new().unwrap();
    let fake = FakeBeagle::install(dir.path());
    let records: Vec<TestRecord> = standard_records();
    let input = write_vcf(dir.path(), "input.vcf", &records);

    let mut watchdog = Watchdog::new(
        fake.config(dir.path(), input.clone()),
        ScanToolkit,
        Vec::<DroppedLocus>::new(),
        Interrupt::never(),
    )
    .unwrap();
    let summary = watchdog.run().unwrap();
    assert_eq!((summary.attempts, summary.repairs, summary.dropped), (1, 0, 0));
    assert_eq!(read_body(watchdog.dataset().path()), read_body(&input));
}

#[test]
fn test_interrupt_stops_a_stalled_job_promptly() {
    let dir = TempDir::new().unwrap();
    let fake = FakeBeagle::install(dir.path());
    let mut records = standard_records();
    records[1] = records[1].clone().poisoned();
    let input = write_vcf(dir.path(), "input.vcf", &records);

    let mut config = fake.config(dir.path(), input);
    config.stall_timeout = Duration::from_secs(60);
    let (sender, interrupt) = Interrupt::pair();
    let mut watchdog =
        Watchdog::new(config, ScanToolkit, Vec::<DroppedLocus>::new(), interrupt).unwrap();

    let trigger = thread::spawn(move || {
        thread::sleep(Duration::from_millis(500));
        sender.send(()).unwrap();
    });
    let started = Instant::now();
    let err = watchdog.run().unwrap_err();
    trigger.join().unwrap();

    assert!(matches!(err, WatchdogError::Interrupted));
    assert!(started.elapsed() < Duration::from_secs(10));
}
