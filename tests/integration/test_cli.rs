//! Tests of the `watchdog` binary.
//!
//! Dataset operations go through a shell-script stand-in for `bcftools`, and the job
//! through the fake JVM, so these run without either tool installed.

use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use watchdog_lib::locus::DroppedLocus;

use crate::helpers::{FakeBcftools, FakeBeagle, read_body, standard_records, write_vcf};

fn watchdog() -> Command {
    Command::new(env!("CARGO_BIN_EXE_watchdog"))
}

fn read_loci(path: &std::path::Path) -> Vec<DroppedLocus> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

/// Poll `ready` until it holds or `limit` passes.
fn wait_until(limit: Duration, mut ready: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < limit {
        if ready() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    ready()
}

fn send_sigint(child: &Child) {
    let status = Command::new("kill").args(["-INT", &child.id().to_string()]).status().unwrap();
    assert!(status.success());
}

/// Wait for `child` to exit, killing it and failing the test after `limit`.
fn wait_within(child: &mut Child, limit: Duration) -> ExitStatus {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        if start.elapsed() > limit {
            let _ = child.kill();
            let _ = child.wait();
            panic!("watchdog still running after {limit:?}");
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// A `watch` invocation of `fake` on `input`, with the given timeout in seconds.
fn watch_command(
    dir: &std::path::Path,
    fake: &FakeBeagle,
    toolkit: &FakeBcftools,
    input: &std::path::Path,
    timeout: &str,
) -> Command {
    let mut command = watchdog();
    command
        .args(["watch", "--poll-interval", "0.05", "--timeout", timeout, "-i"])
        .arg(input)
        .arg("-o")
        .arg(dir.join("phased"))
        .arg("--jar")
        .arg(&fake.jar)
        .arg("--java")
        .arg(&fake.runtime)
        .arg("--bcftools")
        .arg(&toolkit.program);
    command
}

#[test]
fn test_help_lists_subcommands() {
    let output = watchdog().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("watch"));
    assert!(stdout.contains("filter-window"));
}

#[test]
fn test_watch_without_jar_fails() {
    let dir = TempDir::new().unwrap();
    let input = write_vcf(dir.path(), "input.vcf", &standard_records());
    let output = watchdog()
        .env_remove("BEAGLE_JAR")
        .args(["watch", "-i"])
        .arg(&input)
        .arg("-o")
        .arg(dir.path().join("phased"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("jar"));
}

#[test]
fn test_filter_window_rejects_bad_region() {
    let output = watchdog()
        .args(["filter-window", "-i", "in.vcf", "-o", "out.vcf.gz", "--region", "chr1:500-100"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_filter_window_drops_low_scoring_records() {
    let dir = TempDir::new().unwrap();
    let toolkit = FakeBcftools::install(dir.path(), false);
    let records = standard_records();
    let input = write_vcf(dir.path(), "input.vcf", &records);
    let output_path = dir.path().join("filtered.vcf.gz");
    let loci_path = dir.path().join("dropped.jsonl");

    let output = watchdog()
        .args(["filter-window", "--region", "chr1:100-500", "--drop-fraction", "0.1", "-i"])
        .arg(&input)
        .arg("-o")
        .arg(&output_path)
        .arg("--dropped-loci")
        .arg(&loci_path)
        .arg("--bcftools")
        .arg(&toolkit.program)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    // Scores 1..=20: the 10% quantile is 2.9, so scores 1 and 2 go.
    let body = read_body(&output_path);
    assert_eq!(body.len(), records.len() - 2);
    let loci = read_loci(&loci_path);
    let starts: Vec<u64> = loci.iter().map(|l| l.start).collect();
    assert_eq!(starts, vec![100, 120]);
    assert!(loci.iter().all(|l| l.source == input));
}

#[test]
fn test_filter_window_runs_one_view_at_a_time() {
    let dir = TempDir::new().unwrap();
    let toolkit = FakeBcftools::install(dir.path(), false);
    let input = write_vcf(dir.path(), "input.vcf", &standard_records());

    let output = watchdog()
        .args(["filter-window", "--region", "chr1:100-500", "-i"])
        .arg(&input)
        .arg("-o")
        .arg(dir.path().join("filtered.vcf.gz"))
        .arg("--bcftools")
        .arg(&toolkit.program)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    // Two filtering passes plus the stitch's reads of the original and repaired window.
    let views = toolkit.invocations().iter().filter(|i| i.starts_with("view")).count();
    assert!(views >= 4, "expected the filter and stitch views, saw {views}");
    assert!(toolkit.overlaps().is_empty(), "overlapping views: {:?}", toolkit.overlaps());
}

#[test]
fn test_watch_repairs_a_stalling_window() {
    let dir = TempDir::new().unwrap();
    let fake = FakeBeagle::install(dir.path());
    let toolkit = FakeBcftools::install(dir.path(), false);
    let mut records = standard_records();
    records[1] = records[1].clone().poisoned();
    let input = write_vcf(dir.path(), "input.vcf", &records);
    let repaired = dir.path().join("repaired.vcf.gz");
    let loci_path = dir.path().join("dropped.jsonl");

    let output = watch_command(dir.path(), &fake, &toolkit, &input, "0.5")
        .arg("--repaired-output")
        .arg(&repaired)
        .arg("--dropped-loci")
        .arg(&loci_path)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    assert_eq!(fake.calls().len(), 3);
    let body = read_body(&repaired);
    assert_eq!(body.len(), records.len() - 1);
    assert!(body.iter().all(|l| !l.contains("POISON")));
    let loci = read_loci(&loci_path);
    assert_eq!(loci.len(), 1);
    assert_eq!(loci[0].start, 100);
    assert!(toolkit.overlaps().is_empty(), "overlapping views: {:?}", toolkit.overlaps());
}

#[test]
fn test_watch_sigint_while_job_hangs_exits_130() {
    let dir = TempDir::new().unwrap();
    let fake = FakeBeagle::install(dir.path());
    let toolkit = FakeBcftools::install(dir.path(), false);
    let mut records = standard_records();
    records[1] = records[1].clone().poisoned();
    let input = write_vcf(dir.path(), "input.vcf", &records);

    let mut child = watch_command(dir.path(), &fake, &toolkit, &input, "60")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    assert!(wait_until(Duration::from_secs(10), || !fake.calls().is_empty()));
    std::thread::sleep(Duration::from_millis(200));

    send_sigint(&child);
    let status = wait_within(&mut child, Duration::from_secs(5));
    assert_eq!(status.code(), Some(130));
    assert_eq!(fake.calls().len(), 1);
}

#[test]
fn test_watch_sigint_during_filtering_exits_130() {
    let dir = TempDir::new().unwrap();
    let fake = FakeBeagle::install(dir.path());
    let toolkit = FakeBcftools::install(dir.path(), true);
    let mut records = standard_records();
    records[1] = records[1].clone().poisoned();
    let input = write_vcf(dir.path(), "input.vcf", &records);

    let mut child = watch_command(dir.path(), &fake, &toolkit, &input, "0.3")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    // The job stalls, and the first region view of the filter never finishes.
    let filtering = || toolkit.invocations().iter().any(|i| i.contains(" -r "));
    assert!(wait_until(Duration::from_secs(10), filtering));
    std::thread::sleep(Duration::from_millis(200));

    send_sigint(&child);
    let status = wait_within(&mut child, Duration::from_secs(5));
    assert_eq!(status.code(), Some(130));
    assert_eq!(fake.calls().len(), 1);
}
