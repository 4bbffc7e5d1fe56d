//! Utilities for generating and reading small VCF datasets.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use watchdog_lib::record_stream::{RecordQuery, is_header_line};
use watchdog_lib::toolkit::{ScanToolkit, Toolkit};

/// Meta-information and column header lines written by [`write_vcf`].
pub const HEADER: &str = "##fileformat=VCFv4.2\n\
    ##INFO=<ID=VQSLOD,Number=1,Type=Float,Description=\"Log odds of being a true variant\">\n\
    ##INFO=<ID=POISON,Number=0,Type=Flag,Description=\"Stalls the fake job\">\n\
    #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO";

/// One body record of a test dataset.
#[derive(Debug, Clone)]
pub struct TestRecord {
    pub chrom: &'static str,
    pub pos: u64,
    pub score: f64,
    /// Marks the record the fake job cannot get past
    pub poison: bool,
}

impl TestRecord {
    #[must_use]
    pub fn new(chrom: &'static str, pos: u64, score: f64) -> Self {
        Self { chrom, pos, score, poison: false }
    }

    #[must_use]
    pub fn poisoned(mut self) -> Self {
        self.poison = true;
        self
    }

    /// The record rendered as a VCF body line.
    #[must_use]
    pub fn line(&self) -> String {
        let flag = if self.poison { ";POISON" } else { "" };
        format!(
            "{}\t{}\tid{}\tA\tG\t50\tPASS\tVQSLOD={}{flag}",
            self.chrom, self.pos, self.pos, self.score
        )
    }
}

/// Write an uncompressed VCF with [`HEADER`] and `records` in the given order.
pub fn write_vcf(dir: &Path, name: &str, records: &[TestRecord]) -> PathBuf {
    let mut text = format!("{HEADER}\n");
    for record in records {
        writeln!(text, "{}", record.line()).unwrap();
    }
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

/// All lines of a (plain or BGZF) dataset.
pub fn read_lines(path: &Path) -> Vec<String> {
    ScanToolkit.view(path, &RecordQuery::everything()).unwrap().map(|l| l.unwrap()).collect()
}

/// Body lines only.
pub fn read_body(path: &Path) -> Vec<String> {
    read_lines(path).into_iter().filter(|l| !is_header_line(l)).collect()
}

/// Twenty records at chr1:100..=480 scored 1..=20, plus records either side of them
/// and on a second chromosome.
pub fn standard_records() -> Vec<TestRecord> {
    let mut records = vec![TestRecord::new("chr1", 50, -3.0)];
    records.extend(
        (0..20u32).map(|i| TestRecord::new("chr1", 100 + 20 * u64::from(i), f64::from(i + 1))),
    );
    records.push(TestRecord::new("chr1", 600, -5.0));
    records.push(TestRecord::new("chr2", 10, -7.0));
    records
}
