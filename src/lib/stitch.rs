//! Reassembly of a dataset around a repaired window.
//!
//! The stitched dataset is the original with the records of one window replaced by the
//! records of a repaired dataset:
//!
//! ```text
//! header | A: records before the window | B: repaired records | C: records after
//! ```
//!
//! A record is *before* the window if it lies on a chromosome that precedes the
//! window's chromosome in the file, or on the window's chromosome at a smaller position;
//! *after* is symmetric. Nothing is sorted.
//!
//! Only one toolkit stream is open at a time. The original is streamed up to the first
//! record that is not before the window and that stream is dropped; the repaired records
//! are spliced in; then the original is streamed again from the start and only the
//! records after the window are kept.

use std::path::Path;

use log::info;

use crate::dataset::{DatasetHandle, DatasetWriter};
use crate::errors::Result;
use crate::logging::{OperationTimer, format_count};
use crate::record_stream::{HeaderMode, RecordQuery, is_header_line, record_position};
use crate::toolkit::Toolkit;
use crate::window::Window;

/// Where a record of the original dataset lies relative to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Before,
    Inside,
    After,
}

/// Classifies records of a dataset read in file order.
struct Classifier<'a> {
    window: &'a Window,
    reached_window_chrom: bool,
}

impl Classifier<'_> {
    fn place(&mut self, chrom: &str, pos: u64) -> Placement {
        if chrom == self.window.chrom {
            self.reached_window_chrom = true;
            if pos < self.window.start {
                Placement::Before
            } else if pos <= self.window.end {
                Placement::Inside
            } else {
                Placement::After
            }
        } else if self.reached_window_chrom {
            Placement::After
        } else {
            Placement::Before
        }
    }
}

/// Build a new dataset from `original` with `window` replaced by `repaired`.
///
/// Header lines come from `original` only. Body records of `repaired` outside the
/// window are ignored.
///
/// # Errors
///
/// Returns an error if either dataset cannot be read, a record of `original` is
/// malformed, or the result cannot be written and indexed.
pub fn stitch<T: Toolkit>(
    toolkit: &T,
    original: &Path,
    window: &Window,
    repaired: &Path,
) -> Result<DatasetHandle> {
    let timer = OperationTimer::new(&format!("Stitching repaired window {window}"));
    let mut writer = DatasetWriter::create()?;

    let (before, reached) = write_before(toolkit, original, window, &mut writer)?;
    let repaired_count = splice(toolkit, repaired, window, &mut writer)?;
    let (replaced, after) =
        if reached { write_after(toolkit, original, window, &mut writer)? } else { (0, 0) };

    info!(
        "Stitched {} records before, {} repaired (replacing {}), {} after {window}",
        format_count(before),
        format_count(repaired_count),
        format_count(replaced),
        format_count(after)
    );
    timer.log_completion(before + repaired_count + after);
    writer.finish(toolkit)
}

/// Copy the header and region A of `original`.
///
/// Returns the number of records written and whether a record at or past the window
/// was seen. The stream is dropped, stopping its producer, as soon as one is.
fn write_before<T: Toolkit>(
    toolkit: &T,
    original: &Path,
    window: &Window,
    writer: &mut DatasetWriter,
) -> Result<(u64, bool)> {
    let mut classifier = Classifier { window, reached_window_chrom: false };
    let mut count = 0;
    for line in toolkit.view(original, &RecordQuery::everything())? {
        let line = line?;
        if is_header_line(&line) {
            writer.write_line(&line)?;
            continue;
        }
        let (chrom, pos) = record_position(&line)?;
        if classifier.place(chrom, pos) != Placement::Before {
            return Ok((count, true));
        }
        writer.write_line(&line)?;
        count += 1;
    }
    Ok((count, false))
}

/// Copy region C of `original`; returns the records skipped inside the window and the
/// records written.
fn write_after<T: Toolkit>(
    toolkit: &T,
    original: &Path,
    window: &Window,
    writer: &mut DatasetWriter,
) -> Result<(u64, u64)> {
    let mut classifier = Classifier { window, reached_window_chrom: false };
    let (mut replaced, mut after) = (0u64, 0u64);
    let body = RecordQuery { region: None, header: HeaderMode::Exclude };
    for line in toolkit.view(original, &body)? {
        let line = line?;
        let (chrom, pos) = record_position(&line)?;
        match classifier.place(chrom, pos) {
            Placement::Before => {}
            Placement::Inside => replaced += 1,
            Placement::After => {
                writer.write_line(&line)?;
                after += 1;
            }
        }
    }
    Ok((replaced, after))
}

/// Copy the repaired window's body records; returns how many were written.
fn splice<T: Toolkit>(
    toolkit: &T,
    repaired: &Path,
    window: &Window,
    writer: &mut DatasetWriter,
) -> Result<u64> {
    let mut count = 0;
    let query = RecordQuery::region(window.region(), HeaderMode::Exclude);
    for line in toolkit.view(repaired, &query)? {
        writer.write_line(&line?)?;
        count += 1;
    }
    Ok(count)
}
