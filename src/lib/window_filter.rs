//! Quality filtering of the records inside one window.
//!
//! A stalled window is repaired by removing its least confident records: every record
//! whose quality score falls below the `drop_fraction` quantile of the window's scores
//! is dropped and handed to a [`LocusStore`]; the rest are written, in their original
//! order and under the original header, to a new dataset.
//!
//! The window is read twice through the toolkit: once to collect scores for the
//! cutoff, once to partition. Only the scores are held in memory.

use std::path::Path;

use log::info;

use crate::config::QualityField;
use crate::dataset::{DatasetHandle, DatasetWriter};
use crate::errors::{Result, WatchdogError};
use crate::locus::{DroppedLocus, LocusStore, parse_info};
use crate::logging::{OperationTimer, format_count, format_percent};
use crate::quantile::quantile;
use crate::record_stream::{HeaderMode, RecordQuery, is_header_line};
use crate::toolkit::Toolkit;
use crate::window::Window;

/// Result of one filtering pass.
#[derive(Debug)]
pub struct FilteredWindow {
    /// Header plus retained records, compressed and indexed
    pub dataset: DatasetHandle,
    pub retained: u64,
    pub dropped: u64,
    /// Records scoring below this value were dropped
    pub cutoff: f64,
}

impl FilteredWindow {
    /// Number of records in the window before filtering.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.retained + self.dropped
    }
}

/// Read the quality score of a VCF body line.
///
/// # Errors
///
/// Returns [`WatchdogError::DataIntegrity`] if the line has no INFO column, the field is
/// absent or `.`, or its value does not parse as the field's type.
pub fn record_score(line: &str, field: &QualityField) -> Result<f64> {
    let mut columns = line.split('\t');
    let locus = || {
        let mut cols = line.split('\t');
        format!("{}:{}", cols.next().unwrap_or("?"), cols.next().unwrap_or("?"))
    };
    let info = columns.nth(7).ok_or_else(|| {
        WatchdogError::data_integrity(format!("record {} has no INFO column", locus()))
    })?;
    let raw = parse_info(info)
        .find(|(key, _)| *key == field.name)
        .and_then(|(_, value)| value)
        .filter(|value| *value != ".")
        .ok_or_else(|| {
            WatchdogError::data_integrity(format!(
                "record {} is missing INFO field '{}'",
                locus(),
                field.name
            ))
        })?;
    field.score(raw)
}

/// Filter the records of `window` in the dataset at `source`.
///
/// # Arguments
/// * `toolkit` - Toolkit used to read `source` and index the output
/// * `source` - Normalized dataset to read the window from
/// * `window` - Region to filter
/// * `field` - INFO field ranking the records
/// * `drop_fraction` - Quantile below which records are dropped
/// * `provenance` - Original input path recorded on every dropped locus
/// * `loci` - Receives each dropped record as it is dropped
///
/// # Errors
///
/// Returns [`WatchdogError::FilterNoProgress`] if the window holds no records, a
/// [`WatchdogError::DataIntegrity`] error for any record without a usable score, and
/// any toolkit or I/O error.
pub fn filter_window<T, S>(
    toolkit: &T,
    source: &Path,
    window: &Window,
    field: &QualityField,
    drop_fraction: f64,
    provenance: &Path,
    loci: &mut S,
) -> Result<FilteredWindow>
where
    T: Toolkit,
    S: LocusStore + ?Sized,
{
    let timer = OperationTimer::new(&format!("Filtering window {window}"));

    let body = RecordQuery::region(window.region(), HeaderMode::Exclude);
    let mut scores = Vec::new();
    for line in toolkit.view(source, &body)? {
        scores.push(record_score(&line?, field)?);
    }
    let cutoff = quantile(&scores, drop_fraction)
        .ok_or_else(|| WatchdogError::FilterNoProgress { window: window.clone() })?;
    info!(
        "Window {window} holds {} records; dropping those with {} < {cutoff} (the {} quantile)",
        format_count(scores.len() as u64),
        field.name,
        format_percent(drop_fraction, 1)
    );
    drop(scores);

    let mut writer = DatasetWriter::create()?;
    let mut retained = 0u64;
    let mut dropped = 0u64;
    let everything = RecordQuery::region(window.region(), HeaderMode::Include);
    for line in toolkit.view(source, &everything)? {
        let line = line?;
        if is_header_line(&line) {
            writer.write_line(&line)?;
        } else if record_score(&line, field)? >= cutoff {
            writer.write_line(&line)?;
            retained += 1;
        } else {
            loci.add_locus(DroppedLocus::from_vcf_line(&line, provenance)?)?;
            dropped += 1;
        }
    }
    loci.flush()?;

    let dataset = writer.finish(toolkit)?;
    timer.log_completion(retained + dropped);
    info!(
        "Window {window}: retained {}, dropped {}",
        format_count(retained),
        format_count(dropped)
    );

    Ok(FilteredWindow { dataset, retained, dropped, cutoff })
}
