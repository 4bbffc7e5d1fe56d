//! Grammar for the phasing job's progress stream.
//!
//! Each line of Beagle's standard output maps to exactly one [`ProgressEvent`]. Prefixes
//! are checked in priority order; once a prefix matches, the rest of the line must match
//! its full form, otherwise the job is speaking a dialect we do not understand and the
//! line is rejected as a [`WatchdogError::DataIntegrity`] error.

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{Result, WatchdogError};
use crate::window::Window;

const WINDOW_PREFIX: &str = "Window";
const REFERENCE_SAMPLES_PREFIX: &str = "Reference samples:";
const STUDY_SAMPLES_PREFIX: &str = "Study samples:";
const STUDY_MARKERS_PREFIX: &str = "Study markers:";
/// Marker Beagle prints when the JVM runs out of heap.
pub const OUT_OF_MEMORY_PREFIX: &str = "ERROR: java.lang.OutOfMemoryError:";

static WINDOW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Window \d+ \(([^:]+):(\d+)-(\d+)\)").expect("window pattern is valid")
});
static REFERENCE_SAMPLES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Reference samples:\s+([\d,]+)$").expect("reference pattern is valid")
});
static STUDY_SAMPLES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Study samples:\s+([\d,]+)$").expect("study samples pattern is valid")
});
static STUDY_MARKERS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Study markers:\s+([\d,]+)$").expect("study markers pattern is valid")
});

/// A structured event extracted from one progress line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The job started a new window.
    WindowAnnounced(Window),
    /// Number of samples in the reference panel.
    ReferenceSamples(u64),
    /// Number of samples in the target dataset.
    StudySamples(u64),
    /// Number of target markers in the current window.
    StudyMarkers(u64),
    /// The JVM reported heap exhaustion.
    MemoryExhausted,
    /// Anything else; callers ignore it.
    Unrecognized,
}

/// Parse one line of the job's output.
///
/// # Errors
///
/// Returns [`WatchdogError::DataIntegrity`] when a line starts with a known prefix but
/// its body or numeric payload is malformed.
///
/// # Example
/// ```
/// use watchdog_lib::progress_line::{parse_progress_line, ProgressEvent};
///
/// let event = parse_progress_line("Study markers:      12,345").unwrap();
/// assert_eq!(event, ProgressEvent::StudyMarkers(12_345));
/// ```
pub fn parse_progress_line(line: &str) -> Result<ProgressEvent> {
    let line = line.trim_end();

    if line.starts_with(WINDOW_PREFIX) {
        let caps = WINDOW_RE.captures(line).ok_or_else(|| malformed(line))?;
        let start = parse_count(&caps[2], line)?;
        let end = parse_count(&caps[3], line)?;
        return Ok(ProgressEvent::WindowAnnounced(Window::new(&caps[1], start, end)));
    }
    if line.starts_with(REFERENCE_SAMPLES_PREFIX) {
        return capture_count(&REFERENCE_SAMPLES_RE, line).map(ProgressEvent::ReferenceSamples);
    }
    if line.starts_with(STUDY_SAMPLES_PREFIX) {
        return capture_count(&STUDY_SAMPLES_RE, line).map(ProgressEvent::StudySamples);
    }
    if line.starts_with(STUDY_MARKERS_PREFIX) {
        return capture_count(&STUDY_MARKERS_RE, line).map(ProgressEvent::StudyMarkers);
    }
    if line.starts_with(OUT_OF_MEMORY_PREFIX) {
        return Ok(ProgressEvent::MemoryExhausted);
    }
    Ok(ProgressEvent::Unrecognized)
}

fn capture_count(re: &Regex, line: &str) -> Result<u64> {
    let caps = re.captures(line).ok_or_else(|| malformed(line))?;
    parse_count(&caps[1], line)
}

/// Parse an integer that may carry thousands separators.
fn parse_count(digits: &str, line: &str) -> Result<u64> {
    let cleaned: String = digits.chars().filter(|c| *c != ',').collect();
    cleaned.parse::<u64>().map_err(|_| malformed(line))
}

fn malformed(line: &str) -> WatchdogError {
    WatchdogError::data_integrity(format!(
        "unexpected progress line from phasing job (incompatible version?): '{line}'"
    ))
}
