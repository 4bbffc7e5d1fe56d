//! Tracking of the phasing job's current window.
//!
//! Beagle announces each window it starts with a `Window <n> (<chrom>:<start>-<end>)`
//! line and follows it with sample and marker counts. The [`WindowTracker`] folds those
//! [`ProgressEvent`]s into the state the recovery controller needs when a stall happens.

use std::fmt;
use std::str::FromStr;

use crate::errors::WatchdogError;
use crate::progress_line::ProgressEvent;
use crate::record_stream::Region;

/// A genomic window as announced by the phasing job (1-based, inclusive).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Window {
    /// Chromosome/contig name
    pub chrom: String,
    /// First position covered by the window
    pub start: u64,
    /// Last position covered by the window
    pub end: u64,
}

impl Window {
    #[must_use]
    pub fn new(chrom: impl Into<String>, start: u64, end: u64) -> Self {
        Self { chrom: chrom.into(), start, end }
    }

    /// Returns true if `pos` on `chrom` lies inside the window.
    #[must_use]
    pub fn contains(&self, chrom: &str, pos: u64) -> bool {
        self.chrom == chrom && (self.start..=self.end).contains(&pos)
    }

    /// The closed query region covering exactly this window.
    #[must_use]
    pub fn region(&self) -> Region {
        Region::closed(self.chrom.clone(), self.start, self.end)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.start, self.end)
    }
}

/// Parses `chrom:start-end`; the chromosome may itself contain colons.
impl FromStr for Window {
    type Err = WatchdogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| WatchdogError::InvalidParameter {
            parameter: "region".to_string(),
            reason: format!("{reason}, got '{s}'"),
        };
        let (chrom, range) =
            s.rsplit_once(':').ok_or_else(|| invalid("expected chrom:start-end"))?;
        let (start, end) = range.split_once('-').ok_or_else(|| invalid("expected start-end"))?;
        let start: u64 = start.trim().parse().map_err(|_| invalid("start is not a number"))?;
        let end: u64 = end.trim().parse().map_err(|_| invalid("end is not a number"))?;
        if chrom.is_empty() || start == 0 || start > end {
            return Err(invalid("expected a non-empty chromosome and 1 <= start <= end"));
        }
        Ok(Self::new(chrom, start, end))
    }
}

/// Mutable record of the job's announced window and progress counters.
///
/// Only valid while a job is running; [`WindowTracker::reset`] is called at the start of
/// each run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowTracker {
    window: Option<Window>,
    reference_samples: Option<u64>,
    study_samples: Option<u64>,
    markers: Option<u64>,
}

impl WindowTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything learned from a previous run.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Fold one progress event into the tracked state.
    ///
    /// A window announcement replaces the window bounds and clears the per-window
    /// marker count. Events that carry no window information are ignored.
    pub fn apply(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::WindowAnnounced(window) => {
                self.window = Some(window.clone());
                self.markers = None;
            }
            ProgressEvent::ReferenceSamples(n) => self.reference_samples = Some(*n),
            ProgressEvent::StudySamples(n) => self.study_samples = Some(*n),
            ProgressEvent::StudyMarkers(n) => self.markers = Some(*n),
            ProgressEvent::MemoryExhausted | ProgressEvent::Unrecognized => {}
        }
    }

    /// The most recently announced window, if any.
    #[must_use]
    pub fn window(&self) -> Option<&Window> {
        self.window.as_ref()
    }

    #[must_use]
    pub fn reference_samples(&self) -> Option<u64> {
        self.reference_samples
    }

    #[must_use]
    pub fn study_samples(&self) -> Option<u64> {
        self.study_samples
    }

    /// Marker count of the current window.
    #[must_use]
    pub fn markers(&self) -> Option<u64> {
        self.markers
    }
}
