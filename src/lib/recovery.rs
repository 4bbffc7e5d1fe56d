//! The recovery controller: run the job until it completes, repairing what stops it.
//!
//! ```text
//!            Completed
//! Running ─────────────▶ Done
//!   │  ▲ │ MemoryExhausted: grow heap, run again
//!   │  │ └──────────────▶ Running
//!   │  │
//!   │  └─ stitched dataset installed
//!   ▼ StallTimeout
//! Filtering(window)
//! ```
//!
//! Filtering drops the lowest-scoring records of the stalled window into a candidate
//! dataset and runs the job against the candidate alone until it completes, filtering
//! the candidate again after every further stall. The repaired window is then stitched
//! back into the working dataset and the full run starts over.
//!
//! There is no retry limit. A window that cannot be shrunk any further is an error, and
//! the operator interrupt cancels everything else.

use std::path::Path;
use std::process::ExitStatus;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::config::{HeapSize, JobConfig};
use crate::dataset::{DatasetHandle, normalize};
use crate::errors::{Result, WatchdogError};
use crate::interrupt::Interrupt;
use crate::job::PhasingCommand;
use crate::locus::LocusStore;
use crate::logging::format_count;
use crate::stitch::stitch;
use crate::supervisor::{RunOutcome, Supervisor};
use crate::toolkit::Toolkit;
use crate::window::{Window, WindowTracker};
use crate::window_filter::{FilteredWindow, filter_window};

/// States of the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Running,
    Filtering(Window),
    Done,
}

/// What a finished recovery did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoverySummary {
    /// Job runs started, on the full dataset or a candidate
    pub attempts: u64,
    /// Windows repaired and stitched back
    pub repairs: u64,
    /// Records handed to the locus store
    pub dropped: u64,
    pub heap_growths: u64,
    pub final_heap: HeapSize,
    /// Exit status of the run that completed; non-zero exits still complete
    pub final_status: Option<ExitStatus>,
    pub elapsed: Duration,
}

/// Drives the phasing job to completion.
///
/// Owns the working dataset, the current heap size and the locus store for the whole
/// run. The dataset handle is replaced after every repair; the superseded one is
/// dropped, removing its temporary files.
pub struct Watchdog<T: Toolkit, S: LocusStore> {
    config: JobConfig,
    toolkit: T,
    loci: S,
    supervisor: Supervisor,
    interrupt: Interrupt,
    tracker: WindowTracker,
    dataset: DatasetHandle,
    heap: HeapSize,
    attempts: u64,
    repairs: u64,
    dropped: u64,
    heap_growths: u64,
}

impl<T: Toolkit, S: LocusStore> Watchdog<T, S> {
    /// Validate `config` and normalize its input dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the dataset cannot be
    /// compressed or indexed.
    pub fn new(config: JobConfig, toolkit: T, loci: S, interrupt: Interrupt) -> Result<Self> {
        config.validate()?;
        interrupt.check()?;
        let dataset = normalize(&toolkit, &config.dataset)?;
        let supervisor =
            Supervisor::new(config.stall_timeout, config.poll_interval, interrupt.clone());
        let heap = config.heap;
        Ok(Self {
            config,
            toolkit,
            loci,
            supervisor,
            interrupt,
            tracker: WindowTracker::new(),
            dataset,
            heap,
            attempts: 0,
            repairs: 0,
            dropped: 0,
            heap_growths: 0,
        })
    }

    /// The current working dataset.
    #[must_use]
    pub fn dataset(&self) -> &DatasetHandle {
        &self.dataset
    }

    /// The heap size the next job run will use.
    #[must_use]
    pub fn heap(&self) -> HeapSize {
        self.heap
    }

    #[must_use]
    pub fn loci(&self) -> &S {
        &self.loci
    }

    /// Consume the controller, returning the working dataset and the locus store.
    #[must_use]
    pub fn into_parts(self) -> (DatasetHandle, S) {
        (self.dataset, self.loci)
    }

    /// Run the job until it completes.
    ///
    /// # Errors
    ///
    /// Returns [`WatchdogError::NoActiveWindow`] if the job stalls before announcing a
    /// window, [`WatchdogError::FilterNoProgress`] if a stalled window cannot be
    /// shrunk, [`WatchdogError::Interrupted`] on operator interrupt, and any error
    /// from running the job or the toolkit.
    pub fn run(&mut self) -> Result<RecoverySummary> {
        let started = Instant::now();
        let mut state = State::Running;
        while state != State::Done {
            self.interrupt.check()?;
            state = match state {
                State::Running => self.run_full()?,
                State::Filtering(window) => {
                    self.repair(&window)?;
                    State::Running
                }
                State::Done => State::Done,
            };
        }
        Ok(RecoverySummary {
            attempts: self.attempts,
            repairs: self.repairs,
            dropped: self.dropped,
            heap_growths: self.heap_growths,
            final_heap: self.heap,
            final_status: self.supervisor.last_exit_status(),
            elapsed: started.elapsed(),
        })
    }

    /// One run of the job on the working dataset.
    fn run_full(&mut self) -> Result<State> {
        let dataset = self.dataset.path().to_path_buf();
        match self.attempt(&dataset)? {
            RunOutcome::Completed => Ok(State::Done),
            RunOutcome::StallTimeout => {
                let window =
                    self.tracker.window().cloned().ok_or(WatchdogError::NoActiveWindow)?;
                warn!("Job stalled in window {window}; filtering it");
                Ok(State::Filtering(window))
            }
            RunOutcome::MemoryExhausted => {
                self.grow_heap();
                Ok(State::Running)
            }
        }
    }

    /// Shrink `window` until the job gets through it, then stitch it back.
    ///
    /// The window stays fixed for the whole repair, whatever the job announces while
    /// running on a candidate.
    fn repair(&mut self, window: &Window) -> Result<()> {
        let working = self.dataset.path().to_path_buf();
        let mut candidate = self.filter(&working, window)?;
        let mut passes = 1u64;
        loop {
            let path = candidate.dataset.path().to_path_buf();
            match self.attempt(&path)? {
                RunOutcome::Completed => break,
                RunOutcome::StallTimeout => {
                    self.interrupt.check()?;
                    passes += 1;
                    warn!("Job stalled on the filtered window {window}; filtering pass {passes}");
                    candidate = self.filter(&path, window)?;
                }
                RunOutcome::MemoryExhausted => self.grow_heap(),
            }
        }

        self.interrupt.check()?;
        let stitched =
            stitch(&self.toolkit, self.dataset.path(), window, candidate.dataset.path())?;
        info!(
            "Window {window} repaired after {passes} filtering pass(es); {} records remain in it",
            format_count(candidate.retained)
        );
        self.dataset = stitched;
        self.repairs += 1;
        Ok(())
    }

    /// One filtering pass over `window` of the dataset at `source`.
    fn filter(&mut self, source: &Path, window: &Window) -> Result<FilteredWindow> {
        let filtered = filter_window(
            &self.toolkit,
            source,
            window,
            &self.config.quality_field,
            self.config.drop_fraction,
            &self.config.dataset,
            &mut self.loci,
        )?;
        self.dropped += filtered.dropped;
        if filtered.dropped == 0 {
            return Err(WatchdogError::FilterNoProgress { window: window.clone() });
        }
        Ok(filtered)
    }

    fn attempt(&mut self, dataset: &Path) -> Result<RunOutcome> {
        self.interrupt.check()?;
        self.attempts += 1;
        let command = PhasingCommand::new(&self.config, self.heap, dataset);
        info!("Starting job attempt {} with -Xmx{}", self.attempts, self.heap);
        self.supervisor.run(command.to_command(), &command.artifacts(), &mut self.tracker)
    }

    fn grow_heap(&mut self) {
        let grown = self.heap.grow();
        warn!("Job ran out of memory with -Xmx{}; retrying with -Xmx{grown}", self.heap);
        self.heap = grown;
        self.heap_growths += 1;
    }
}
