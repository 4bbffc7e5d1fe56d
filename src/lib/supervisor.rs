//! Running the phasing job and classifying how it ended.
//!
//! The job is silent for long stretches when it is healthy and silent forever when it
//! is stuck, so the only stall signal is output cadence. Each of the job's output
//! streams is read on its own thread and forwarded line by line into a bounded channel.
//! The supervisor waits on that channel, the operator [`Interrupt`] and a poll timer
//! together: a line resets the stall counter, a timer tick advances it.

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded, never, select};
use log::{debug, error, info, warn};

use crate::errors::{Result, WatchdogError};
use crate::interrupt::Interrupt;
use crate::progress_line::{ProgressEvent, parse_progress_line};
use crate::toolkit::render;
use crate::window::WindowTracker;

/// Lines buffered between the stream readers and the supervisor.
const LINE_CHANNEL_CAPACITY: usize = 1024;

/// Step used while waiting for a job to exit after it reported running out of memory.
const EXIT_POLL_STEP: Duration = Duration::from_millis(50);

/// How a job run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Both output streams closed and the job exited.
    Completed,
    /// No output for at least the stall timeout; the job was killed.
    StallTimeout,
    /// The job reported an out-of-memory error.
    MemoryExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Stdout,
    Stderr,
}

#[derive(Debug)]
struct JobLine {
    origin: Origin,
    text: String,
}

enum Event {
    Line(JobLine),
    Closed,
    Interrupted,
    /// Every interrupt sender is gone.
    Disarmed,
    Tick,
}

/// Owns at most one running job and watches it.
#[derive(Debug)]
pub struct Supervisor {
    stall_timeout: Duration,
    poll_interval: Duration,
    interrupt: Interrupt,
    child: Option<Child>,
    stall_wait: Duration,
    last_exit: Option<ExitStatus>,
}

impl Supervisor {
    /// # Arguments
    /// * `stall_timeout` - Silence that counts as a stall
    /// * `poll_interval` - Longest single wait for output; the stall counter's resolution
    /// * `interrupt` - Operator cancellation token
    #[must_use]
    pub fn new(stall_timeout: Duration, poll_interval: Duration, interrupt: Interrupt) -> Self {
        Self {
            stall_timeout,
            poll_interval,
            interrupt,
            child: None,
            stall_wait: Duration::ZERO,
            last_exit: None,
        }
    }

    /// Time accumulated without output in the current (or last) run.
    #[must_use]
    pub fn stall_wait(&self) -> Duration {
        self.stall_wait
    }

    /// Exit status of the last run that ended with [`RunOutcome::Completed`].
    ///
    /// A job that exits non-zero still completes; this is how callers tell.
    #[must_use]
    pub fn last_exit_status(&self) -> Option<ExitStatus> {
        self.last_exit
    }

    /// Returns true while a job process is owned by the supervisor.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    /// Run `command` to a classified outcome.
    ///
    /// `tracker` is reset and then fed every progress event the job prints. On a stall
    /// the job is killed and every path in `artifacts` that exists is deleted.
    ///
    /// # Errors
    ///
    /// Returns [`WatchdogError::Interrupted`] without starting anything if the operator
    /// has already interrupted, [`WatchdogError::Spawn`] if the job cannot be started,
    /// [`WatchdogError::DataIntegrity`] if it prints a malformed progress line, and
    /// [`WatchdogError::Interrupted`] if the operator interrupts it. The job is killed
    /// in every error case.
    pub fn run(
        &mut self,
        mut command: Command,
        artifacts: &[PathBuf],
        tracker: &mut WindowTracker,
    ) -> Result<RunOutcome> {
        self.interrupt.check()?;
        tracker.reset();
        self.stall_wait = Duration::ZERO;
        self.last_exit = None;

        let rendered = render(&command);
        info!("Executing: {rendered}");
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| WatchdogError::Spawn {
                program: command.get_program().to_string_lossy().into_owned(),
                source,
            })?;

        let (sender, lines) = bounded(LINE_CHANNEL_CAPACITY);
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, Origin::Stdout, sender.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, Origin::Stderr, sender.clone());
        }
        drop(sender);
        self.child = Some(child);

        let result = self.watch(&lines, artifacts, tracker);
        if result.is_err() {
            self.terminate();
        }
        result
    }

    fn watch(
        &mut self,
        lines: &Receiver<JobLine>,
        artifacts: &[PathBuf],
        tracker: &mut WindowTracker,
    ) -> Result<RunOutcome> {
        let mut interrupts = self.interrupt.receiver().clone();
        loop {
            let event = if self.interrupt.is_triggered() {
                Event::Interrupted
            } else {
                select! {
                    recv(lines) -> msg => msg.map_or(Event::Closed, Event::Line),
                    recv(interrupts) -> msg => match msg {
                        Ok(()) => {
                            self.interrupt.latch();
                            Event::Interrupted
                        }
                        Err(_) => Event::Disarmed,
                    },
                    default(self.poll_interval) => Event::Tick,
                }
            };

            match event {
                Event::Line(line) => {
                    self.stall_wait = Duration::ZERO;
                    match line.origin {
                        Origin::Stdout => info!("[job] {}", line.text),
                        Origin::Stderr => warn!("[job] {}", line.text),
                    }
                    let progress = parse_progress_line(&line.text)?;
                    log_progress(&progress);
                    tracker.apply(&progress);
                    if progress == ProgressEvent::MemoryExhausted {
                        self.await_exit(self.poll_interval);
                        self.terminate();
                        return Ok(RunOutcome::MemoryExhausted);
                    }
                }
                Event::Tick => {
                    self.stall_wait += self.poll_interval;
                    debug!("No job output for {:?}", self.stall_wait);
                    if self.stall_wait >= self.stall_timeout {
                        warn!(
                            "Job produced no output for {:?}; killing it (window: {})",
                            self.stall_wait,
                            tracker.window().map_or_else(|| "none".to_string(), ToString::to_string)
                        );
                        self.terminate();
                        remove_artifacts(artifacts)?;
                        return Ok(RunOutcome::StallTimeout);
                    }
                }
                Event::Closed => {
                    if let Some(mut child) = self.child.take() {
                        let status = child.wait()?;
                        if status.success() {
                            info!("Job finished");
                        } else {
                            warn!("Job finished with {status}");
                        }
                        self.last_exit = Some(status);
                    }
                    return Ok(RunOutcome::Completed);
                }
                Event::Disarmed => interrupts = never(),
                Event::Interrupted => {
                    self.terminate();
                    return Err(WatchdogError::Interrupted);
                }
            }
        }
    }

    /// Give the job up to `limit` to exit on its own.
    fn await_exit(&mut self, limit: Duration) {
        let Some(child) = self.child.as_mut() else { return };
        let deadline = Instant::now() + limit;
        while Instant::now() < deadline {
            match child.try_wait() {
                Ok(None) => thread::sleep(EXIT_POLL_STEP.min(limit)),
                Ok(Some(_)) | Err(_) => return,
            }
        }
    }

    /// Kill and reap the job, if there is one.
    fn terminate(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                debug!("Kill failed (job already exited?): {e}");
            }
            if let Err(e) = child.wait() {
                error!("Failed to reap job process: {e}");
            }
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Forward each line of `pipe` into `sender` until the pipe closes or nobody listens.
fn forward_lines<R: Read + Send + 'static>(pipe: R, origin: Origin, sender: Sender<JobLine>) {
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf).trim_end().to_string();
                    if sender.send(JobLine { origin, text }).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

fn log_progress(event: &ProgressEvent) {
    match event {
        ProgressEvent::WindowAnnounced(window) => info!("Job entered window {window}"),
        ProgressEvent::ReferenceSamples(n) => info!("Reference samples: {n}"),
        ProgressEvent::StudySamples(n) => info!("Study samples: {n}"),
        ProgressEvent::StudyMarkers(n) => info!("Study markers in window: {n}"),
        ProgressEvent::MemoryExhausted => error!("Job ran out of memory"),
        ProgressEvent::Unrecognized => {}
    }
}

/// Delete the stale outputs of a killed job.
fn remove_artifacts(artifacts: &[PathBuf]) -> Result<()> {
    for path in artifacts {
        if path.exists() {
            info!("Removing partial output {}", path.display());
            std::fs::remove_file(path)?;
        }
    }
    Ok(())
}
