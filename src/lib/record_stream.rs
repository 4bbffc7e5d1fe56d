//! Lazy, range-bounded streaming of dataset lines.
//!
//! A [`RecordStream`] pulls text lines from a source (normally the standard output of a
//! toolkit process) one at a time. A reader thread forwards lines through a small
//! bounded channel, so the whole output is never buffered. The consumer waits on that
//! channel and on the operator [`Interrupt`] together: an interrupt ends the stream
//! with [`WatchdogError::Interrupted`] even while the producer is silent, and the
//! producing process is killed and reaped as soon as the stream stops early.
//!
//! Region queries on an indexed VCF return every record *overlapping* the region, so a
//! deletion starting just before a window shows up in both neighbouring queries. The
//! stream therefore also narrows body lines to those whose `POS` lies in the region,
//! which makes adjacent ranges partition a dataset exactly.
//!
//! Lines are decoded lossily: stray non-UTF-8 bytes (latin-1 in a header description,
//! say) become U+FFFD rather than failing the read.

use std::fmt;
use std::io::{self, BufRead, BufReader, Read};
use std::process::{Child, ChildStdout};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, bounded, never, select};

use crate::errors::{Result, WatchdogError};
use crate::interrupt::Interrupt;

/// Lines buffered between the reader thread and the consumer.
const LINE_BUFFER: usize = 256;

/// A 1-based, inclusive genomic range; `end == None` runs to the end of the chromosome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub chrom: String,
    pub start: u64,
    pub end: Option<u64>,
}

impl Region {
    /// A region with both bounds.
    #[must_use]
    pub fn closed(chrom: impl Into<String>, start: u64, end: u64) -> Self {
        Self { chrom: chrom.into(), start, end: Some(end) }
    }

    /// A region running from `start` to the end of the chromosome.
    #[must_use]
    pub fn from_start(chrom: impl Into<String>, start: u64) -> Self {
        Self { chrom: chrom.into(), start, end: None }
    }

    /// Returns true if a record at `chrom:pos` starts inside this region.
    #[must_use]
    pub fn contains(&self, chrom: &str, pos: u64) -> bool {
        self.chrom == chrom && pos >= self.start && self.end.is_none_or(|end| pos <= end)
    }
}

/// Renders the region in `chrom:start-end` form understood by htslib tools.
impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}:{}-{}", self.chrom, self.start, end),
            None => write!(f, "{}:{}-", self.chrom, self.start),
        }
    }
}

/// Whether header (`#`) lines are part of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderMode {
    Include,
    Exclude,
}

/// What to read from a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    /// Restrict body lines to this region; `None` reads the whole dataset.
    pub region: Option<Region>,
    pub header: HeaderMode,
}

impl RecordQuery {
    /// Every line of the dataset, header included.
    #[must_use]
    pub fn everything() -> Self {
        Self { region: None, header: HeaderMode::Include }
    }

    #[must_use]
    pub fn region(region: Region, header: HeaderMode) -> Self {
        Self { region: Some(region), header }
    }
}

/// Returns true for VCF meta-information and column header lines.
#[must_use]
pub fn is_header_line(line: &str) -> bool {
    line.starts_with('#')
}

/// The chromosome and position of a VCF body line.
///
/// # Errors
///
/// Returns [`WatchdogError::DataIntegrity`] if the line has fewer than two columns or
/// its `POS` column is not a number.
pub fn record_position(line: &str) -> Result<(&str, u64)> {
    let mut fields = line.splitn(3, '\t');
    let chrom = fields.next().unwrap_or_default();
    let pos = fields.next().ok_or_else(|| {
        WatchdogError::data_integrity(format!("VCF record has no POS column: '{line}'"))
    })?;
    let pos = pos.parse::<u64>().map_err(|_| {
        WatchdogError::data_integrity(format!("VCF record has a non-numeric POS '{pos}'"))
    })?;
    Ok((chrom, pos))
}

/// The process feeding a [`RecordStream`], with a thread collecting its stderr.
struct Producer {
    child: Child,
    command: String,
    stderr: Option<JoinHandle<String>>,
}

impl Producer {
    /// Wait for the process and turn an unsuccessful exit into an error.
    fn finish(mut self) -> Result<()> {
        let status = self.child.wait()?;
        let stderr = self.stderr.take().and_then(|h| h.join().ok()).unwrap_or_default();
        if status.success() {
            Ok(())
        } else {
            Err(WatchdogError::Toolkit { command: self.command.clone(), status, stderr })
        }
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        // Only reached when the consumer stopped early or finish() already reaped it.
        if matches!(self.child.try_wait(), Ok(None)) {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Pull-based iterator over the lines of a dataset query.
pub struct RecordStream {
    lines: Receiver<io::Result<String>>,
    query: RecordQuery,
    producer: Option<Producer>,
    interrupt: Interrupt,
    done: bool,
}

impl RecordStream {
    /// Stream the output of a spawned process.
    ///
    /// The child's stdout must be piped and already taken as `stdout`. `stderr` is the
    /// handle of a thread draining the child's standard error, reported on failure.
    #[must_use]
    pub fn from_child(
        child: Child,
        stdout: ChildStdout,
        stderr: Option<JoinHandle<String>>,
        command: String,
        query: RecordQuery,
    ) -> Self {
        let mut stream = Self::from_reader(stdout, query);
        stream.producer = Some(Producer { child, command, stderr });
        stream
    }

    /// Stream the lines of any reader.
    #[must_use]
    pub fn from_reader<R: Read + Send + 'static>(reader: R, query: RecordQuery) -> Self {
        Self {
            lines: forward_lines(reader),
            query,
            producer: None,
            interrupt: Interrupt::never(),
            done: false,
        }
    }

    /// Stop with [`WatchdogError::Interrupted`] when `interrupt` fires.
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Wait for the next raw line; `None` at end of input.
    fn read_line(&mut self) -> Result<Option<String>> {
        let lines = self.lines.clone();
        let mut interrupts = self.interrupt.receiver().clone();
        loop {
            self.interrupt.check()?;
            let disarmed = select! {
                recv(lines) -> msg => return match msg {
                    Ok(Ok(line)) => Ok(Some(line)),
                    Ok(Err(e)) => Err(e.into()),
                    Err(_) => Ok(None),
                },
                recv(interrupts) -> msg => match msg {
                    Ok(()) => {
                        self.interrupt.latch();
                        false
                    }
                    Err(_) => true,
                },
            };
            if disarmed {
                interrupts = never();
            }
        }
    }

    /// Decide whether a raw line belongs to the query.
    fn selects(&self, line: &str) -> Result<bool> {
        if line.is_empty() {
            return Ok(false);
        }
        if is_header_line(line) {
            return Ok(self.query.header == HeaderMode::Include);
        }
        match &self.query.region {
            None => Ok(true),
            Some(region) => {
                let (chrom, pos) = record_position(line)?;
                Ok(region.contains(chrom, pos))
            }
        }
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        while let Some(line) = self.read_line()? {
            if self.selects(&line)? {
                return Ok(Some(line));
            }
        }
        if let Some(producer) = self.producer.take() {
            producer.finish()?;
        }
        Ok(None)
    }
}

/// Read `reader` line by line on its own thread.
///
/// The thread stops at end of input, after a read error, or once the stream is dropped.
fn forward_lines<R: Read + Send + 'static>(reader: R) -> Receiver<io::Result<String>> {
    let (sender, receiver) = bounded(LINE_BUFFER);
    thread::spawn(move || {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let line = match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => Ok(decode(&buf)),
                Err(e) => Err(e),
            };
            let failed = line.is_err();
            if sender.send(line).is_err() || failed {
                break;
            }
        }
    });
    receiver
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim_end_matches(['\n', '\r']).to_string()
}

impl Iterator for RecordStream {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_line() {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                // Kills the producer if it is still running.
                self.producer = None;
                Some(Err(e))
            }
        }
    }
}
