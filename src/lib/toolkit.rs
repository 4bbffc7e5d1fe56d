//! The external genomic toolkit used to compress, index and query datasets.
//!
//! The watchdog never parses BGZF indexes itself: ranged queries are delegated to a
//! toolkit process (`bcftools` in production) and consumed through a
//! [`RecordStream`]. The [`Toolkit`] trait is the seam that lets tests substitute a
//! lighter-weight implementation.

use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{never, select};

use log::{debug, info, warn};
use noodles_bgzf::io::{Reader as BgzfReader, Writer as BgzfWriter};

use crate::dataset::is_compressed;
use crate::errors::{Result, WatchdogError};
use crate::interrupt::Interrupt;
use crate::record_stream::{HeaderMode, RecordQuery, RecordStream};

/// Operations the watchdog needs from a genomic toolkit.
pub trait Toolkit {
    /// Write a BGZF-compressed copy of the dataset at `input` to `output`.
    fn compress(&self, input: &Path, output: &Path) -> Result<()>;

    /// Build the index next to a compressed dataset.
    fn index(&self, path: &Path) -> Result<()>;

    /// Start streaming the lines selected by `query`.
    fn view(&self, path: &Path, query: &RecordQuery) -> Result<RecordStream>;
}

/// Longest wait between exit checks of a running toolkit command.
const COMMAND_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// `bcftools`-backed toolkit.
///
/// Every process it starts is killed when its [`Interrupt`] fires, and the operation
/// returns [`WatchdogError::Interrupted`].
#[derive(Debug, Clone)]
pub struct Bcftools {
    program: PathBuf,
    interrupt: Interrupt,
}

impl Default for Bcftools {
    fn default() -> Self {
        Self::new("bcftools")
    }
}

impl Bcftools {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), interrupt: Interrupt::never() }
    }

    /// Abandon running commands and streams when `interrupt` fires.
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.program);
        command.args(args);
        command
    }

    /// Run a command to completion, failing on a non-zero exit.
    fn run(&self, mut command: Command) -> Result<()> {
        self.interrupt.check()?;
        let rendered = render(&command);
        debug!("Executing: {rendered}");
        let mut child = command
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| WatchdogError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;
        let stderr = drain_stderr(&mut child);

        let mut interrupts = self.interrupt.receiver().clone();
        loop {
            if let Some(status) = child.try_wait()? {
                if status.success() {
                    return Ok(());
                }
                let stderr = stderr.and_then(|h| h.join().ok()).unwrap_or_default();
                return Err(WatchdogError::Toolkit { command: rendered, status, stderr });
            }
            if self.interrupt.is_triggered() {
                warn!("Stopping {rendered}");
                let _ = child.kill();
                child.wait()?;
                return Err(WatchdogError::Interrupted);
            }
            let disarmed = select! {
                recv(interrupts) -> msg => match msg {
                    Ok(()) => {
                        self.interrupt.latch();
                        false
                    }
                    Err(_) => true,
                },
                default(COMMAND_POLL_INTERVAL) => false,
            };
            if disarmed {
                interrupts = never();
            }
        }
    }
}

impl Toolkit for Bcftools {
    fn compress(&self, input: &Path, output: &Path) -> Result<()> {
        info!("Compressing {} into {}", input.display(), output.display());
        self.run(self.command([
            OsStr::new("view"),
            input.as_os_str(),
            OsStr::new("-Oz"),
            OsStr::new("-o"),
            output.as_os_str(),
        ]))
    }

    fn index(&self, path: &Path) -> Result<()> {
        info!("Indexing {}", path.display());
        self.run(self.command([OsStr::new("index"), path.as_os_str()]))
    }

    fn view(&self, path: &Path, query: &RecordQuery) -> Result<RecordStream> {
        let mut command = self.command(["view"]);
        if query.header == HeaderMode::Exclude {
            command.arg("-H");
        }
        command.arg(path);
        if let Some(region) = &query.region {
            command.arg("-r").arg(region.to_string());
        }
        self.interrupt.check()?;
        Ok(spawn_stream(command, query.clone())?.with_interrupt(self.interrupt.clone()))
    }
}

/// In-process toolkit that scans BGZF datasets without an index.
///
/// Region queries read the dataset from the start, so this only suits small datasets
/// and environments without `bcftools`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanToolkit;

impl Toolkit for ScanToolkit {
    fn compress(&self, input: &Path, output: &Path) -> Result<()> {
        info!("Compressing {} into {}", input.display(), output.display());
        let mut reader = BufReader::new(File::open(input)?);
        let mut writer = BgzfWriter::new(BufWriter::new(File::create(output)?));
        io::copy(&mut reader, &mut writer)?;
        writer.finish()?.flush()?;
        Ok(())
    }

    fn index(&self, path: &Path) -> Result<()> {
        debug!("Not indexing {}; queries scan the whole file", path.display());
        Ok(())
    }

    fn view(&self, path: &Path, query: &RecordQuery) -> Result<RecordStream> {
        let file = File::open(path)?;
        if is_compressed(path) {
            Ok(RecordStream::from_reader(BgzfReader::new(file), query.clone()))
        } else {
            Ok(RecordStream::from_reader(file, query.clone()))
        }
    }
}

/// Spawn `command` and stream its standard output.
///
/// Standard error is drained on a separate thread so a chatty tool cannot block on a
/// full pipe; it is reported if the process fails.
///
/// # Errors
///
/// Returns [`WatchdogError::Spawn`] if the process cannot be started.
pub fn spawn_stream(mut command: Command, query: RecordQuery) -> Result<RecordStream> {
    let rendered = render(&command);
    info!("Executing: {rendered}");
    let mut child =
        command.stdout(Stdio::piped()).stderr(Stdio::piped()).spawn().map_err(|source| {
            WatchdogError::Spawn {
                program: command.get_program().to_string_lossy().into_owned(),
                source,
            }
        })?;
    let stdout = child.stdout.take().ok_or_else(|| {
        WatchdogError::Io(std::io::Error::other("child process has no stdout pipe"))
    })?;
    let stderr = drain_stderr(&mut child);
    Ok(RecordStream::from_child(child, stdout, stderr, rendered, query))
}

/// Collect a child's standard error on a separate thread.
fn drain_stderr(child: &mut Child) -> Option<JoinHandle<String>> {
    child.stderr.take().map(|mut pipe| {
        thread::spawn(move || {
            let mut bytes = Vec::new();
            let _ = pipe.read_to_end(&mut bytes);
            String::from_utf8_lossy(&bytes).trim().to_string()
        })
    })
}

/// Render a command as a single line for logs and error messages.
#[must_use]
pub fn render(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|s| s.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}
