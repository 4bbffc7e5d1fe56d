//! Run a Beagle phasing job under supervision.
//!
//! The job is restarted with a larger heap when it runs out of memory, and a window it
//! stalls on is filtered of its lowest-scoring records until the job gets through.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use watchdog_lib::config::{HeapSize, JobConfig};
use watchdog_lib::dataset::persist;
use watchdog_lib::errors::WatchdogError;
use watchdog_lib::interrupt::Interrupt;
use watchdog_lib::logging::{OperationTimer, log_recovery_summary};
use watchdog_lib::recovery::Watchdog;
use watchdog_lib::validation::validate_positive;

use crate::commands::command::Command;
use crate::commands::common::{DroppedLociOptions, FilterOptions, ToolkitOptions};

/// Run Beagle and recover from stalls and out-of-memory failures.
#[derive(Debug, Parser)]
#[command(
    name = "watch",
    about = "\x1b[38;5;30m[PHASING]\x1b[0m        \x1b[36mRun Beagle under supervision, repairing stalled windows\x1b[0m",
    long_about = r#"
Run a Beagle phasing/imputation job and keep it running to completion.

The job's output is watched line by line. If it prints nothing for --timeout seconds it
is considered stalled: it is killed, the window it was working on is located from its
progress output, and the records of that window whose quality field falls in the lowest
--drop-fraction are removed. The job is then run on the filtered window alone (filtering
again if it stalls again), the filtered window is stitched back into the dataset, and the
full job is restarted.

If the job runs out of memory it is restarted with 10 more units of heap.

Example usage:
  watchdog watch -i cohort.vcf.gz -o cohort.phased --jar beagle.jar
  BEAGLE_JAR=beagle.jar watchdog watch -i cohort.vcf -o out -r ref.vcf.gz --heap 20g \
      --dropped-loci dropped.jsonl --repaired-output cohort.repaired.vcf.gz
"#
)]
pub struct Watch {
    /// Input dataset (VCF, optionally BGZF-compressed)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output prefix passed to Beagle
    #[arg(short = 'o', long = "out")]
    pub out_prefix: PathBuf,

    /// Reference panel; enables imputation
    #[arg(short = 'r', long = "reference")]
    pub reference: Option<PathBuf>,

    /// Beagle jar
    #[arg(long = "jar", env = "BEAGLE_JAR")]
    pub jar: Option<PathBuf>,

    /// Java executable
    #[arg(long = "java", default_value = "java")]
    pub runtime: PathBuf,

    /// Beagle window size
    #[arg(long = "window", default_value = "0.1")]
    pub window: f64,

    /// Beagle window overlap
    #[arg(long = "overlap", default_value = "0.01")]
    pub overlap: f64,

    /// Threads used by Beagle
    #[arg(short = 't', long = "threads", default_value = "4")]
    pub threads: usize,

    /// Initial Java heap size, e.g. 5g
    #[arg(long = "heap", default_value = "5g")]
    pub heap: HeapSize,

    /// Seconds without output before the job counts as stalled
    #[arg(long = "timeout", default_value = "60")]
    pub timeout: f64,

    /// Seconds between checks for new output
    #[arg(long = "poll-interval", default_value = "1")]
    pub poll_interval: f64,

    #[command(flatten)]
    pub filter: FilterOptions,

    #[command(flatten)]
    pub toolkit: ToolkitOptions,

    #[command(flatten)]
    pub dropped: DroppedLociOptions,

    /// Also write the final repaired input dataset here (only if a window was repaired)
    #[arg(long = "repaired-output")]
    pub repaired_output: Option<PathBuf>,
}

impl Watch {
    /// Build the job configuration from the command line.
    fn job_config(&self) -> Result<JobConfig> {
        let jar = self.jar.clone().ok_or_else(|| {
            WatchdogError::configuration("no Beagle jar given: pass --jar or set BEAGLE_JAR")
        })?;
        Ok(JobConfig {
            dataset: self.input.clone(),
            out_prefix: self.out_prefix.clone(),
            reference: self.reference.clone(),
            window_size: self.window,
            overlap: self.overlap,
            nthreads: self.threads,
            heap: self.heap,
            stall_timeout: seconds(self.timeout, "timeout")?,
            poll_interval: seconds(self.poll_interval, "poll-interval")?,
            quality_field: self.filter.quality_field(),
            drop_fraction: self.filter.drop_fraction,
            runtime: self.runtime.clone(),
            jar,
        })
    }
}

fn seconds(value: f64, name: &str) -> Result<Duration> {
    validate_positive(value, name)?;
    Duration::try_from_secs_f64(value).with_context(|| format!("invalid --{name}: {value}"))
}

impl Command for Watch {
    fn execute(&self, command_line: &str) -> Result<()> {
        info!("Command line: {command_line}");
        self.filter.validate()?;
        let config = self.job_config()?;
        let timer = OperationTimer::new("Supervising phasing job");

        let interrupt = Interrupt::install()?;
        let store = self.dropped.store()?;
        let toolkit = self.toolkit.toolkit(&interrupt);
        let mut watchdog = Watchdog::new(config, toolkit, store, interrupt)
            .context("Failed to prepare the phasing job")?;
        let summary = watchdog.run()?;
        log_recovery_summary(&summary);

        if let Some(destination) = &self.repaired_output {
            if summary.repairs > 0 {
                persist(watchdog.dataset(), destination).with_context(|| {
                    format!("Failed to write repaired dataset to {}", destination.display())
                })?;
                info!("Wrote repaired dataset to {}", destination.display());
            } else {
                info!("No window needed repair; not writing {}", destination.display());
            }
        }
        timer.log_completion(summary.dropped);
        Ok(())
    }
}
