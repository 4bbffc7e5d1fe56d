//! Filter one window of a dataset by hand.
//!
//! Runs the same filtering pass and stitch the `watch` command applies to a stalled
//! window, without running a phasing job. Useful for pre-emptively repairing a window
//! known to stall, or for inspecting what a repair would drop.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use watchdog_lib::dataset::{normalize, persist};
use watchdog_lib::interrupt::Interrupt;
use watchdog_lib::logging::{format_count, format_percent};
use watchdog_lib::stitch::stitch;
use watchdog_lib::validation::validate_file_exists;
use watchdog_lib::window::Window;
use watchdog_lib::window_filter::filter_window;

use crate::commands::command::Command;
use crate::commands::common::{DroppedLociOptions, FilterOptions, ToolkitOptions};

/// Drop the lowest-scoring records of one window and write the stitched dataset.
#[derive(Debug, Parser)]
#[command(
    name = "filter-window",
    about = "\x1b[38;5;166m[UTILITIES]\x1b[0m      \x1b[36mFilter one window of a dataset without running Beagle\x1b[0m",
    long_about = r#"
Filter the records of one window and write the dataset with that window replaced.

Records in the window whose quality field falls below the --drop-fraction quantile of the
window's scores are removed. Records outside the window are copied unchanged and in order.

Example usage:
  watchdog filter-window -i cohort.vcf.gz -o cohort.filtered.vcf.gz --region chr20:60343-2990086
  watchdog filter-window -i cohort.vcf.gz -o out.vcf.gz --region chr1:1-500000 -f 0.1 \
      --dropped-loci dropped.jsonl
"#
)]
pub struct FilterWindow {
    /// Input dataset (VCF, optionally BGZF-compressed)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output dataset (BGZF-compressed VCF); its index is written alongside
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Window to filter, as chrom:start-end (1-based, inclusive)
    #[arg(long = "region")]
    pub region: Window,

    #[command(flatten)]
    pub filter: FilterOptions,

    #[command(flatten)]
    pub toolkit: ToolkitOptions,

    #[command(flatten)]
    pub dropped: DroppedLociOptions,
}

impl Command for FilterWindow {
    fn execute(&self, command_line: &str) -> Result<()> {
        info!("Command line: {command_line}");
        validate_file_exists(&self.input, "Input dataset")?;
        self.filter.validate()?;

        let interrupt = Interrupt::install()?;
        let toolkit = self.toolkit.toolkit(&interrupt);
        let mut store = self.dropped.store()?;
        let dataset = normalize(&toolkit, &self.input)
            .with_context(|| format!("Failed to prepare {}", self.input.display()))?;

        let filtered = filter_window(
            &toolkit,
            dataset.path(),
            &self.region,
            &self.filter.quality_field(),
            self.filter.drop_fraction,
            &self.input,
            &mut store,
        )?;
        if filtered.dropped == 0 {
            warn!("No records of {} scored below the cutoff; output equals input", self.region);
        } else {
            info!(
                "Dropped {} of {} records ({}) in {}",
                format_count(filtered.dropped),
                format_count(filtered.total()),
                format_percent(filtered.dropped as f64 / filtered.total() as f64, 2),
                self.region
            );
        }

        let stitched = stitch(&toolkit, dataset.path(), &self.region, filtered.dataset.path())?;
        persist(&stitched, &self.output)
            .with_context(|| format!("Failed to write {}", self.output.display()))?;
        info!("Wrote {}", self.output.display());
        Ok(())
    }
}
