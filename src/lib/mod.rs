#![deny(unsafe_code)]
// Clippy lint configuration for CI
// These lints are allowed because:
// - cast_*: Counts and genomic positions are converted to f64 for quantiles and rates
// - missing_*_doc: Documentation improvements tracked separately
// - needless_pass_by_value: Some APIs designed for ownership transfer
// - module_name_repetitions: Types like `WindowTracker` read better in full
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args
)]

//! # watchdog - supervision and recovery for Beagle phasing jobs
//!
//! Beagle can hang indefinitely on a genomic window with pathological input. This
//! library runs the job, notices when its output stops, works out which window it was
//! stuck in, removes the least confident records from that window and runs it again,
//! until the whole dataset phases.
//!
//! ## Overview
//!
//! ### Watching the job
//!
//! - **[`progress_line`]** - Parses the job's progress output into events
//! - **[`window`]** - Tracks the window the job is currently working on
//! - **[`supervisor`]** - Runs the job and classifies how it ended
//! - **[`job`]** - Builds the job's command line
//! - **[`interrupt`]** - Operator cancellation
//!
//! ### Repairing the input
//!
//! - **[`window_filter`]** - Drops the lowest-scoring records of a window
//! - **[`quantile`]** - The interpolated quantile used as the cutoff
//! - **[`locus`]** - Dropped-record annotations and where they are stored
//! - **[`stitch`]** - Splices a repaired window back into the dataset
//! - **[`record_stream`]** / **[`toolkit`]** - Lazy, range-bounded dataset reads
//! - **[`dataset`]** - Compressed, indexed working datasets
//!
//! ### Control
//!
//! - **[`recovery`]** - The state machine tying everything together
//! - **[`config`]** - Validated job configuration
//! - **[`errors`]**, **[`validation`]**, **[`logging`]**
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::PathBuf;
//! use std::time::Duration;
//!
//! use watchdog_lib::config::{JobConfig, QualityField};
//! use watchdog_lib::interrupt::Interrupt;
//! use watchdog_lib::locus::DiscardLocusStore;
//! use watchdog_lib::recovery::Watchdog;
//! use watchdog_lib::toolkit::Bcftools;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = JobConfig {
//!     dataset: PathBuf::from("cohort.vcf.gz"),
//!     out_prefix: PathBuf::from("cohort.phased"),
//!     reference: None,
//!     window_size: 0.1,
//!     overlap: 0.01,
//!     nthreads: 4,
//!     heap: "5g".parse()?,
//!     stall_timeout: Duration::from_secs(60),
//!     poll_interval: Duration::from_secs(1),
//!     quality_field: QualityField::default(),
//!     drop_fraction: 0.05,
//!     runtime: PathBuf::from("java"),
//!     jar: PathBuf::from("beagle.jar"),
//! };
//! let mut watchdog =
//!     Watchdog::new(config, Bcftools::default(), DiscardLocusStore::default(), Interrupt::install()?)?;
//! let summary = watchdog.run()?;
//! println!("{} repairs", summary.repairs);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dataset;
pub mod errors;
pub mod interrupt;
pub mod job;
pub mod locus;
pub mod logging;
pub mod progress_line;
pub mod quantile;
pub mod record_stream;
pub mod recovery;
pub mod stitch;
pub mod supervisor;
pub mod toolkit;
pub mod validation;
pub mod window;
pub mod window_filter;

pub use errors::{Result, WatchdogError};
