//! CLI command implementations for watchdog.
//!
//! - [`watch`] - Run a phasing job under supervision, repairing stalled windows
//! - [`filter_window`] - Filter and stitch one window by hand, without running a job

#![allow(
    clippy::cast_precision_loss,
    clippy::missing_errors_doc,
    clippy::uninlined_format_args
)]

pub mod command;
pub mod common;
pub mod filter_window;
pub mod watch;
