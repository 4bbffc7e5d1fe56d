//! Integration tests for watchdog.
//!
//! These tests drive the recovery controller end to end against shell-script
//! stand-ins for the JVM, and check properties of the dataset plumbing that span
//! several modules.

mod helpers;
mod test_cli;
mod test_dataset_properties;
mod test_recovery_scenarios;
