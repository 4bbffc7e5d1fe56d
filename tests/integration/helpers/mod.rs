//! Helper utilities for integration tests.

pub mod fake_toolkit;
pub mod vcf;

pub use fake_job::*;
pub use fake_toolkit::*;
pub use vcf::*;
