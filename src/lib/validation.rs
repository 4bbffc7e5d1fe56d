//! Input validation utilities
//!
//! Common checks for job parameters and input paths, reported through the structured
//! error types in [`crate::errors`].

use std::path::Path;

use crate::errors::{Result, WatchdogError};

/// Validate that a file exists
///
/// # Arguments
/// * `path` - Path to validate
/// * `description` - Human-readable description of the file (e.g., "Input VCF", "Beagle jar")
///
/// # Errors
/// Returns a configuration error if the file does not exist
///
/// # Example
/// ```
/// use watchdog_lib::validation::validate_file_exists;
///
/// let result = validate_file_exists("/nonexistent/input.vcf.gz", "Input VCF");
/// assert!(result.is_err());
/// ```
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        return Err(WatchdogError::configuration(format!(
            "{description} '{}' does not exist",
            path_ref.display()
        )));
    }
    Ok(())
}

/// Validate that a fraction lies in the half-open interval `[0, 1)`.
///
/// # Errors
/// Returns an error if the value is negative, at least one, or NaN.
///
/// # Example
/// ```
/// use watchdog_lib::validation::validate_fraction;
///
/// assert!(validate_fraction(0.05, "drop-fraction").is_ok());
/// assert!(validate_fraction(0.0, "drop-fraction").is_ok());
/// assert!(validate_fraction(1.0, "drop-fraction").is_err());
/// ```
pub fn validate_fraction(value: f64, name: &str) -> Result<()> {
    if !(0.0..1.0).contains(&value) {
        return Err(WatchdogError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("must be in [0, 1), got {value}"),
        });
    }
    Ok(())
}

/// Validate that a value is strictly positive (and finite).
///
/// # Errors
/// Returns an error if the value is zero, negative, infinite or NaN.
pub fn validate_positive(value: f64, name: &str) -> Result<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(WatchdogError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("must be > 0, got {value}"),
        });
    }
    Ok(())
}
