//! Custom error types for watchdog operations.
//!
//! Stalls and out-of-memory failures of the phasing job are not errors: they are
//! [`RunOutcome`](crate::supervisor::RunOutcome) values the recovery controller acts on.
//! Everything here is fatal to a run.

use std::process::ExitStatus;

use thiserror::Error;

use crate::window::Window;

/// Result type alias for watchdog operations
pub type Result<T> = std::result::Result<T, WatchdogError>;

/// Error type for watchdog operations
#[derive(Error, Debug)]
pub enum WatchdogError {
    /// Input data or job output that cannot be interpreted
    #[error("Data integrity error: {message}")]
    DataIntegrity {
        /// Description of the malformed data
        message: String,
    },

    /// Missing or unusable startup configuration
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the problem
        message: String,
    },

    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// An external process could not be started
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        /// The program that failed to start
        program: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A toolkit invocation exited unsuccessfully
    #[error("Toolkit command '{command}' failed ({status}): {stderr}")]
    Toolkit {
        /// The rendered command line
        command: String,
        /// Exit status of the process
        status: ExitStatus,
        /// Captured standard error
        stderr: String,
    },

    /// The job stalled before announcing any window
    #[error("Job stalled before announcing a window; cannot localize the stall")]
    NoActiveWindow,

    /// A filtering pass removed nothing, so retrying would loop forever
    #[error("Filtering window {window} dropped no records; cannot make progress")]
    FilterNoProgress {
        /// The window being repaired
        window: Window,
    },

    /// The operator interrupted the run
    #[error("Interrupted by operator")]
    Interrupted,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchdogError {
    /// Create a data integrity error with a message
    pub fn data_integrity(message: impl Into<String>) -> Self {
        Self::DataIntegrity { message: message.into() }
    }

    /// Create a configuration error with a message
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }
}
