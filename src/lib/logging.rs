//! Formatting helpers for log output.
//!
//! Progress of the phasing job itself is logged by the supervisor as it arrives; this
//! module covers the watchdog's own work: timing filter and stitch passes and
//! summarizing a finished recovery.

use std::time::{Duration, Instant};

use crate::recovery::RecoverySummary;

/// Formats a fraction (0.0-1.0) as a percentage with `decimals` decimal places.
///
/// # Examples
///
/// ```
/// use watchdog_lib::logging::format_percent;
///
/// assert_eq!(format_percent(0.05, 1), "5.0%");
/// assert_eq!(format_percent(1.0, 0), "100%");
/// ```
#[must_use]
pub fn format_percent(value: f64, decimals: usize) -> String {
    format!("{:.decimals$}%", value * 100.0, decimals = decimals)
}

/// Formats a duration in human-readable form (e.g. "45s", "2m 15s", "1h 30m").
///
/// # Examples
///
/// ```
/// use watchdog_lib::logging::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(135)), "2m 15s");
/// ```
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        let mins = secs / 60;
        let remaining_secs = secs % 60;
        if remaining_secs == 0 { format!("{mins}m") } else { format!("{mins}m {remaining_secs}s") }
    } else {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if mins == 0 { format!("{hours}h") } else { format!("{hours}h {mins}m") }
    }
}

/// Formats a count with thousands separators.
///
/// # Examples
///
/// ```
/// use watchdog_lib::logging::format_count;
///
/// assert_eq!(format_count(12_345), "12,345");
/// assert_eq!(format_count(999), "999");
/// ```
#[must_use]
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Formats a processing rate, e.g. "1,000 records/s".
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_rate(count: u64, duration: Duration, unit: &str) -> String {
    let secs = duration.as_secs_f64();
    if secs < 0.001 {
        return format!("{} {unit}/s", format_count(count));
    }

    let rate = count as f64 / secs;
    if rate >= 1.0 {
        format!("{} {unit}/s", format_count(rate as u64))
    } else {
        let per_min = count as f64 / (secs / 60.0);
        format!("{per_min:.1} {unit}/min")
    }
}

/// Logs the outcome of a finished recovery run.
pub fn log_recovery_summary(summary: &RecoverySummary) {
    log::info!("Recovery Summary:");
    log::info!("  Job attempts: {}", format_count(summary.attempts));
    log::info!("  Windows repaired: {}", format_count(summary.repairs));
    log::info!("  Records dropped: {}", format_count(summary.dropped));
    log::info!("  Heap growths: {}", format_count(summary.heap_growths));
    log::info!("  Final heap: {}", summary.final_heap);
    log::info!("  Elapsed: {}", format_duration(summary.elapsed));
    if let Some(status) = summary.final_status.filter(|s| !s.success()) {
        log::warn!("  Final job run exited with {status}; check its log for errors");
    }
}

/// Operation timing helper.
///
/// # Examples
///
/// ```no_run
/// use watchdog_lib::logging::OperationTimer;
///
/// let timer = OperationTimer::new("Filtering chr20:1-5000");
/// // ... do work ...
/// timer.log_completion(10_000);
/// ```
pub struct OperationTimer {
    operation: String,
    start_time: Instant,
}

impl OperationTimer {
    /// Creates a new operation timer and logs the start.
    #[must_use]
    pub fn new(operation: &str) -> Self {
        log::info!("{operation} ...");
        Self { operation: operation.to_string(), start_time: Instant::now() }
    }

    /// Time since the timer started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Logs the completion with a record count and rate.
    pub fn log_completion(&self, records: u64) {
        let duration = self.elapsed();
        log::info!(
            "{} completed: {} records in {} ({})",
            self.operation,
            format_count(records),
            format_duration(duration),
            format_rate(records, duration, "records")
        );
    }
}
