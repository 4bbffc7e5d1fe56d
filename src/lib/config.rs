//! Job configuration.
//!
//! [`JobConfig`] is everything the watchdog needs to drive one phasing run. It is
//! immutable for the lifetime of a run; the only parameter that changes during recovery,
//! the heap size, is tracked separately by the recovery controller starting from
//! [`JobConfig::heap`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{Result, WatchdogError};
use crate::validation::{validate_file_exists, validate_fraction, validate_positive};

/// Units added to the heap on every out-of-memory failure.
pub const HEAP_GROWTH_UNITS: u64 = 10;

/// A JVM heap size such as `5g`: a magnitude and a unit suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapSize {
    magnitude: u64,
    unit: char,
}

impl HeapSize {
    /// Create a heap size; `unit` must be one of `k`, `m`, `g`, `t` (either case).
    ///
    /// # Errors
    /// Returns an error for an unknown unit or a zero magnitude.
    pub fn new(magnitude: u64, unit: char) -> Result<Self> {
        let unit = unit.to_ascii_lowercase();
        if !matches!(unit, 'k' | 'm' | 'g' | 't') {
            return Err(WatchdogError::InvalidParameter {
                parameter: "heap".to_string(),
                reason: format!("unknown unit '{unit}', expected one of k, m, g, t"),
            });
        }
        if magnitude == 0 {
            return Err(WatchdogError::InvalidParameter {
                parameter: "heap".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(Self { magnitude, unit })
    }

    #[must_use]
    pub fn magnitude(&self) -> u64 {
        self.magnitude
    }

    #[must_use]
    pub fn unit(&self) -> char {
        self.unit
    }

    /// The heap size after one out-of-memory failure.
    ///
    /// # Example
    /// ```
    /// use watchdog_lib::config::HeapSize;
    ///
    /// let heap: HeapSize = "5g".parse().unwrap();
    /// assert_eq!(heap.grow().to_string(), "15g");
    /// ```
    #[must_use]
    pub fn grow(self) -> Self {
        Self { magnitude: self.magnitude.saturating_add(HEAP_GROWTH_UNITS), unit: self.unit }
    }
}

impl FromStr for HeapSize {
    type Err = WatchdogError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || WatchdogError::InvalidParameter {
            parameter: "heap".to_string(),
            reason: format!("expected a size like '5g', got '{s}'"),
        };
        let unit = s.chars().last().ok_or_else(invalid)?;
        let digits = &s[..s.len() - unit.len_utf8()];
        let magnitude = digits.parse::<u64>().map_err(|_| invalid())?;
        Self::new(magnitude, unit)
    }
}

impl fmt::Display for HeapSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.magnitude, self.unit)
    }
}

/// How the quality field's value is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldType {
    #[default]
    Float,
    Integer,
}

impl FromStr for FieldType {
    type Err = WatchdogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "float" => Ok(Self::Float),
            "integer" | "int" => Ok(Self::Integer),
            other => Err(WatchdogError::InvalidParameter {
                parameter: "quality-field-type".to_string(),
                reason: format!("expected 'float' or 'integer', got '{other}'"),
            }),
        }
    }
}

/// The INFO attribute used to rank records within a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityField {
    pub name: String,
    pub kind: FieldType,
}

impl QualityField {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldType) -> Self {
        Self { name: name.into(), kind }
    }

    /// Parse a raw attribute value into a score.
    ///
    /// # Errors
    /// Returns [`WatchdogError::DataIntegrity`] if the value does not parse as the
    /// configured type.
    pub fn score(&self, raw: &str) -> Result<f64> {
        let parsed = match self.kind {
            FieldType::Float => raw.parse::<f64>().ok().filter(|v| !v.is_nan()),
            FieldType::Integer => raw.parse::<i64>().ok().map(|v| v as f64),
        };
        parsed.ok_or_else(|| {
            WatchdogError::data_integrity(format!(
                "INFO field '{}' has value '{raw}', which is not a valid {:?}",
                self.name, self.kind
            ))
        })
    }
}

impl Default for QualityField {
    fn default() -> Self {
        Self::new("VQSLOD", FieldType::Float)
    }
}

/// Everything needed to run and supervise one phasing job.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Input dataset to phase
    pub dataset: PathBuf,
    /// Prefix for the job's `.vcf.gz` and `.log` outputs
    pub out_prefix: PathBuf,
    /// Reference panel; when set the job imputes
    pub reference: Option<PathBuf>,
    /// Window size passed to the job
    pub window_size: f64,
    /// Overlap between adjacent windows
    pub overlap: f64,
    /// Threads used by the job
    pub nthreads: usize,
    /// Initial JVM heap
    pub heap: HeapSize,
    /// Silence longer than this is a stall
    pub stall_timeout: Duration,
    /// How long one read of the job's output may block
    pub poll_interval: Duration,
    pub quality_field: QualityField,
    /// Fraction of lowest-scoring records removed per filtering pass
    pub drop_fraction: f64,
    /// JVM launcher
    pub runtime: PathBuf,
    /// Beagle jar
    pub jar: PathBuf,
}

impl JobConfig {
    /// Check every invariant of the configuration.
    ///
    /// # Errors
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<()> {
        validate_file_exists(&self.dataset, "Input dataset")?;
        if let Some(reference) = &self.reference {
            validate_file_exists(reference, "Reference dataset")?;
        }
        validate_file_exists(&self.jar, "Beagle jar")?;
        validate_positive(self.window_size, "window")?;
        if !(self.overlap >= 0.0 && self.overlap < self.window_size) {
            return Err(WatchdogError::InvalidParameter {
                parameter: "overlap".to_string(),
                reason: format!(
                    "must be >= 0 and smaller than the window ({}), got {}",
                    self.window_size, self.overlap
                ),
            });
        }
        if self.nthreads == 0 {
            return Err(WatchdogError::InvalidParameter {
                parameter: "threads".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        validate_fraction(self.drop_fraction, "drop-fraction")?;
        if self.poll_interval.is_zero() {
            return Err(WatchdogError::InvalidParameter {
                parameter: "poll-interval".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.stall_timeout < self.poll_interval {
            return Err(WatchdogError::InvalidParameter {
                parameter: "timeout".to_string(),
                reason: format!(
                    "must be at least the poll interval ({:?}), got {:?}",
                    self.poll_interval, self.stall_timeout
                ),
            });
        }
        Ok(())
    }
}
