//! Annotated loci for records dropped by window filtering.
//!
//! Every record removed from a window is described as a [`DroppedLocus`] and handed to a
//! [`LocusStore`] as soon as it is dropped. The watchdog keeps no copy.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, WatchdogError};

/// The kind of genomic feature a dropped record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureKind {
    /// A variant occupying a single position (`start == end`).
    PointVariant,
}

/// A positional annotation describing a dropped variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedLocus {
    pub chromosome: String,
    pub start: u64,
    pub end: u64,
    pub feature: FeatureKind,
    /// The dataset the record was originally read from
    pub source: PathBuf,
    /// The record's ID, when it has one
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    /// INFO attributes copied verbatim; flags map to `"true"`
    pub attributes: BTreeMap<String, String>,
}

impl DroppedLocus {
    /// Describe the VCF body line `line` as a dropped point variant.
    ///
    /// # Errors
    ///
    /// Returns [`WatchdogError::DataIntegrity`] if the line has fewer than eight columns
    /// or a non-numeric position.
    pub fn from_vcf_line(line: &str, source: &Path) -> Result<Self> {
        let fields: Vec<&str> = line.splitn(9, '\t').collect();
        if fields.len() < 8 {
            return Err(WatchdogError::data_integrity(format!(
                "VCF record has {} columns, expected at least 8: '{line}'",
                fields.len()
            )));
        }
        let position = fields[1].parse::<u64>().map_err(|_| {
            WatchdogError::data_integrity(format!(
                "VCF record has a non-numeric POS '{}'",
                fields[1]
            ))
        })?;
        let name = (fields[2] != ".").then(|| fields[2].to_string());
        let attributes = parse_info(fields[7])
            .map(|(key, value)| (key.to_string(), value.unwrap_or("true").to_string()))
            .collect();

        Ok(Self {
            chromosome: fields[0].to_string(),
            start: position,
            end: position,
            feature: FeatureKind::PointVariant,
            source: source.to_path_buf(),
            name,
            attributes,
        })
    }
}

/// Split an INFO column into `(key, value)` pairs; flags have no value.
///
/// A bare `.` (no attributes) yields nothing.
pub fn parse_info(info: &str) -> impl Iterator<Item = (&str, Option<&str>)> {
    info.split(';').filter(|entry| !entry.is_empty() && *entry != ".").map(|entry| {
        match entry.split_once('=') {
            Some((key, value)) => (key, Some(value)),
            None => (entry, None),
        }
    })
}

/// Destination for dropped loci.
pub trait LocusStore {
    /// Take ownership of one dropped locus.
    fn add_locus(&mut self, locus: DroppedLocus) -> Result<()>;

    /// Make everything added so far durable.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<L: LocusStore + ?Sized> LocusStore for Box<L> {
    fn add_locus(&mut self, locus: DroppedLocus) -> Result<()> {
        (**self).add_locus(locus)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Keeps loci in memory, in the order they were dropped.
impl LocusStore for Vec<DroppedLocus> {
    fn add_locus(&mut self, locus: DroppedLocus) -> Result<()> {
        self.push(locus);
        Ok(())
    }
}

/// Logs loci at debug level and keeps nothing.
#[derive(Debug, Default)]
pub struct DiscardLocusStore {
    count: u64,
}

impl DiscardLocusStore {
    /// Number of loci seen.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl LocusStore for DiscardLocusStore {
    fn add_locus(&mut self, locus: DroppedLocus) -> Result<()> {
        self.count += 1;
        debug!(
            "Dropped {}:{} {}",
            locus.chromosome,
            locus.start,
            locus.name.as_deref().unwrap_or(".")
        );
        Ok(())
    }
}

/// Writes one JSON object per locus, flushing after each so a killed run loses nothing.
pub struct JsonLinesLocusStore {
    writer: BufWriter<File>,
}

impl JsonLinesLocusStore {
    /// Create (truncating) the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self { writer: BufWriter::new(File::create(path)?) })
    }
}

impl LocusStore for JsonLinesLocusStore {
    fn add_locus(&mut self, locus: DroppedLocus) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &locus).map_err(std::io::Error::from)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
