//! Common CLI options shared across commands.
//!
//! This module provides shared argument structures that can be composed into
//! command structs using `#[command(flatten)]`.

use std::path::PathBuf;

use clap::Args;

use watchdog_lib::config::{FieldType, QualityField};
use watchdog_lib::interrupt::Interrupt;
use watchdog_lib::locus::{DiscardLocusStore, JsonLinesLocusStore, LocusStore};
use watchdog_lib::toolkit::Bcftools;
use watchdog_lib::validation::validate_fraction;

/// Options selecting the genomic toolkit.
#[derive(Debug, Clone, Args)]
pub struct ToolkitOptions {
    /// bcftools executable used to compress, index and query datasets
    #[arg(long = "bcftools", default_value = "bcftools")]
    pub bcftools: PathBuf,
}

impl ToolkitOptions {
    /// The toolkit, stopping its child processes when `interrupt` fires.
    #[must_use]
    pub fn toolkit(&self, interrupt: &Interrupt) -> Bcftools {
        Bcftools::new(&self.bcftools).with_interrupt(interrupt.clone())
    }
}

/// Options controlling how a window is filtered.
#[derive(Debug, Clone, Args)]
pub struct FilterOptions {
    /// INFO field used to rank records within a window
    #[arg(short = 'q', long = "quality-field", default_value = "VQSLOD")]
    pub quality_field: String,

    /// How the quality field is parsed (float or integer)
    #[arg(long = "quality-field-type", default_value = "float")]
    pub quality_field_type: FieldType,

    /// Fraction of the lowest-scoring records dropped per filtering pass
    #[arg(short = 'f', long = "drop-fraction", default_value = "0.05")]
    pub drop_fraction: f64,
}

impl FilterOptions {
    #[must_use]
    pub fn quality_field(&self) -> QualityField {
        QualityField::new(self.quality_field.clone(), self.quality_field_type)
    }

    /// Validates the filter options.
    ///
    /// # Errors
    ///
    /// Returns an error if the drop fraction is outside `[0, 1)`.
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_fraction(self.drop_fraction, "drop-fraction")?;
        Ok(())
    }
}

/// Options for recording dropped records.
#[derive(Debug, Clone, Default, Args)]
pub struct DroppedLociOptions {
    /// Write one JSON object per dropped record to this file
    #[arg(long = "dropped-loci")]
    pub dropped_loci: Option<PathBuf>,
}

impl DroppedLociOptions {
    /// The store dropped records are handed to.
    ///
    /// Without `--dropped-loci`, records are only logged at debug level.
    ///
    /// # Errors
    ///
    /// Returns an error if the output file cannot be created.
    pub fn store(&self) -> anyhow::Result<Box<dyn LocusStore>> {
        Ok(match &self.dropped_loci {
            Some(path) => Box::new(JsonLinesLocusStore::create(path)?),
            None => Box::new(DiscardLocusStore::default()),
        })
    }
}
