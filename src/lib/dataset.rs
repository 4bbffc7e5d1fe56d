//! Handles to the working dataset and its normalization.
//!
//! A [`DatasetHandle`] always points at a BGZF-compressed, indexed VCF. Handles are
//! never mutated: producing a repaired dataset yields a new handle, and dropping the
//! old one deletes any temporary directory it owned (index included).

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;
use noodles_bgzf::io::Writer as BgzfWriter;
use tempfile::TempDir;

use crate::errors::Result;
use crate::toolkit::Toolkit;

/// File name used for datasets written into their own temporary directory.
const DATASET_FILE_NAME: &str = "dataset.vcf.gz";

/// A reference to a normalized (compressed and indexed) dataset.
#[derive(Debug)]
pub struct DatasetHandle {
    path: PathBuf,
    /// Keeps a temporary dataset alive for as long as the handle exists.
    scratch: Option<TempDir>,
}

impl DatasetHandle {
    /// The path passed to the toolkit and to the phasing job.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the dataset lives in a temporary directory owned by this handle.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.scratch.is_some()
    }
}

/// Returns true if `path` names a gzip/BGZF compressed file.
#[must_use]
pub fn is_compressed(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

/// The `.csi` index path for a compressed dataset.
#[must_use]
pub fn index_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".csi");
    PathBuf::from(name)
}

/// Make `path` usable as a working dataset: compress it if needed, then index it.
///
/// A dataset that is not compressed is copied into a fresh temporary directory owned by
/// the returned handle; the input file is left untouched.
///
/// # Errors
///
/// Returns an error if the temporary directory cannot be created or a toolkit command
/// fails.
pub fn normalize<T: Toolkit>(toolkit: &T, path: &Path) -> Result<DatasetHandle> {
    let handle = if is_compressed(path) {
        DatasetHandle { path: path.to_path_buf(), scratch: None }
    } else {
        let scratch = TempDir::new()?;
        let compressed = scratch.path().join(DATASET_FILE_NAME);
        toolkit.compress(path, &compressed)?;
        DatasetHandle { path: compressed, scratch: Some(scratch) }
    };
    ensure_indexed(toolkit, &handle)?;
    Ok(handle)
}

/// Adopt a compressed dataset written into `scratch` and index it.
///
/// # Errors
///
/// Returns an error if indexing fails.
pub fn adopt<T: Toolkit>(toolkit: &T, scratch: TempDir) -> Result<DatasetHandle> {
    let handle =
        DatasetHandle { path: scratch.path().join(DATASET_FILE_NAME), scratch: Some(scratch) };
    ensure_indexed(toolkit, &handle)?;
    Ok(handle)
}

fn ensure_indexed<T: Toolkit>(toolkit: &T, handle: &DatasetHandle) -> Result<()> {
    if !index_path(handle.path()).exists() {
        toolkit.index(handle.path())?;
    }
    Ok(())
}

/// Line-oriented BGZF writer for a new dataset in its own temporary directory.
pub struct DatasetWriter {
    scratch: TempDir,
    writer: BgzfWriter<BufWriter<File>>,
    lines: u64,
}

impl DatasetWriter {
    /// Create a writer for a new temporary dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory or file cannot be created.
    pub fn create() -> Result<Self> {
        let scratch = TempDir::new()?;
        let file = File::create(scratch.path().join(DATASET_FILE_NAME))?;
        Ok(Self { scratch, writer: BgzfWriter::new(BufWriter::new(file)), lines: 0 })
    }

    /// Append one line; a newline is added.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }

    /// Number of lines written so far.
    #[must_use]
    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Flush the BGZF stream (including the EOF block) and index the result.
    ///
    /// # Errors
    ///
    /// Returns an error if finishing the stream or indexing fails.
    pub fn finish<T: Toolkit>(self, toolkit: &T) -> Result<DatasetHandle> {
        let Self { scratch, writer, lines } = self;
        let mut inner = writer.finish()?;
        inner.flush()?;
        info!("Wrote {lines} lines to {}", scratch.path().join(DATASET_FILE_NAME).display());
        adopt(toolkit, scratch)
    }
}

/// Copy a dataset (and its index, if present) to a permanent location.
///
/// # Errors
///
/// Returns an error if either copy fails.
pub fn persist(handle: &DatasetHandle, destination: &Path) -> io::Result<()> {
    std::fs::copy(handle.path(), destination)?;
    let index = index_path(handle.path());
    if index.exists() {
        std::fs::copy(index, index_path(destination))?;
    }
    Ok(())
}
