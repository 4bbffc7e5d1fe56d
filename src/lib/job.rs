//! Construction of the phasing job's command line.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::{HeapSize, JobConfig};

/// Suffixes of the files the job writes next to its output prefix.
const ARTIFACT_SUFFIXES: [&str; 2] = [".vcf.gz", ".log"];

/// One invocation of the phasing job.
///
/// Built fresh for every attempt from the configuration, the current heap size and the
/// current dataset; identical inputs always give an identical command line.
#[derive(Debug, Clone)]
pub struct PhasingCommand {
    runtime: PathBuf,
    args: Vec<OsString>,
    out_prefix: PathBuf,
}

impl PhasingCommand {
    #[must_use]
    pub fn new(config: &JobConfig, heap: HeapSize, dataset: &Path) -> Self {
        let mut args: Vec<OsString> = vec![
            format!("-Xmx{heap}").into(),
            "-jar".into(),
            config.jar.clone().into_os_string(),
            key_value("gt", dataset.as_os_str()),
        ];
        if let Some(reference) = &config.reference {
            args.push(key_value("ref", reference.as_os_str()));
        }
        args.push(key_value("out", config.out_prefix.as_os_str()));
        args.push("impute=true".into());
        args.push(format!("window={}", config.window_size).into());
        args.push(format!("overlap={}", config.overlap).into());
        args.push(format!("nthreads={}", config.nthreads).into());

        Self { runtime: config.runtime.clone(), args, out_prefix: config.out_prefix.clone() }
    }

    /// The program launched (the JVM).
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.runtime
    }

    /// Arguments passed to the program.
    #[must_use]
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// A ready-to-spawn command; the caller configures stdio.
    #[must_use]
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.runtime);
        command.args(&self.args);
        command
    }

    /// Files the job writes, which are stale after it is killed.
    #[must_use]
    pub fn artifacts(&self) -> Vec<PathBuf> {
        ARTIFACT_SUFFIXES
            .iter()
            .map(|suffix| {
                let mut name = OsString::from(self.out_prefix.as_os_str());
                name.push(suffix);
                PathBuf::from(name)
            })
            .collect()
    }
}

fn key_value(key: &str, value: &OsStr) -> OsString {
    let mut arg = OsString::from(key);
    arg.push("=");
    arg.push(value);
    arg
}

impl fmt::Display for PhasingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.runtime.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}
