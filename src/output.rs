//! # Output File Module
//!
//! Creates the delimited-text output file and exposes it to the writer
//! thread as an append-only [`SampleSink`].
//!
//! ## Naming
//! When overwriting is disabled and the configured path is taken, a numeric
//! suffix is inserted before the extension: `run.csv`, `run_1.csv`,
//! `run_2.csv`, ...

use crate::error::RecorderError;
use crate::format::HEADER;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Append-only destination for formatted batches.
pub trait SampleSink: Send {
    /// Append one block of records; called once per drained batch.
    fn append(&mut self, block: &[u8]) -> io::Result<()>;
}

/// Output file opened in append mode.
pub struct FileSink {
    file: File,
}

impl FileSink {
    /// Create (or truncate) `path`, write the header, and reopen it for appending.
    pub fn create(path: &Path) -> Result<Self, RecorderError> {
        let mut file = File::create(path).map_err(|source| RecorderError::CreateOutput {
            path: path.to_path_buf(),
            source,
        })?;
        file.write_all(HEADER.as_bytes())
            .map_err(|source| RecorderError::WriteHeader {
                path: path.to_path_buf(),
                source,
            })?;
        drop(file);

        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|source| RecorderError::CreateOutput {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self { file })
    }
}

impl SampleSink for FileSink {
    fn append(&mut self, block: &[u8]) -> io::Result<()> {
        self.file.write_all(block)?;
        self.file.flush()
    }
}

/// Pick the path to record into.
///
/// With `overwrite` the configured path is used as-is; otherwise the first
/// free `<stem>_<n>.<ext>` variant is returned.
pub fn resolve_output_path(path: &Path, overwrite: bool) -> PathBuf {
    if overwrite || !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());

    let mut counter: u32 = 1;
    loop {
        let name = match &extension {
            Some(ext) => format!("{}_{}.{}", stem, counter, ext),
            None => format!("{}_{}", stem, counter),
        };
        let candidate = path.with_file_name(name);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}
