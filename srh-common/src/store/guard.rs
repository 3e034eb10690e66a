//! Durable restart-loop counter.
//!
//! Same record format as the phase store, separate path, different trust
//! model: guard records are never staleness-filtered, and malformed content
//! is tolerated as zero. The counter only bounds restart loops; losing it
//! costs loop protection, not correctness, so corruption here does not
//! abort the scenario.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::HarnessResult;
use crate::store::record::RecordLine;

/// Durable monotonically-incrementing counter bounding restart cycles.
#[derive(Debug, Clone)]
pub struct GuardCounter {
    path: PathBuf,
}

impl GuardCounter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current count. Absent or malformed records read as zero; only real
    /// I/O errors (an unreadable file that exists) are surfaced.
    pub fn read(&self) -> HarnessResult<u32> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };

        match RecordLine::parse(contents.lines().next().unwrap_or("")) {
            Ok(record) => Ok(record.value),
            Err(reason) => {
                warn!(
                    path = %self.path.display(),
                    reason,
                    "malformed guard record, treating count as 0"
                );
                Ok(0)
            }
        }
    }

    /// Write count + 1 and return the new count.
    pub fn increment(&self) -> HarnessResult<u32> {
        let count = self.read()? + 1;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, RecordLine::now(count).encode())?;
        debug!(path = %self.path.display(), count, "incremented restart guard");
        Ok(count)
    }

    /// Delete the record. Missing files are fine.
    pub fn clear(&self) -> HarnessResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
