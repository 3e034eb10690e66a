//! Durable phase store.
//!
//! Holds exactly one record: the scenario's current phase and when it was
//! written. The record is replaced wholesale on every write. A record older
//! than the staleness threshold is a leftover from some earlier run and is
//! treated as absent rather than resumed.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::{HarnessError, HarnessResult};
use crate::store::record::RecordLine;

/// Non-destructive view of the stored phase record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseSnapshot {
    pub phase: u32,
    pub timestamp_ms: i64,
    pub age: Duration,
    pub stale: bool,
}

/// Durable single-record store for the scenario phase.
///
/// Accessed by at most one process at a time by construction: the restarted
/// process does not start until the old one has exited. Two scenarios
/// sharing one status path concurrently will corrupt each other's state.
#[derive(Debug, Clone)]
pub struct StatusStore {
    path: PathBuf,
    staleness_threshold: Duration,
}

impl StatusStore {
    pub fn new(path: impl Into<PathBuf>, staleness_threshold: Duration) -> Self {
        Self {
            path: path.into(),
            staleness_threshold,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored record without side effects. Absent is `None`;
    /// malformed content is fatal. Staleness is reported, not filtered.
    pub fn peek(&self) -> HarnessResult<Option<PhaseSnapshot>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let record = RecordLine::parse(contents.lines().next().unwrap_or("")).map_err(|reason| {
            HarnessError::MalformedState {
                path: self.path.clone(),
                reason,
            }
        })?;

        let age = record.age();
        Ok(Some(PhaseSnapshot {
            phase: record.value,
            timestamp_ms: record.timestamp_ms,
            age,
            stale: age > self.staleness_threshold,
        }))
    }

    /// Read the current phase.
    ///
    /// Absent and stale records resolve to `None`. Whenever the read
    /// resolves to phase zero (absent, stale, or genuinely stored as zero) a
    /// fresh phase-0 record is written back, so staleness is measured from
    /// "first observed as zero" rather than from an arbitrarily old write.
    pub fn read(&self) -> HarnessResult<Option<u32>> {
        let resolved = match self.peek()? {
            None => None,
            Some(snapshot) if snapshot.stale => {
                debug!(
                    path = %self.path.display(),
                    age = ?snapshot.age,
                    "phase record too old, treating as absent"
                );
                None
            }
            Some(snapshot) => Some(snapshot.phase),
        };

        if resolved.unwrap_or(0) == 0 {
            self.write(0)?;
        }

        debug!(path = %self.path.display(), phase = ?resolved, "read phase record");
        Ok(resolved)
    }

    /// Replace the record with the given phase, stamped now.
    pub fn write(&self, phase: u32) -> HarnessResult<()> {
        debug!(path = %self.path.display(), phase, "writing phase record");
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, RecordLine::now(phase).encode())?;
        Ok(())
    }

    /// Delete the record. Missing files are fine.
    pub fn clear(&self) -> HarnessResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => {
                warn!(path = %self.path.display(), %err, "failed to clear phase record");
                Err(err.into())
            }
        }
    }
}
