//! Service lifecycle boundary.
//!
//! The orchestrator never manages the service directly; it talks to a
//! [`ServiceLifecycle`] implementation that owns the service's persistent
//! home directory, can trigger a restart, and exposes the readiness signal.
//! [`ServiceHome`] is the concrete home-directory manager implementations
//! build on.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::HarnessResult;

/// Boolean "is the service fully up" signal, polled after a restart.
pub trait ReadinessProbe {
    fn is_ready(&self) -> bool;
}

impl<F> ReadinessProbe for F
where
    F: Fn() -> bool,
{
    fn is_ready(&self) -> bool {
        self()
    }
}

/// Owns the service's persistent data directory and its restart trigger.
pub trait ServiceLifecycle {
    /// Whether the service's home directory currently exists.
    fn home_exists(&self) -> bool;

    /// Prepare the home directory for the incarnation about to run. With
    /// `reuse` the prior data is left untouched so the restarted service
    /// finds it; without, the directory is deleted and recreated empty.
    fn prepare_home(&mut self, reuse: bool) -> HarnessResult<()>;

    /// Fire-and-forget restart trigger. Completion is observed through the
    /// readiness probe, not through this call.
    fn restart(&mut self) -> HarnessResult<()>;

    /// Readiness signal for the restart waiter.
    fn is_ready(&self) -> bool;

    /// Remove the home directory entirely. Used at scenario teardown.
    fn remove_home(&mut self) -> HarnessResult<()>;
}

/// A service home directory under a well-known path, conditionally wiped or
/// preserved across restarts.
#[derive(Debug, Clone)]
pub struct ServiceHome {
    path: PathBuf,
}

impl ServiceHome {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Create the directory, wiping prior contents unless `reuse` is set.
    pub fn prepare(&self, reuse: bool) -> HarnessResult<()> {
        if reuse && self.exists() {
            info!(home = %self.path.display(), "existing service home found, reusing");
            return Ok(());
        }
        if self.exists() {
            info!(home = %self.path.display(), "wiping service home for a fresh run");
            std::fs::remove_dir_all(&self.path)?;
        } else {
            debug!(home = %self.path.display(), "service home not found, creating");
        }
        std::fs::create_dir_all(&self.path)?;
        Ok(())
    }

    /// Delete the directory recursively. Missing directories are fine.
    pub fn remove(&self) -> HarnessResult<()> {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn home_in(dir: &TempDir) -> ServiceHome {
        ServiceHome::new(dir.path().join("service-home"))
    }

    #[test]
    fn test_prepare_creates_missing_home() {
        let dir = TempDir::new().unwrap();
        let home = home_in(&dir);

        assert!(!home.exists());
        home.prepare(false).unwrap();
        assert!(home.exists());
    }

    #[test]
    fn test_prepare_with_reuse_preserves_contents() {
        let dir = TempDir::new().unwrap();
        let home = home_in(&dir);

        home.prepare(false).unwrap();
        let marker = home.path().join("data.json");
        std::fs::write(&marker, "{}").unwrap();

        home.prepare(true).unwrap();
        assert!(marker.exists());
    }

    #[test]
    fn test_prepare_without_reuse_wipes_contents() {
        let dir = TempDir::new().unwrap();
        let home = home_in(&dir);

        home.prepare(false).unwrap();
        let marker = home.path().join("data.json");
        std::fs::write(&marker, "{}").unwrap();

        home.prepare(false).unwrap();
        assert!(home.exists());
        assert!(!marker.exists());
    }

    #[test]
    fn test_reuse_of_missing_home_still_creates_it() {
        let dir = TempDir::new().unwrap();
        let home = home_in(&dir);

        home.prepare(true).unwrap();
        assert!(home.exists());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let home = home_in(&dir);

        home.prepare(false).unwrap();
        home.remove().unwrap();
        home.remove().unwrap();
        assert!(!home.exists());
    }

    #[test]
    fn test_closure_is_a_readiness_probe() {
        let probe = || true;
        assert!(ReadinessProbe::is_ready(&probe));
    }
}
