//! Mock service for tests.
//!
//! An in-process stand-in for the long-running service a scenario restarts.
//! It keeps no job state in memory: everything is persisted as JSON inside
//! the service home, so it behaves like a real process that dies and comes
//! back: restarted incarnations see exactly what survived on disk, and a
//! wiped home really does lose everything.

use std::cell::Cell;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{HarnessError, HarnessResult};
use crate::invoker::{AuthContext, InvokeResult, Permission, RestartCommand};
use crate::lifecycle::{ServiceHome, ServiceLifecycle};

const STATE_FILE: &str = "state.json";

/// Lifecycle state of one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    /// Waiting for the job's running build to finish.
    Queued,
    Running,
    /// Killed by a service restart.
    Aborted,
    Succeeded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub number: u32,
    pub state: BuildState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    pub builds: Vec<Build>,
}

impl Job {
    pub fn is_building(&self) -> bool {
        self.builds
            .iter()
            .any(|build| build.state == BuildState::Running)
    }

    pub fn build(&self, number: u32) -> Option<&Build> {
        self.builds.iter().find(|build| build.number == number)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ServiceState {
    jobs: Vec<Job>,
    /// Set by the restart command; cleared when the restart happens.
    restart_requested: bool,
    /// How many times this service has been restarted.
    generation: u32,
}

/// In-process mock of the restarted service.
pub struct MockService {
    home: ServiceHome,
    ready_after_polls: u32,
    polls_remaining: Cell<u32>,
}

impl MockService {
    pub fn builder() -> MockServiceBuilder {
        MockServiceBuilder::default()
    }

    pub fn new(home_path: impl Into<PathBuf>) -> Self {
        Self::builder().home(home_path).build()
    }

    pub fn home_path(&self) -> &Path {
        self.home.path()
    }

    /// How many restarts this service has seen, per its persisted state.
    pub fn generation(&self) -> HarnessResult<u32> {
        Ok(self.load()?.generation)
    }

    pub fn restart_requested(&self) -> HarnessResult<bool> {
        Ok(self.load()?.restart_requested)
    }

    pub fn create_job(&mut self, name: &str) -> HarnessResult<()> {
        let mut state = self.load()?;
        if state.jobs.iter().any(|job| job.name == name) {
            return Err(HarnessError::SetupFailed(format!(
                "job '{name}' already exists"
            )));
        }
        state.jobs.push(Job {
            name: name.to_string(),
            builds: Vec::new(),
        });
        self.save(&state)
    }

    /// Start a build immediately, as if an executor picked it up.
    pub fn start_build(&mut self, job_name: &str) -> HarnessResult<u32> {
        self.add_build(job_name, BuildState::Running)
    }

    /// Schedule a build: runs immediately unless the job is already
    /// building, in which case it sits in the queue.
    pub fn schedule_build(&mut self, job_name: &str) -> HarnessResult<u32> {
        let queued = self.job_required(job_name)?.is_building();
        self.add_build(
            job_name,
            if queued {
                BuildState::Queued
            } else {
                BuildState::Running
            },
        )
    }

    /// Let a running build complete successfully.
    pub fn finish_build(&mut self, job_name: &str, number: u32) -> HarnessResult<()> {
        let mut state = self.load()?;
        let job = state
            .jobs
            .iter_mut()
            .find(|job| job.name == job_name)
            .ok_or_else(|| HarnessError::SetupFailed(format!("no such job '{job_name}'")))?;
        let build = job
            .builds
            .iter_mut()
            .find(|build| build.number == number)
            .ok_or_else(|| {
                HarnessError::SetupFailed(format!("no build #{number} in job '{job_name}'"))
            })?;
        if build.state != BuildState::Running {
            return Err(HarnessError::SetupFailed(format!(
                "build #{number} in job '{job_name}' is not running"
            )));
        }
        build.state = BuildState::Succeeded;
        self.save(&state)
    }

    pub fn job(&self, name: &str) -> HarnessResult<Option<Job>> {
        Ok(self.load()?.jobs.into_iter().find(|job| job.name == name))
    }

    fn job_required(&self, name: &str) -> HarnessResult<Job> {
        self.job(name)?
            .ok_or_else(|| HarnessError::SetupFailed(format!("no such job '{name}'")))
    }

    fn add_build(&mut self, job_name: &str, build_state: BuildState) -> HarnessResult<u32> {
        let mut state = self.load()?;
        let job = state
            .jobs
            .iter_mut()
            .find(|job| job.name == job_name)
            .ok_or_else(|| HarnessError::SetupFailed(format!("no such job '{job_name}'")))?;
        let number = job.builds.iter().map(|build| build.number).max().unwrap_or(0) + 1;
        job.builds.push(Build {
            number,
            state: build_state,
        });
        self.save(&state)?;
        Ok(number)
    }

    fn state_path(&self) -> PathBuf {
        self.home.path().join(STATE_FILE)
    }

    fn load(&self) -> HarnessResult<ServiceState> {
        let path = self.state_path();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(ServiceState::default()),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_str(&contents).map_err(|err| {
            HarnessError::SetupFailed(format!(
                "corrupt mock service state at {}: {err}",
                path.display()
            ))
        })
    }

    fn save(&self, state: &ServiceState) -> HarnessResult<()> {
        if !self.home.exists() {
            std::fs::create_dir_all(self.home.path())?;
        }
        let contents = serde_json::to_string_pretty(state).map_err(|err| {
            HarnessError::SetupFailed(format!("failed to encode mock service state: {err}"))
        })?;
        std::fs::write(self.state_path(), contents)?;
        Ok(())
    }
}

impl ServiceLifecycle for MockService {
    fn home_exists(&self) -> bool {
        self.home.exists()
    }

    fn prepare_home(&mut self, reuse: bool) -> HarnessResult<()> {
        self.home.prepare(reuse)
    }

    fn restart(&mut self) -> HarnessResult<()> {
        let mut state = self.load()?;

        // Running builds do not survive a restart; queued ones start once
        // the service is back up.
        for job in &mut state.jobs {
            for build in &mut job.builds {
                if build.state == BuildState::Running {
                    build.state = BuildState::Aborted;
                }
            }
            for build in &mut job.builds {
                if build.state == BuildState::Queued {
                    build.state = BuildState::Running;
                }
            }
        }

        state.restart_requested = false;
        state.generation += 1;
        self.save(&state)?;

        self.polls_remaining.set(self.ready_after_polls);
        info!(generation = state.generation, "mock service restarting");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        let remaining = self.polls_remaining.get();
        if remaining > 0 {
            self.polls_remaining.set(remaining - 1);
            debug!(remaining, "mock service still coming up");
            return false;
        }
        true
    }

    fn remove_home(&mut self) -> HarnessResult<()> {
        self.home.remove()
    }
}

impl RestartCommand for MockService {
    fn invoke_restart(&mut self, auth: &AuthContext) -> InvokeResult {
        if !auth.has(Permission::Administer) {
            return InvokeResult::permission_denied(Permission::Administer);
        }
        let mut state = match self.load() {
            Ok(state) => state,
            Err(err) => {
                return InvokeResult {
                    exit_code: 1,
                    stdout: String::new(),
                    stderr: format!("ERROR: {err}\n"),
                    duration: std::time::Duration::ZERO,
                };
            }
        };
        state.restart_requested = true;
        if let Err(err) = self.save(&state) {
            return InvokeResult {
                exit_code: 1,
                stdout: String::new(),
                stderr: format!("ERROR: {err}\n"),
                duration: std::time::Duration::ZERO,
            };
        }
        InvokeResult::silent_success()
    }
}

/// Builder for per-test tuning of the mock.
#[derive(Debug, Clone)]
pub struct MockServiceBuilder {
    home_path: Option<PathBuf>,
    ready_after_polls: u32,
}

impl Default for MockServiceBuilder {
    fn default() -> Self {
        Self {
            home_path: None,
            ready_after_polls: 2,
        }
    }
}

impl MockServiceBuilder {
    pub fn home(mut self, path: impl Into<PathBuf>) -> Self {
        self.home_path = Some(path.into());
        self
    }

    /// Number of readiness polls the service answers `false` after a
    /// restart before reporting ready.
    pub fn ready_after_polls(mut self, polls: u32) -> Self {
        self.ready_after_polls = polls;
        self
    }

    pub fn build(self) -> MockService {
        let home_path = self
            .home_path
            .unwrap_or_else(|| std::env::temp_dir().join("srh-mock-service"));
        MockService {
            home: ServiceHome::new(home_path),
            ready_after_polls: self.ready_after_polls,
            polls_remaining: Cell::new(0),
        }
    }
}
