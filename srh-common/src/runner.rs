//! Phase orchestration across process restarts.
//!
//! A scenario is an ordered list of named phase callbacks; one callback runs
//! per process incarnation. The runner keeps no state in memory between
//! incarnations: everything it needs to resume lives in the phase store and
//! the restart guard, so the surrounding framework can kill and relaunch
//! the process freely between phases.

use serde::Serialize;
use tracing::{info, warn};

use crate::config::HarnessConfig;
use crate::errors::{HarnessError, HarnessResult};
use crate::lifecycle::ServiceLifecycle;
use crate::store::{GuardCounter, StatusStore};
use crate::waiter::{CancelToken, RestartWaiter};

/// Per-invocation view handed to a phase callback.
pub struct PhaseContext<'a, S> {
    /// Index of the phase being run.
    pub index: u32,
    /// Name the phase was registered under.
    pub name: &'a str,
    /// The service collaborator, for scenario logic that drives it.
    pub service: &'a mut S,
}

impl<S> PhaseContext<'_, S> {
    /// Build a phase failure carrying this phase's name.
    pub fn failure(&self, reason: impl Into<String>) -> HarnessError {
        HarnessError::phase_failure(self.name, reason)
    }
}

type PhaseFn<S> = Box<dyn FnMut(&mut PhaseContext<'_, S>) -> HarnessResult<()>>;

struct ScenarioPhase<S> {
    name: String,
    run: PhaseFn<S>,
}

/// Ordered, named phase callbacks making up one multi-restart scenario.
pub struct Scenario<S> {
    name: String,
    phases: Vec<ScenarioPhase<S>>,
}

impl<S> Scenario<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phases: Vec::new(),
        }
    }

    /// Register the next phase. Phases run in registration order, one per
    /// incarnation.
    pub fn phase<F>(mut self, name: impl Into<String>, run: F) -> Self
    where
        F: FnMut(&mut PhaseContext<'_, S>) -> HarnessResult<()> + 'static,
    {
        self.phases.push(ScenarioPhase {
            name: name.into(),
            run: Box::new(run),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}

/// What one incarnation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum IncarnationOutcome {
    /// Ran phase `index` and triggered a restart; more phases remain.
    Restarted { index: u32, name: String },
    /// Ran the final phase; the scenario is complete.
    Finished { index: u32, name: String },
    /// The stored phase index names no registered phase; nothing was run.
    /// Deliberately permissive so a manual store reset does not hard-fail
    /// the harness.
    Unrecognized { index: u32 },
}

/// Re-entrant per-incarnation dispatcher.
///
/// Crash-window caveat: the next phase is recorded before the restart is
/// triggered, so a crash between the two resumes at the next phase without
/// a restart having happened. Phase logic must tolerate that (idempotent
/// setup, assertions that do not require the restart side effects).
pub struct PhaseRunner<S: ServiceLifecycle> {
    scenario: Scenario<S>,
    service: S,
    status: StatusStore,
    guard: GuardCounter,
    waiter: RestartWaiter,
    max_restarts: u32,
}

impl<S: ServiceLifecycle> PhaseRunner<S> {
    pub fn new(config: &HarnessConfig, scenario: Scenario<S>, service: S) -> Self {
        Self {
            scenario,
            service,
            status: StatusStore::new(config.status_path(), config.staleness_threshold),
            guard: GuardCounter::new(config.guard_path()),
            waiter: RestartWaiter::new(config.waiter.clone()),
            max_restarts: config.max_restarts,
        }
    }

    /// Attach a cancellation token honored by the readiness wait.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.waiter = self.waiter.with_cancel_token(cancel);
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn service_mut(&mut self) -> &mut S {
        &mut self.service
    }

    pub fn status(&self) -> &StatusStore {
        &self.status
    }

    pub fn guard(&self) -> &GuardCounter {
        &self.guard
    }

    /// Run the phase the store currently points at.
    ///
    /// Called once per process incarnation. Reads the stored phase, prepares
    /// the service home (wiped on a fresh run, preserved on a resume), runs
    /// the matching callback, records the next phase, and when phases
    /// remain, triggers a restart and blocks until the service is ready
    /// again.
    pub fn run_incarnation(&mut self) -> HarnessResult<IncarnationOutcome> {
        let resolved = self.status.read()?;
        let phase = resolved.unwrap_or(0);

        if phase == 0 {
            self.check_restart_guard()?;
        }

        // A resumed run keeps the service's data; a fresh run never does.
        let reuse = phase > 0 && self.service.home_exists();
        self.service.prepare_home(reuse)?;

        let total = self.scenario.phases.len() as u32;
        let Some(entry) = self.scenario.phases.get_mut(phase as usize) else {
            warn!(
                scenario = %self.scenario.name,
                phase,
                registered = total,
                "unrecognized phase index, ending incarnation without action"
            );
            return Ok(IncarnationOutcome::Unrecognized { index: phase });
        };

        let name = entry.name.clone();
        info!(scenario = %self.scenario.name, phase, phase_name = %name, "running scenario phase");
        let mut cx = PhaseContext {
            index: phase,
            name: &name,
            service: &mut self.service,
        };
        (entry.run)(&mut cx)?;

        self.status.write(phase + 1)?;

        if phase + 1 == total {
            info!(scenario = %self.scenario.name, "scenario complete");
            return Ok(IncarnationOutcome::Finished { index: phase, name });
        }

        self.service.restart()?;
        let service = &self.service;
        self.waiter.wait_until_ready(&(|| service.is_ready()))?;
        Ok(IncarnationOutcome::Restarted { index: phase, name })
    }

    /// The phase-0 reset path: bound check first, then consume a guard slot.
    /// Runs on every incarnation that resolves to phase zero, which is what
    /// bounds a scenario that keeps restarting from scratch.
    fn check_restart_guard(&self) -> HarnessResult<u32> {
        let count = self.guard.read()?;
        if count >= self.max_restarts {
            return Err(HarnessError::GuardExceeded {
                count,
                max: self.max_restarts,
            });
        }
        self.guard.increment()
    }

    /// Delete all durable scenario state: phase record, guard record, and
    /// the service home. Best-effort, as teardown runs on already-failed
    /// scenarios too.
    pub fn teardown(&mut self) {
        if let Err(err) = self.status.clear() {
            warn!(%err, "teardown: failed to clear phase record");
        }
        if let Err(err) = self.guard.clear() {
            warn!(%err, "teardown: failed to clear guard record");
        }
        if let Err(err) = self.service.remove_home() {
            warn!(%err, "teardown: failed to remove service home");
        }
    }
}
