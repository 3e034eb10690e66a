//! Multi-restart scenario tests.
//!
//! Each test drives a full scenario through the phase runner, calling
//! `run_incarnation` once per simulated process incarnation. The mock
//! service keeps all of its state inside the service home, so everything
//! that survives between incarnations really did go through the disk.

use srh_common::{
    BuildState, CommandInvoker, HarnessConfig, HarnessError, IncarnationOutcome, MockService,
    PERMISSION_DENIED_EXIT, Permission, PhaseRunner, Scenario, WaiterConfig,
};
use std::time::Duration;
use tempfile::TempDir;

#[ctor::ctor]
fn setup() {
    srh_common::testing::init_test_logging();
}

fn test_config(dir: &TempDir) -> HarnessConfig {
    HarnessConfig::default()
        .with_base_dir(dir.path())
        .with_waiter(WaiterConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            timeout: Duration::from_secs(5),
        })
}

fn runner_for(
    config: &HarnessConfig,
    scenario: Scenario<MockService>,
) -> PhaseRunner<MockService> {
    let service = MockService::builder()
        .home(config.home_path())
        .ready_after_polls(2)
        .build();
    PhaseRunner::new(config, scenario, service)
}

fn admin() -> CommandInvoker {
    CommandInvoker::new().authorized_to([Permission::Administer, Permission::Read])
}

// Scenario: restart denied without the Administer permission, then granted.
#[test]
fn restart_requires_administer_permission() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    let scenario = Scenario::<MockService>::new("restart-permissions")
        .phase("before-restart", |cx| {
            let denied = CommandInvoker::new()
                .authorized_to([Permission::Read])
                .invoke(cx.service);
            assert!(denied.failed_with(PERMISSION_DENIED_EXIT));
            assert!(denied.has_no_stdout());
            assert!(denied.stderr_contains("Administer"));
            assert!(!cx.service.restart_requested().unwrap());

            let granted = admin().invoke(cx.service);
            assert!(granted.succeeded_silently());
            assert!(cx.service.restart_requested().unwrap());
            Ok(())
        })
        .phase("after-restart", |cx| {
            assert_eq!(cx.service.generation().unwrap(), 1);
            assert!(!cx.service.restart_requested().unwrap());
            Ok(())
        });

    let mut runner = runner_for(&config, scenario);
    assert!(matches!(
        runner.run_incarnation().unwrap(),
        IncarnationOutcome::Restarted { index: 0, .. }
    ));
    assert!(matches!(
        runner.run_incarnation().unwrap(),
        IncarnationOutcome::Finished { index: 1, .. }
    ));
    runner.teardown();
}

// Scenario: a build running when the restart hits is aborted.
#[test]
fn running_build_is_aborted_by_restart() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    let scenario = Scenario::<MockService>::new("running-build-during-restart")
        .phase("before-restart", |cx| {
            cx.service.create_job("a-project").unwrap();
            cx.service.start_build("a-project").unwrap();
            let job = cx.service.job("a-project").unwrap().unwrap();
            assert_eq!(job.builds.len(), 1);
            assert!(job.is_building(), "build was not scheduled properly");

            assert!(admin().invoke(cx.service).succeeded_silently());
            Ok(())
        })
        .phase("after-restart", |cx| {
            let job = cx.service.job("a-project").unwrap().unwrap();
            assert_eq!(job.builds.len(), 1);
            assert!(!job.is_building());
            assert_eq!(job.build(1).unwrap().state, BuildState::Aborted);
            Ok(())
        });

    let mut runner = runner_for(&config, scenario);

    // Incarnation 1 writes phase 1 and triggers the restart.
    let first = runner.run_incarnation().unwrap();
    assert_eq!(
        first,
        IncarnationOutcome::Restarted {
            index: 0,
            name: "before-restart".to_string()
        }
    );
    assert_eq!(runner.status().peek().unwrap().unwrap().phase, 1);

    // Incarnation 2 reads phase 1, runs the after-logic, and does not
    // trigger another restart.
    let second = runner.run_incarnation().unwrap();
    assert_eq!(
        second,
        IncarnationOutcome::Finished {
            index: 1,
            name: "after-restart".to_string()
        }
    );
    assert_eq!(runner.service().generation().unwrap(), 1);
    runner.teardown();
}

// Scenario: a build runs during the restart while a second sits in the
// queue; the first is aborted, the second starts once the service is back.
#[test]
fn queued_build_survives_restart() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    let scenario = Scenario::<MockService>::new("queued-build-during-restart")
        .phase("before-restart", |cx| {
            cx.service.create_job("a-project").unwrap();
            cx.service.start_build("a-project").unwrap();
            let queued = cx.service.schedule_build("a-project").unwrap();
            assert_eq!(queued, 2);

            let job = cx.service.job("a-project").unwrap().unwrap();
            assert!(job.is_building());
            assert_eq!(job.build(2).unwrap().state, BuildState::Queued);

            assert!(admin().invoke(cx.service).succeeded_silently());
            Ok(())
        })
        .phase("after-restart", |cx| {
            let job = cx.service.job("a-project").unwrap().unwrap();
            assert_eq!(job.builds.len(), 2);
            assert!(job.is_building());
            assert_eq!(job.build(1).unwrap().state, BuildState::Aborted);
            assert_eq!(job.build(2).unwrap().state, BuildState::Running);

            cx.service.finish_build("a-project", 2).unwrap();
            let job = cx.service.job("a-project").unwrap().unwrap();
            assert!(!job.is_building());
            assert_eq!(job.build(2).unwrap().state, BuildState::Succeeded);
            Ok(())
        });

    let mut runner = runner_for(&config, scenario);
    runner.run_incarnation().unwrap();
    runner.run_incarnation().unwrap();
    runner.teardown();
}

// A resumed run finds the service data intact; a fresh run never does.
#[test]
fn resume_preserves_service_data_and_fresh_run_wipes_it() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    let scenario = Scenario::<MockService>::new("data-across-restart")
        .phase("before-restart", |cx| {
            cx.service.create_job("persistent-job").unwrap();
            Ok(())
        })
        .phase("after-restart", |cx| {
            assert!(
                cx.service.job("persistent-job").unwrap().is_some(),
                "service home was wiped on resume"
            );
            Ok(())
        });

    let mut runner = runner_for(&config, scenario);
    runner.run_incarnation().unwrap();
    runner.run_incarnation().unwrap();
    runner.teardown();

    // After teardown the next run starts from nothing.
    let fresh_scenario = Scenario::<MockService>::new("fresh-after-teardown").phase("only", |cx| {
        assert!(cx.service.job("persistent-job").unwrap().is_none());
        Ok(())
    });
    let mut fresh = runner_for(&config, fresh_scenario);
    fresh.run_incarnation().unwrap();
    fresh.teardown();
}

// The guard bounds how many times a scenario may fall back to phase zero.
#[test]
fn restart_loop_trips_the_guard() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir).with_max_restarts(3);

    let scenario = Scenario::<MockService>::new("looping").phase("only", |_cx| Ok(()));
    let mut runner = runner_for(&config, scenario);

    // A scenario that keeps losing its phase record consumes one guard
    // slot per incarnation.
    for _ in 0..3 {
        runner.run_incarnation().unwrap();
        runner.status().clear().unwrap();
    }

    let err = runner.run_incarnation().unwrap_err();
    assert!(matches!(
        err,
        HarnessError::GuardExceeded { count: 3, max: 3 }
    ));
    assert!(err.is_environment());
    runner.teardown();

    // Teardown cleared the guard; the scenario can start over.
    let scenario = Scenario::<MockService>::new("looping").phase("only", |_cx| Ok(()));
    let mut runner = runner_for(&config, scenario);
    runner.run_incarnation().unwrap();
    runner.teardown();
}

// A stale phase record is ignored and the scenario starts from the top.
#[test]
fn stale_phase_record_starts_a_fresh_run() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir).with_staleness_threshold(Duration::from_millis(50));

    let scenario = Scenario::<MockService>::new("staleness")
        .phase("before-restart", |_cx| Ok(()))
        .phase("after-restart", |_cx| {
            panic!("a stale record must not resume into the after-phase");
        });

    let mut runner = runner_for(&config, scenario);
    runner.run_incarnation().unwrap();
    assert_eq!(runner.status().peek().unwrap().unwrap().phase, 1);

    // Let the phase-1 record age past the threshold: the next incarnation
    // resolves to phase 0 and reruns the before-phase.
    std::thread::sleep(Duration::from_millis(80));
    let outcome = runner.run_incarnation().unwrap();
    assert!(matches!(
        outcome,
        IncarnationOutcome::Restarted { index: 0, .. }
    ));
    runner.teardown();
}
