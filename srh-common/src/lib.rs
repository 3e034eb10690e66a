//! Service Restart Harness - core library.
//!
//! Lets a single logical test scenario span multiple restarts of a
//! long-running service. The process running the scenario dies with every
//! restart, so the harness persists "where the scenario is" to durable
//! single-record stores, detects stale or corrupted state on the way back
//! in, bounds runaway restart loops with a durable guard counter, and
//! blocks until the restarted service reports ready before resuming.
//!
//! The pieces:
//!
//! - [`store::StatusStore`] / [`store::GuardCounter`]: the durable records
//! - [`runner::PhaseRunner`] / [`runner::Scenario`]: per-incarnation dispatch
//! - [`waiter::RestartWaiter`]: bounded-backoff readiness wait
//! - [`lifecycle::ServiceLifecycle`]: the service-side boundary
//! - [`invoker::CommandInvoker`]: authorized restart command plumbing
//! - [`mock_service::MockService`]: in-process service stand-in for tests
//!
//! One scenario at a time per store path set: the stores are plain files
//! with no locking, safe only because the relaunched process never overlaps
//! its predecessor.

pub mod config;
pub mod errors;
pub mod invoker;
pub mod lifecycle;
pub mod mock_service;
pub mod runner;
pub mod store;
pub mod testing;
pub mod waiter;

pub use config::HarnessConfig;
pub use errors::{HarnessError, HarnessResult};
pub use invoker::{AuthContext, CommandInvoker, InvokeResult, PERMISSION_DENIED_EXIT, Permission};
pub use lifecycle::{ReadinessProbe, ServiceHome, ServiceLifecycle};
pub use mock_service::{BuildState, MockService, MockServiceBuilder};
pub use runner::{IncarnationOutcome, PhaseContext, PhaseRunner, Scenario};
pub use store::{GuardCounter, PhaseSnapshot, StatusStore};
pub use waiter::{CancelToken, RestartWaiter, WaiterConfig};
