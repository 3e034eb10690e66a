//! Restart command invocation with an authorization context.
//!
//! The restart trigger the scenario author drives is a command on the
//! service, invoked as some principal. Success is silent: zero exit code,
//! no output. A missing permission is a fixed non-zero exit code and a
//! stderr line naming the permission. The matcher helpers keep scenario
//! assertions readable.

use std::time::{Duration, Instant};

/// Permissions a command invocation can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Read,
    Administer,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => write!(f, "Read"),
            Self::Administer => write!(f, "Administer"),
        }
    }
}

/// Exit code a command returns when the invoking principal lacks a
/// required permission.
pub const PERMISSION_DENIED_EXIT: i32 = 6;

/// The principal a command runs as.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    permissions: Vec<Permission>,
}

impl AuthContext {
    /// A principal holding no permissions at all.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authorized_to(permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            permissions: permissions.into_iter().collect(),
        }
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

/// Captured result of one command invocation.
#[derive(Debug, Clone)]
pub struct InvokeResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl InvokeResult {
    /// A silent success: zero exit code, no output at all.
    pub fn silent_success() -> Self {
        Self {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            duration: Duration::ZERO,
        }
    }

    /// The fixed permission-denial response, naming what was missing.
    pub fn permission_denied(missing: Permission) -> Self {
        Self {
            exit_code: PERMISSION_DENIED_EXIT,
            stdout: String::new(),
            stderr: format!("ERROR: user is missing the {missing} permission\n"),
            duration: Duration::ZERO,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Zero exit code and not a byte of output on either stream.
    pub fn succeeded_silently(&self) -> bool {
        self.success() && self.stdout.is_empty() && self.stderr.is_empty()
    }

    pub fn failed_with(&self, exit_code: i32) -> bool {
        self.exit_code == exit_code
    }

    pub fn has_no_stdout(&self) -> bool {
        self.stdout.is_empty()
    }

    pub fn stdout_contains(&self, pattern: &str) -> bool {
        self.stdout.contains(pattern)
    }

    pub fn stderr_contains(&self, pattern: &str) -> bool {
        self.stderr.contains(pattern)
    }
}

/// The service-side restart command contract.
pub trait RestartCommand {
    fn invoke_restart(&mut self, auth: &AuthContext) -> InvokeResult;
}

/// Drives a [`RestartCommand`] as a configured principal and stamps the
/// invocation duration.
#[derive(Debug, Clone, Default)]
pub struct CommandInvoker {
    auth: AuthContext,
}

impl CommandInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the principal for subsequent invocations.
    pub fn authorized_to(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.auth = AuthContext::authorized_to(permissions);
        self
    }

    pub fn invoke<C: RestartCommand>(&self, target: &mut C) -> InvokeResult {
        let start = Instant::now();
        let mut result = target.invoke_restart(&self.auth);
        result.duration = start.elapsed();
        result
    }
}
