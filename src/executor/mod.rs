/**
 * ============================================================================
 * COMMAND EXECUTOR MODULE
 * ============================================================================
 *
 * PURPOSE: The only path from the core to the OS service manager
 *
 * GUARANTEES:
 * - The service name is resolved against the allow-list before anything
 *   else; unknown names fail with InvalidService and no process is spawned
 * - Every invocation is bounded by the command timeout (child killed on expiry)
 * - Every invocation lands in the diagnostics ring, whatever its outcome
 *
 * ARCHITECTURE:
 * - platform: per-OS command sets behind ServiceControl
 * - runner: process spawning behind CommandRunner
 * - diagnostics: bounded CommandRecord ring
 *
 * ============================================================================
 */

pub mod diagnostics;
#[cfg(test)]
pub mod fake;
pub mod platform;
pub mod runner;

use crate::catalogue::allowlist::{self, KnownService};
use crate::coordinator::types::ControlAction;
use crate::credentials::Credential;
use crate::error::{Result, ServiceError};
use chrono::Utc;
use diagnostics::DiagnosticsLog;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub use diagnostics::{CommandOutcome, CommandRecord};
pub use platform::{FailureKind, Platform, ServiceControl, control_for, detect_platform};
pub use runner::{CommandRunner, CommandSpec, TokioCommandRunner};

/**
 * What to do with a unit
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceOp {
    Control(ControlAction),
    QueryState,
    QueryEnabled,
    QueryStarted,
    QueryInstalled,
    QueryMainPid,
    ReadLogs(usize),
}

impl ServiceOp {
    fn is_control(&self) -> bool {
        matches!(self, ServiceOp::Control(_))
    }
}

/**
 * Outcome of a process that ran to completion
 * `failure` is set whenever the exit code is not 0
 */
#[derive(Debug, Clone, PartialEq)]
pub struct ExecResult {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub failure: Option<FailureKind>,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /**
     * Best human-readable explanation of a failure
     */
    pub fn diagnostic_text(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.exit_code {
            Some(code) => format!("command exited with status {}", code),
            None => "command terminated by signal".to_string(),
        }
    }
}

pub struct Executor {
    control: Arc<dyn ServiceControl>,
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
    diagnostics: DiagnosticsLog,
}

impl Executor {
    pub fn new(
        control: Arc<dyn ServiceControl>,
        runner: Arc<dyn CommandRunner>,
        timeout: Duration,
        diagnostics_capacity: usize,
    ) -> Self {
        Self {
            control,
            runner,
            timeout,
            diagnostics: DiagnosticsLog::new(diagnostics_capacity),
        }
    }

    pub fn control(&self) -> &dyn ServiceControl {
        self.control.as_ref()
    }

    /**
     * Allow-list gate shared by every entry point
     */
    pub fn resolve(&self, name: &str) -> Result<&'static KnownService> {
        allowlist::resolve(name).ok_or_else(|| {
            log::warn!("Rejected operation on unknown service '{}'", name);
            ServiceError::InvalidService(name.to_string())
        })
    }

    pub fn requires_elevation(&self, name: &str) -> Result<bool> {
        let known = self.resolve(name)?;
        Ok(self.control.requires_elevation(known))
    }

    /**
     * Run an operation through sudo when the unit needs it
     */
    pub async fn run_privileged(
        &self,
        op: ServiceOp,
        name: &str,
        credential: &Credential,
    ) -> Result<ExecResult> {
        let known = self.resolve(name)?;
        let spec = self.spec_for(&op, known)?;
        let spec = if self.control.requires_elevation(known) {
            spec.elevated(credential.secret().clone())
        } else {
            spec
        };
        self.execute(known, spec).await
    }

    pub async fn run_unprivileged(&self, op: ServiceOp, name: &str) -> Result<ExecResult> {
        let known = self.resolve(name)?;
        let spec = self.spec_for(&op, known)?;
        self.execute(known, spec).await
    }

    fn spec_for(&self, op: &ServiceOp, known: &KnownService) -> Result<CommandSpec> {
        self.control.command(op, known).ok_or_else(|| {
            let reason = format!("{:?} is not supported on {:?}", op, self.control.platform());
            if op.is_control() {
                ServiceError::ExecutionFailed {
                    service: known.name.to_string(),
                    exit_code: None,
                    message: reason,
                }
            } else {
                ServiceError::ProbeUnavailable {
                    service: known.name.to_string(),
                    reason,
                }
            }
        })
    }

    async fn execute(&self, known: &KnownService, spec: CommandSpec) -> Result<ExecResult> {
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, self.runner.run(&spec)).await;
        let duration = started.elapsed();

        let mut record = CommandRecord {
            timestamp: Utc::now(),
            program: spec.program.clone(),
            args: spec.args.clone(),
            unit: known.unit.to_string(),
            exit_code: None,
            duration_ms: duration.as_millis() as u64,
            outcome: CommandOutcome::Succeeded,
        };

        let result = match outcome {
            Err(_) => {
                record.outcome = CommandOutcome::TimedOut;
                self.diagnostics.record(record);
                log::error!(
                    "Command for {} timed out after {}s",
                    known.name,
                    self.timeout.as_secs()
                );
                return Err(ServiceError::Timeout {
                    service: known.name.to_string(),
                    seconds: self.timeout.as_secs(),
                });
            }
            Ok(Err(e)) => {
                record.outcome = CommandOutcome::SpawnFailed;
                self.diagnostics.record(record);
                log::error!("Failed to run {} for {}: {}", spec.program, known.name, e);
                return Err(ServiceError::Io(e));
            }
            Ok(Ok(output)) => output,
        };

        let mut exec = ExecResult {
            exit_code: result.exit_code,
            stdout: result.stdout,
            stderr: result.stderr,
            duration,
            failure: None,
        };
        record.exit_code = exec.exit_code;

        if !exec.success() {
            record.outcome = CommandOutcome::ExitedNonZero;
            exec.failure = Some(self.control.classify_failure(&exec));
        }
        self.diagnostics.record(record);

        Ok(exec)
    }

    pub fn recent_commands(&self) -> Vec<CommandRecord> {
        self.diagnostics.recent()
    }
}
