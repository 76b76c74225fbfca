/**
 * ============================================================================
 * OPERATION COORDINATOR MODULE
 * ============================================================================
 *
 * PURPOSE: Turn an intent ("start redis") into a safe, verified operation
 *
 * PIPELINE (per service):
 * Requested → Validating → [AuthRequired → WaitingForCredential → Validating]
 *           → Executing → Verifying → Completed | Failed
 *
 * RULES:
 * - Unknown or untracked names fail in Validating, before any OS call
 * - Operations on the same name never overlap (per-name lock)
 * - Operations on different names share max_parallel_operations permits
 * - A missing credential suspends the pipeline as a PendingAction instead
 *   of blocking; resume(id) picks it up after submit_credential()
 * - A rejected credential is invalidated by generation and allows one retry
 * - StatusChanged is published just before the result is returned
 *
 * ============================================================================
 */

pub mod locks;
pub mod types;

use crate::catalogue::allowlist::KnownService;
use crate::catalogue::CatalogueStore;
use crate::credentials::CredentialCache;
use crate::error::{Result, ServiceError};
use crate::events::{EventBus, ServiceEvent};
use crate::executor::{ExecResult, Executor, FailureKind, ServiceOp};
use crate::status::{ServiceState, ServiceStatus, StatusLedger, StatusProber};
use futures_util::future::join_all;
use locks::ServiceLocks;
use secrecy::SecretString;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use types::{BatchCancel, ControlAction, OperationPhase, OperationResult, PendingAction};
use uuid::Uuid;

pub struct Coordinator {
    store: Arc<CatalogueStore>,
    executor: Arc<Executor>,
    prober: Arc<StatusProber>,
    credentials: Arc<CredentialCache>,
    ledger: Arc<StatusLedger>,
    locks: Arc<ServiceLocks>,
    bus: EventBus,
    permits: Semaphore,
    pending: Mutex<HashMap<Uuid, PendingAction>>,
    verify_grace: Duration,
    verify_poll: Duration,
}

/**
 * Shared collaborators handed to the coordinator at construction
 */
pub struct CoordinatorParts {
    pub store: Arc<CatalogueStore>,
    pub executor: Arc<Executor>,
    pub prober: Arc<StatusProber>,
    pub credentials: Arc<CredentialCache>,
    pub ledger: Arc<StatusLedger>,
    pub locks: Arc<ServiceLocks>,
    pub bus: EventBus,
}

// Outcome of the Executing phase before verification
enum Executed {
    Done(ExecResult),
    Cancelled,
}

impl Coordinator {
    pub fn new(
        parts: CoordinatorParts,
        max_parallel_operations: usize,
        verify_grace: Duration,
        verify_poll: Duration,
    ) -> Self {
        Self {
            store: parts.store,
            executor: parts.executor,
            prober: parts.prober,
            credentials: parts.credentials,
            ledger: parts.ledger,
            locks: parts.locks,
            bus: parts.bus,
            permits: Semaphore::new(max_parallel_operations.max(1)),
            pending: Mutex::new(HashMap::new()),
            verify_grace,
            verify_poll,
        }
    }

    /**
     * Run one control action on one service
     */
    pub async fn execute(&self, name: &str, action: ControlAction) -> Result<OperationResult> {
        self.run(PendingAction::new(name, action), None).await
    }

    /**
     * Re-enter the pipeline for a suspended action
     */
    pub async fn resume(&self, id: Uuid) -> Result<OperationResult> {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
            .ok_or_else(|| ServiceError::NotFound(format!("pending action {}", id)))?;

        log::info!("Resuming {} {} ({})", pending.action, pending.service, id);
        self.run(pending, None).await
    }

    /**
     * Cache the operator's password and hand back what is waiting on it
     */
    pub fn submit_credential(&self, secret: SecretString) -> Vec<PendingAction> {
        self.credentials.store(secret, None);
        self.pending_actions()
    }

    /// Suspended actions, oldest first.
    pub fn pending_actions(&self) -> Vec<PendingAction> {
        let mut pending: Vec<PendingAction> = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        pending.sort_by_key(|p| p.created_at);
        pending
    }

    /**
     * Whether a control action on `name` would prompt for a password right now
     */
    pub fn requires_auth(&self, name: &str) -> Result<bool> {
        Ok(self.executor.requires_elevation(name)? && !self.credentials.is_valid())
    }

    pub fn clear_credential(&self) {
        self.credentials.invalidate();
    }

    pub fn is_busy(&self, name: &str) -> bool {
        self.locks.is_busy(name)
    }

    /**
     * Start every named service concurrently
     * Results line up with `names`; one failure never aborts the others
     */
    pub async fn start_many(&self, names: &[String], cancel: &BatchCancel) -> Vec<OperationResult> {
        self.run_batch(names, ControlAction::Start, cancel).await
    }

    /**
     * Stop every tracked service, results in catalogue order
     */
    pub async fn stop_all(&self, cancel: &BatchCancel) -> Vec<OperationResult> {
        let names: Vec<String> = self.store.list().into_iter().map(|s| s.name).collect();
        if names.is_empty() {
            log::info!("Stop all: nothing tracked");
            return Vec::new();
        }
        self.run_batch(&names, ControlAction::Stop, cancel).await
    }

    async fn run_batch(
        &self,
        names: &[String],
        action: ControlAction,
        cancel: &BatchCancel,
    ) -> Vec<OperationResult> {
        log::info!("Batch {} of {} services", action, names.len());

        let operations = names.iter().map(|name| async move {
            match self.run(PendingAction::new(name, action), Some(cancel)).await {
                Ok(result) => result,
                Err(e) => {
                    let mut result = OperationResult::failed(name, action, e.to_string());
                    if let ServiceError::ExecutionFailed { message, .. } = &e {
                        result.diagnostics = Some(message.clone());
                    }
                    result
                }
            }
        });

        let results = join_all(operations).await;
        let failed = results.iter().filter(|r| !r.success).count();
        log::info!(
            "Batch {} finished: {} succeeded, {} failed",
            action,
            results.len() - failed,
            failed
        );
        results
    }

    fn phase(&self, pending: &PendingAction, phase: OperationPhase) {
        log::debug!("{} {} [{}]: {:?}", pending.action, pending.service, pending.id, phase);
    }

    /**
     * Allow-listed and tracked, or InvalidService
     */
    fn validate(&self, name: &str) -> Result<&'static KnownService> {
        let known = self.executor.resolve(name)?;
        if !self.store.contains(known.name) {
            log::warn!("Rejected operation on untracked service '{}'", name);
            return Err(ServiceError::InvalidService(name.to_string()));
        }
        Ok(known)
    }

    /**
     * Keep a suspended action, replacing any older one for the same intent
     */
    fn park(&self, pending: PendingAction) {
        let mut map = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        map.retain(|_, p| !(p.service == pending.service && p.action == pending.action));
        map.insert(pending.id, pending);
    }

    fn discard_pending(&self, service: &str, action: ControlAction) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|_, p| !(p.service == service && p.action == action));
    }

    async fn run(
        &self,
        pending: PendingAction,
        cancel: Option<&BatchCancel>,
    ) -> Result<OperationResult> {
        self.phase(&pending, OperationPhase::Requested);
        self.phase(&pending, OperationPhase::Validating);
        let known = self.validate(&pending.service)?;
        let action = pending.action;

        let _guard = self.locks.acquire(known.name).await;
        let before = self.prober.probe(known.name).await?;

        if action.is_satisfied_by(&before) {
            log::info!("{} is already {}, nothing to do", known.name, action.past_tense());
            self.discard_pending(&pending.service, action);
            self.ledger.record(known.name, before.state);
            return Ok(OperationResult {
                service: known.name.to_string(),
                action,
                success: true,
                confirmed: true,
                message: format!("{} is already {}", known.display_name, action.past_tense()),
                updated_status: Some(before),
                diagnostics: None,
            });
        }

        let credential = if self.executor.control().requires_elevation(known) {
            match self.credentials.get_or_prompt(&pending) {
                Ok(credential) => Some(credential),
                Err(e) => {
                    self.phase(&pending, OperationPhase::AuthRequired);
                    self.phase(&pending, OperationPhase::WaitingForCredential);
                    self.park(pending);
                    return Err(e);
                }
            }
        } else {
            None
        };

        let executed = {
            let _permit = self.permits.acquire().await.map_err(|_| ServiceError::ExecutionFailed {
                service: known.name.to_string(),
                exit_code: None,
                message: "coordinator is shutting down".to_string(),
            })?;

            if cancel.is_some_and(BatchCancel::is_cancelled) {
                Executed::Cancelled
            } else {
                self.phase(&pending, OperationPhase::Executing);
                let op = ServiceOp::Control(action);
                let outcome = match &credential {
                    Some(credential) => self.executor.run_privileged(op, known.name, credential).await,
                    None => self.executor.run_unprivileged(op, known.name).await,
                };
                match outcome {
                    Ok(result) => Executed::Done(result),
                    Err(e) => {
                        self.phase(&pending, OperationPhase::Failed);
                        self.settle_failure(known, &before).await;
                        return Err(e);
                    }
                }
            }
        };

        let result = match executed {
            Executed::Cancelled => {
                log::info!("{} {} cancelled before execution", action, known.name);
                return Ok(OperationResult::failed(known.name, action, "cancelled"));
            }
            Executed::Done(result) => result,
        };

        if !result.success() {
            if result.failure == Some(FailureKind::AuthenticationRejected) {
                if let Some(credential) = &credential {
                    self.credentials.invalidate_generation(credential.generation());
                }
                self.phase(&pending, OperationPhase::AuthRequired);

                let retry = if pending.attempts == 0 {
                    let retry = pending.retry();
                    self.park(retry.clone());
                    Some(retry)
                } else {
                    self.discard_pending(&pending.service, action);
                    None
                };
                log::warn!(
                    "Credential rejected for {} {} (retry allowed: {})",
                    action,
                    known.name,
                    retry.is_some()
                );
                return Err(ServiceError::AuthenticationFailed {
                    service: known.name.to_string(),
                    message: result.diagnostic_text(),
                    retry,
                });
            }

            self.phase(&pending, OperationPhase::Failed);
            self.discard_pending(&pending.service, action);
            let message = result.diagnostic_text();
            log::error!("Failed to {} {}: {}", action, known.name, message);
            self.settle_failure(known, &before).await;
            return Err(ServiceError::ExecutionFailed {
                service: known.name.to_string(),
                exit_code: result.exit_code,
                message,
            });
        }

        self.phase(&pending, OperationPhase::Verifying);
        self.discard_pending(&pending.service, action);
        let (after, confirmed) = self.verify(known, action).await;

        let message = if confirmed {
            format!("{} {}", known.display_name, action.past_tense())
        } else {
            format!(
                "{} command for {} succeeded but the change was not confirmed (currently {})",
                action, known.display_name, after.state
            )
        };
        if confirmed {
            log::info!("{}", message);
        } else {
            log::warn!("{}", message);
        }

        self.phase(&pending, OperationPhase::Completed);
        self.ledger.record(known.name, after.state);
        self.bus
            .publish(ServiceEvent::status_changed(known.name, before.state, after.state));

        Ok(OperationResult {
            service: known.name.to_string(),
            action,
            success: true,
            confirmed,
            message,
            updated_status: Some(after),
            diagnostics: None,
        })
    }

    /**
     * Re-probe until the action's target is visible or the grace period ends
     */
    async fn verify(&self, known: &KnownService, action: ControlAction) -> (ServiceStatus, bool) {
        let deadline = Instant::now() + self.verify_grace;
        loop {
            let status = match self.prober.probe(known.name).await {
                Ok(status) => status,
                Err(_) => ServiceStatus::unknown(known.name, known.unit),
            };

            let reached = match (action.expected_state(), action.expected_enabled()) {
                (Some(state), _) => status.state == state,
                (None, Some(enabled)) => status.enabled == enabled,
                (None, None) => true,
            };
            if reached {
                return (status, true);
            }
            if Instant::now() >= deadline {
                return (status, false);
            }
            tokio::time::sleep(self.verify_poll).await;
        }
    }

    /**
     * Record and announce whatever state a failed command left behind
     */
    async fn settle_failure(&self, known: &KnownService, before: &ServiceStatus) {
        let after = match self.prober.probe(known.name).await {
            Ok(status) => status.state,
            Err(_) => ServiceState::Unknown,
        };
        self.ledger.record(known.name, after);
        self.bus
            .publish(ServiceEvent::status_changed(known.name, before.state, after));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::allowlist;
    use crate::executor::fake::FakeRunner;
    use crate::executor::platform::SystemdControl;

    struct Harness {
        coordinator: Arc<Coordinator>,
        runner: Arc<FakeRunner>,
        store: Arc<CatalogueStore>,
        bus: EventBus,
    }

    fn harness(tracked: &[&str]) -> Harness {
        harness_with_limit(tracked, 4)
    }

    fn harness_with_limit(tracked: &[&str], max_parallel_operations: usize) -> Harness {
        let bus = EventBus::new(64);
        let runner = Arc::new(FakeRunner::new());
        let executor = Arc::new(Executor::new(
            Arc::new(SystemdControl),
            runner.clone(),
            Duration::from_secs(30),
            100,
        ));
        let store = Arc::new(CatalogueStore::in_memory(bus.clone()));
        for name in tracked {
            store.add(name, name, "Other", None).unwrap();
        }
        let parts = CoordinatorParts {
            store: store.clone(),
            executor: executor.clone(),
            prober: Arc::new(StatusProber::new(executor, 4)),
            credentials: Arc::new(CredentialCache::new(Duration::from_secs(300))),
            ledger: Arc::new(StatusLedger::new()),
            locks: Arc::new(ServiceLocks::new()),
            bus: bus.clone(),
        };
        let coordinator = Coordinator::new(
            parts,
            max_parallel_operations,
            Duration::from_millis(500),
            Duration::from_millis(100),
        );
        Harness {
            coordinator: Arc::new(coordinator),
            runner,
            store,
            bus,
        }
    }

    fn status_changes(bus_events: Vec<ServiceEvent>) -> Vec<(String, ServiceState, ServiceState)> {
        bus_events
            .into_iter()
            .filter_map(|event| match event {
                ServiceEvent::StatusChanged {
                    service_name,
                    old_status,
                    new_status,
                    ..
                } => Some((service_name, old_status, new_status)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_start_requires_then_uses_credential() {
        let h = harness(&["redis"]);
        let mut events = h.bus.subscribe();

        let err = h.coordinator.execute("redis", ControlAction::Start).await.unwrap_err();
        let pending = err.pending_action().cloned().unwrap();
        assert!(matches!(err, ServiceError::AuthenticationRequired(_)));
        assert_eq!(h.runner.control_calls(), 0);

        let waiting = h.coordinator.submit_credential(SecretString::from("secret"));
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].id, pending.id);

        let result = h.coordinator.resume(pending.id).await.unwrap();
        assert!(result.success && result.confirmed);
        assert_eq!(result.updated_status.unwrap().state, ServiceState::Running);
        assert!(h.coordinator.pending_actions().is_empty());

        assert_eq!(
            status_changes(events.drain()),
            vec![("redis".to_string(), ServiceState::Stopped, ServiceState::Running)]
        );
    }

    #[tokio::test]
    async fn test_untracked_and_unknown_names_rejected_without_commands() {
        let h = harness(&["redis"]);
        h.coordinator.submit_credential(SecretString::from("secret"));

        for name in ["nginx", "sshd", "redis && reboot"] {
            let err = h.coordinator.execute(name, ControlAction::Start).await.unwrap_err();
            assert!(matches!(err, ServiceError::InvalidService(_)), "{name}");
        }
        assert_eq!(h.runner.calls(), 0);
    }

    #[tokio::test]
    async fn test_noop_start_issues_no_control_call_and_no_event() {
        let h = harness(&["redis"]);
        h.runner.set_running("redis.service");
        let mut events = h.bus.subscribe();

        let result = h.coordinator.execute("redis", ControlAction::Start).await.unwrap();
        assert!(result.success);
        assert_eq!(h.runner.control_calls(), 0);
        assert!(events.drain().is_empty());
    }

    #[tokio::test]
    async fn test_user_unit_needs_no_credential() {
        let h = harness(&["syncthing"]);
        assert!(!h.coordinator.requires_auth("syncthing").unwrap());

        let result = h.coordinator.execute("syncthing", ControlAction::Start).await.unwrap();
        assert!(result.success);
        assert_eq!(h.runner.history().last().unwrap()[0], "systemctl");
    }

    #[tokio::test(start_paused = true)]
    async fn test_credential_expiry_reprompts() {
        let h = harness(&["redis"]);
        h.coordinator.submit_credential(SecretString::from("secret"));

        tokio::time::advance(Duration::from_secs(120)).await;
        assert!(h.coordinator.execute("redis", ControlAction::Start).await.is_ok());

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(h.coordinator.requires_auth("redis").unwrap());
        assert!(matches!(
            h.coordinator.execute("redis", ControlAction::Stop).await,
            Err(ServiceError::AuthenticationRequired(_))
        ));
    }

    #[tokio::test]
    async fn test_rejected_credential_allows_exactly_one_retry() {
        let h = harness(&["redis"]);
        h.coordinator.submit_credential(SecretString::from("wrong"));

        let err = h.coordinator.execute("redis", ControlAction::Start).await.unwrap_err();
        let retry = match err {
            ServiceError::AuthenticationFailed { retry: Some(retry), .. } => retry,
            other => panic!("expected retryable AuthenticationFailed, got {other:?}"),
        };
        assert!(h.coordinator.requires_auth("redis").unwrap());

        h.coordinator.submit_credential(SecretString::from("still wrong"));
        let err = h.coordinator.resume(retry.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::AuthenticationFailed { retry: None, .. }));
        assert!(h.coordinator.pending_actions().is_empty());
        assert_eq!(h.runner.state_of("redis.service"), "inactive");
    }

    #[tokio::test]
    async fn test_retry_with_correct_password_succeeds() {
        let h = harness(&["redis"]);
        h.coordinator.submit_credential(SecretString::from("wrong"));
        let err = h.coordinator.execute("redis", ControlAction::Start).await.unwrap_err();
        let retry = err.pending_action().cloned().unwrap();

        h.coordinator.submit_credential(SecretString::from("secret"));
        let result = h.coordinator.resume(retry.id).await.unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_execution_failure_surfaces_diagnostics() {
        let h = harness(&["redis"]);
        h.runner.fail_unit("redis.service");
        h.coordinator.submit_credential(SecretString::from("secret"));
        let mut events = h.bus.subscribe();

        let err = h.coordinator.execute("redis", ControlAction::Start).await.unwrap_err();
        match err {
            ServiceError::ExecutionFailed { exit_code, message, .. } => {
                assert_eq!(exit_code, Some(1));
                assert!(message.contains("control process exited"));
            }
            other => panic!("expected ExecutionFailed, got {other:?}"),
        }
        assert_eq!(
            status_changes(events.drain()),
            vec![("redis".to_string(), ServiceState::Stopped, ServiceState::Stopped)]
        );
        assert!(!h.coordinator.is_busy("redis"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfirmed_transition_reported() {
        let h = harness(&["redis"]);
        h.runner.sticky_unit("redis.service");
        h.coordinator.submit_credential(SecretString::from("secret"));

        let result = h.coordinator.execute("redis", ControlAction::Start).await.unwrap();
        assert!(result.success);
        assert!(!result.confirmed);
        assert!(result.message.contains("not confirmed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_not_retried() {
        let h = harness(&["redis"]);
        h.coordinator.submit_credential(SecretString::from("secret"));
        h.runner.hang_unit("redis.service");

        let err = h.coordinator.execute("redis", ControlAction::Restart).await.unwrap_err();
        assert!(matches!(err, ServiceError::Timeout { .. }));
        let restarts = h
            .runner
            .history()
            .iter()
            .filter(|argv| argv.iter().any(|a| a == "restart"))
            .count();
        assert_eq!(restarts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_service_operations_never_overlap() {
        let h = harness(&["redis"]);
        h.runner.set_delay(Duration::from_millis(200));
        h.coordinator.submit_credential(SecretString::from("secret"));

        let a = h.coordinator.clone();
        let b = h.coordinator.clone();
        let (start, stop) = tokio::join!(
            async move { a.execute("redis", ControlAction::Start).await },
            async move { b.execute("redis", ControlAction::Stop).await },
        );

        assert!(start.is_ok());
        assert!(stop.is_ok());
        assert!(!h.runner.saw_overlap());
        assert_eq!(h.runner.control_calls(), 2);
    }

    #[tokio::test]
    async fn test_stop_all_isolates_failures() {
        let h = harness(&["nginx", "redis", "mysql"]);
        for unit in ["nginx.service", "redis.service", "mysql.service"] {
            h.runner.set_running(unit);
        }
        h.runner.fail_unit("redis.service");
        h.coordinator.submit_credential(SecretString::from("secret"));

        let results = h.coordinator.stop_all(&BatchCancel::new()).await;
        let summary: Vec<_> = results.iter().map(|r| (r.service.as_str(), r.success)).collect();
        assert_eq!(summary, vec![("nginx", true), ("redis", false), ("mysql", true)]);
        assert!(results[1].diagnostics.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all_bounded_by_worker_pool() {
        let names = ["nginx", "redis", "mysql", "postgresql", "mongodb", "memcached"];
        let h = harness_with_limit(&names, 2);
        for name in names {
            h.runner.set_running(allowlist::resolve(name).unwrap().unit);
        }
        h.runner.set_delay(Duration::from_millis(200));
        h.coordinator.submit_credential(SecretString::from("secret"));

        let results = h.coordinator.stop_all(&BatchCancel::new()).await;

        assert_eq!(results.len(), 6);
        assert!(results.iter().all(|r| r.success && r.confirmed));
        assert_eq!(h.runner.control_calls(), 6);
        assert_eq!(h.runner.peak_control_concurrency(), 2);
    }

    #[tokio::test]
    async fn test_stop_all_with_nothing_tracked() {
        let h = harness(&[]);
        let mut events = h.bus.subscribe();

        assert!(h.coordinator.stop_all(&BatchCancel::new()).await.is_empty());
        assert!(events.drain().is_empty());
        assert_eq!(h.runner.calls(), 0);
    }

    #[tokio::test]
    async fn test_start_many_aligned_with_input() {
        let h = harness(&["nginx", "redis"]);
        h.coordinator.submit_credential(SecretString::from("secret"));

        let names = vec!["redis".to_string(), "kafka".to_string(), "nginx".to_string()];
        let results = h.coordinator.start_many(&names, &BatchCancel::new()).await;

        let summary: Vec<_> = results.iter().map(|r| (r.service.as_str(), r.success)).collect();
        assert_eq!(summary, vec![("redis", true), ("kafka", false), ("nginx", true)]);
        assert!(h.store.contains("redis"));
    }

    #[tokio::test]
    async fn test_cancelled_batch_runs_nothing() {
        let h = harness(&["nginx", "redis"]);
        h.coordinator.submit_credential(SecretString::from("secret"));
        let cancel = BatchCancel::new();
        cancel.cancel();

        let names = vec!["nginx".to_string(), "redis".to_string()];
        let results = h.coordinator.start_many(&names, &cancel).await;
        assert!(results.iter().all(|r| !r.success && r.message == "cancelled"));
        assert_eq!(h.runner.control_calls(), 0);
    }

    #[tokio::test]
    async fn test_event_follows_result() {
        let h = harness(&["redis"]);
        h.coordinator.submit_credential(SecretString::from("secret"));
        let mut events = h.bus.subscribe();

        let result = h.coordinator.execute("redis", ControlAction::Start).await.unwrap();
        assert!(result.success);

        match events.try_recv() {
            Some(ServiceEvent::StatusChanged { old_status, new_status, .. }) => {
                assert_eq!(old_status, ServiceState::Stopped);
                assert_eq!(new_status, ServiceState::Running);
            }
            other => panic!("expected StatusChanged, got {other:?}"),
        }
    }
}
