/**
 * ============================================================================
 * SERVICE MANAGER
 * ============================================================================
 *
 * PURPOSE: The one object a UI shell holds; every operation goes through it
 *
 * OWNS:
 * - CatalogueStore (tracked services, durable)
 * - Executor + StatusProber (OS access)
 * - CredentialCache (memory only)
 * - Coordinator (control pipeline)
 * - StatusMonitor (background refresh)
 * - EventBus (subscribe_events)
 * - ServiceLocks (one operation per service name, shared with the monitor)
 *
 * ============================================================================
 */

use crate::catalogue::allowlist::{KNOWN_SERVICES, KnownService};
use crate::catalogue::{CatalogueStore, ConfigValueType, ServiceConfigEntry, TrackedService};
use crate::config::{self, ManagerConfig};
use crate::coordinator::locks::ServiceLocks;
use crate::coordinator::types::{BatchCancel, ControlAction, OperationResult, PendingAction};
use crate::coordinator::{Coordinator, CoordinatorParts};
use crate::credentials::CredentialCache;
use crate::error::{Result, ServiceError};
use crate::events::{EventBus, EventSubscription, ServiceEvent};
use crate::executor::{
    CommandRecord, CommandRunner, Executor, Platform, ServiceControl, TokioCommandRunner,
    control_for, detect_platform,
};
use crate::logs::{self, ServiceLogs};
use crate::monitor::StatusMonitor;
use crate::status::metrics::{self, ServiceMetrics};
use crate::status::{ServiceStatus, StatusLedger, StatusProber};
use secrecy::SecretString;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

pub struct ServiceManager {
    config: ManagerConfig,
    data_dir: Option<PathBuf>,
    store: Arc<CatalogueStore>,
    executor: Arc<Executor>,
    prober: Arc<StatusProber>,
    ledger: Arc<StatusLedger>,
    locks: Arc<ServiceLocks>,
    coordinator: Arc<Coordinator>,
    monitor: StatusMonitor,
    bus: EventBus,
}

impl ServiceManager {
    /**
     * Production wiring: detected platform, real processes, catalogue in data_dir
     */
    pub fn open(data_dir: &Path, config: ManagerConfig) -> Result<Self> {
        let control = control_for(detect_platform());
        Self::with_parts(config, control, Arc::new(TokioCommandRunner), Some(data_dir))
    }

    /**
     * Explicit wiring; `data_dir` None keeps the catalogue in memory
     */
    pub fn with_parts(
        config: ManagerConfig,
        control: Arc<dyn ServiceControl>,
        runner: Arc<dyn CommandRunner>,
        data_dir: Option<&Path>,
    ) -> Result<Self> {
        config.validate()?;

        let bus = EventBus::new(config.event_capacity);
        let store = Arc::new(match data_dir {
            Some(dir) => CatalogueStore::open(dir, bus.clone())?,
            None => CatalogueStore::in_memory(bus.clone()),
        });
        let executor = Arc::new(Executor::new(
            control,
            runner,
            config.command_timeout(),
            config.diagnostics_capacity,
        ));
        let prober = Arc::new(StatusProber::new(executor.clone(), config.probe_concurrency));
        let credentials = Arc::new(CredentialCache::new(config.credential_ttl()));
        let ledger = Arc::new(StatusLedger::new());
        let locks = Arc::new(ServiceLocks::new());

        let coordinator = Arc::new(Coordinator::new(
            CoordinatorParts {
                store: store.clone(),
                executor: executor.clone(),
                prober: prober.clone(),
                credentials,
                ledger: ledger.clone(),
                locks: locks.clone(),
                bus: bus.clone(),
            },
            config.max_parallel_operations,
            config.verify_grace(),
            config.verify_poll(),
        ));

        let monitor = StatusMonitor::new(
            store.clone(),
            prober.clone(),
            ledger.clone(),
            locks.clone(),
            bus.clone(),
            config.refresh_interval(),
        );

        log::info!(
            "Service manager ready ({:?}, {} tracked services)",
            executor.control().platform(),
            store.list().len()
        );

        Ok(Self {
            config,
            data_dir: data_dir.map(Path::to_path_buf),
            store,
            executor,
            prober,
            ledger,
            locks,
            coordinator,
            monitor,
            bus,
        })
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /**
     * Write the active configuration next to the catalogue
     */
    pub fn save_config(&self) -> Result<()> {
        match &self.data_dir {
            Some(dir) => config::save_config(dir, &self.config),
            None => Err(ServiceError::Config(
                "in-memory manager has no data directory".to_string(),
            )),
        }
    }

    pub fn platform(&self) -> Platform {
        self.executor.control().platform()
    }

    // ------------------------------------------------------------------------
    // Catalogue
    // ------------------------------------------------------------------------

    pub fn list_tracked(&self) -> Vec<TrackedService> {
        self.store.list()
    }

    /**
     * Start tracking an allow-listed service
     * Empty display name, category or description fall back to the allow-list
     */
    pub async fn add_tracking(
        &self,
        name: &str,
        display_name: Option<&str>,
        category: Option<&str>,
        description: Option<&str>,
    ) -> Result<TrackedService> {
        fn non_empty(value: Option<&str>) -> Option<&str> {
            value.map(str::trim).filter(|v| !v.is_empty())
        }

        let known = self.executor.resolve(name)?;
        let service = self.store.add(
            known.name,
            non_empty(display_name).unwrap_or(known.display_name),
            non_empty(category).unwrap_or_else(|| known.category()),
            Some(non_empty(description).unwrap_or(known.description)),
        )?;

        // A monitor round may already have announced it
        let _guard = self.locks.acquire(known.name).await;
        let status = self.prober.probe(known.name).await?;
        match self.ledger.record(known.name, status.state) {
            None => self
                .bus
                .publish(ServiceEvent::service_added(known.name, status.state)),
            Some(old) if old != status.state => self
                .bus
                .publish(ServiceEvent::status_changed(known.name, old, status.state)),
            Some(_) => {}
        }

        Ok(service)
    }

    pub async fn remove_tracking(&self, name: &str) -> Result<()> {
        let known = self.executor.resolve(name)?;
        let _guard = self.locks.acquire(known.name).await;
        self.store.remove(known.name)?;
        self.ledger.forget(known.name);
        self.bus.publish(ServiceEvent::service_removed(known.name));
        Ok(())
    }

    pub fn set_tracking_enabled(&self, name: &str, enabled: bool) -> Result<TrackedService> {
        let known = self.executor.resolve(name)?;
        self.store.set_enabled(known.name, enabled)
    }

    pub fn set_service_config(
        &self,
        name: &str,
        key: &str,
        value: &str,
        value_type: ConfigValueType,
    ) -> Result<ServiceConfigEntry> {
        let known = self.executor.resolve(name)?;
        self.store.set_config(known.name, key, value, value_type)
    }

    pub fn get_service_configs(&self, name: &str) -> Result<Vec<ServiceConfigEntry>> {
        let known = self.executor.resolve(name)?;
        self.store.configs(known.name)
    }

    /// Everything that may be tracked.
    pub fn available_services(&self) -> &'static [KnownService] {
        KNOWN_SERVICES
    }

    /// Allow-listed services actually present on this host.
    pub async fn installed_services(&self) -> Vec<&'static KnownService> {
        self.prober.probe_installed().await
    }

    // ------------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------------

    pub async fn get_status(&self, name: &str) -> Result<ServiceStatus> {
        self.prober.probe(name).await
    }

    pub async fn get_statuses(&self, names: &[String]) -> Result<BTreeMap<String, ServiceStatus>> {
        self.prober.probe_many(names).await
    }

    pub async fn get_logs(&self, name: &str, max_lines: Option<usize>) -> Result<ServiceLogs> {
        let lines = logs::clamp_lines(max_lines, self.config.default_log_lines);
        logs::read_logs(&self.executor, name, lines).await
    }

    /**
     * CPU, memory and disk usage of the service's processes
     */
    pub async fn get_metrics(&self, name: &str) -> Result<ServiceMetrics> {
        metrics::collect_metrics(&self.executor, name).await
    }

    pub fn recent_commands(&self) -> Vec<CommandRecord> {
        self.executor.recent_commands()
    }

    // ------------------------------------------------------------------------
    // Control
    // ------------------------------------------------------------------------

    pub async fn start(&self, name: &str) -> Result<OperationResult> {
        self.coordinator.execute(name, ControlAction::Start).await
    }

    pub async fn stop(&self, name: &str) -> Result<OperationResult> {
        self.coordinator.execute(name, ControlAction::Stop).await
    }

    pub async fn restart(&self, name: &str) -> Result<OperationResult> {
        self.coordinator.execute(name, ControlAction::Restart).await
    }

    pub async fn enable(&self, name: &str) -> Result<OperationResult> {
        self.coordinator.execute(name, ControlAction::Enable).await
    }

    pub async fn disable(&self, name: &str) -> Result<OperationResult> {
        self.coordinator.execute(name, ControlAction::Disable).await
    }

    pub async fn start_many(&self, names: &[String]) -> Vec<OperationResult> {
        self.coordinator.start_many(names, &BatchCancel::new()).await
    }

    pub async fn start_many_cancellable(
        &self,
        names: &[String],
        cancel: &BatchCancel,
    ) -> Vec<OperationResult> {
        self.coordinator.start_many(names, cancel).await
    }

    pub async fn stop_all(&self) -> Vec<OperationResult> {
        self.coordinator.stop_all(&BatchCancel::new()).await
    }

    pub async fn stop_all_cancellable(&self, cancel: &BatchCancel) -> Vec<OperationResult> {
        self.coordinator.stop_all(cancel).await
    }

    // ------------------------------------------------------------------------
    // Credentials
    // ------------------------------------------------------------------------

    /**
     * Cache the administrator password
     * Returns the actions waiting on it, to be passed to resume()
     */
    pub fn submit_credential(&self, secret: impl Into<SecretString>) -> Vec<PendingAction> {
        self.coordinator.submit_credential(secret.into())
    }

    pub async fn resume(&self, pending_id: Uuid) -> Result<OperationResult> {
        self.coordinator.resume(pending_id).await
    }

    pub fn pending_actions(&self) -> Vec<PendingAction> {
        self.coordinator.pending_actions()
    }

    pub fn requires_auth(&self, name: &str) -> Result<bool> {
        self.coordinator.requires_auth(name)
    }

    pub fn clear_credential(&self) {
        self.coordinator.clear_credential();
    }

    // ------------------------------------------------------------------------
    // Events and lifecycle
    // ------------------------------------------------------------------------

    pub fn subscribe_events(&self) -> EventSubscription {
        self.bus.subscribe()
    }

    pub fn start_monitor(&self) {
        self.monitor.start();
    }

    /**
     * Ask the monitor for an immediate round; runs one inline if it is not started
     */
    pub async fn refresh_now(&self) -> Result<()> {
        if self.monitor.is_running() {
            self.monitor.refresh_now();
            Ok(())
        } else {
            self.monitor.refresh_once().await.map(|_| ())
        }
    }

    pub async fn shutdown(&self) {
        log::info!("Shutting down service manager");
        self.monitor.shutdown().await;
        self.coordinator.clear_credential();
    }
}
