/**
 * ============================================================================
 * STATUS MONITOR MODULE
 * ============================================================================
 *
 * PURPOSE: Background refresh of enabled tracked services
 *
 * Each round probes every enabled tracked service (skipping those with an
 * operation in flight), diffs against the shared ledger and publishes:
 * StatusChanged / ServiceAdded / ServiceRemoved, then ServicesRefreshed.
 * A probed name stays locked until its events are published, so a control
 * operation never interleaves with a stale sample.
 *
 * LIFECYCLE:
 * - start(): spawn the loop (no-op if already running)
 * - refresh_now(): wake the loop for an immediate round
 * - shutdown(): raise the stop flag and wait for the loop to exit
 *
 * ============================================================================
 */

use crate::catalogue::CatalogueStore;
use crate::coordinator::locks::ServiceLocks;
use crate::error::Result;
use crate::events::{EventBus, ServiceEvent};
use crate::status::{StatusLedger, StatusProber};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

struct MonitorInner {
    store: Arc<CatalogueStore>,
    prober: Arc<StatusProber>,
    ledger: Arc<StatusLedger>,
    locks: Arc<ServiceLocks>,
    bus: EventBus,
    stop: AtomicBool,
    wake: Notify,
}

pub struct StatusMonitor {
    inner: Arc<MonitorInner>,
    interval: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl StatusMonitor {
    pub fn new(
        store: Arc<CatalogueStore>,
        prober: Arc<StatusProber>,
        ledger: Arc<StatusLedger>,
        locks: Arc<ServiceLocks>,
        bus: EventBus,
        interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                store,
                prober,
                ledger,
                locks,
                bus,
                stop: AtomicBool::new(false),
                wake: Notify::new(),
            }),
            interval,
            handle: Mutex::new(None),
        }
    }

    pub fn start(&self) {
        let mut handle = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        if handle.is_some() {
            log::warn!("Status monitor already running");
            return;
        }

        self.inner.stop.store(false, Ordering::SeqCst);
        let inner = self.inner.clone();
        let interval = self.interval;

        log::info!("Starting status monitor (every {}s)", interval.as_secs());
        *handle = Some(tokio::spawn(async move {
            monitor_loop(inner, interval).await;
        }));
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    pub fn refresh_now(&self) {
        self.inner.wake.notify_one();
    }

    /**
     * Run one refresh round inline
     * Returns the number of services probed
     */
    pub async fn refresh_once(&self) -> Result<usize> {
        self.inner.refresh_once().await
    }

    pub async fn shutdown(&self) {
        self.inner.stop.store(true, Ordering::SeqCst);
        self.inner.wake.notify_one();

        let handle = self.handle.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                log::error!("Status monitor task ended abnormally: {}", e);
            }
            log::info!("Status monitor stopped");
        }
    }
}

async fn monitor_loop(inner: Arc<MonitorInner>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = inner.wake.notified() => {}
        }

        if inner.stop.load(Ordering::SeqCst) {
            break;
        }

        if let Err(e) = inner.refresh_once().await {
            log::warn!("Status refresh failed: {}", e);
        }
    }
}

impl MonitorInner {
    async fn refresh_once(&self) -> Result<usize> {
        let tracked: Vec<String> = self
            .store
            .list()
            .into_iter()
            .filter(|s| s.enabled)
            .map(|s| s.name)
            .collect();

        // Every name this round may touch stays locked until the ledger and
        // the bus are updated; names mid-operation are left to the coordinator
        let mut guards = Vec::new();
        let mut idle = Vec::new();
        let mut busy = HashSet::new();
        for name in tracked {
            match self.locks.try_acquire(&name) {
                Some(guard) => {
                    guards.push(guard);
                    idle.push(name);
                }
                None => {
                    busy.insert(name);
                }
            }
        }
        for name in self.ledger.names() {
            if idle.contains(&name) || busy.contains(&name) {
                continue;
            }
            match self.locks.try_acquire(&name) {
                Some(guard) => guards.push(guard),
                None => {
                    busy.insert(name);
                }
            }
        }

        let statuses = self.prober.probe_many(&idle).await?;
        let diff = self.ledger.reconcile(&statuses, &busy);

        for (name, old, new) in &diff.changed {
            log::info!("Status change detected for {}: {:?} -> {:?}", name, old, new);
            self.bus.publish(ServiceEvent::status_changed(name, *old, *new));
        }
        for (name, state) in &diff.added {
            self.bus.publish(ServiceEvent::service_added(name, *state));
        }
        for name in &diff.removed {
            self.bus.publish(ServiceEvent::service_removed(name));
        }
        drop(guards);

        let count = statuses.len();
        self.bus.publish(ServiceEvent::services_refreshed(count));
        log::debug!("Status refresh probed {} services", count);
        Ok(count)
    }
}
