/**
 * ============================================================================
 * STATUS PROBER
 * ============================================================================
 *
 * PURPOSE: Read-only status queries for one or many services
 *
 * BEHAVIOR:
 * - A probe never fails for an allow-listed name; anything that goes wrong
 *   (timeout, unparsable output, unsupported query) degrades to Unknown
 * - Unknown names fail with InvalidService before any command runs
 * - probe_many fans out with at most probe_concurrency queries in flight
 *
 * ============================================================================
 */

use crate::catalogue::allowlist::{KNOWN_SERVICES, KnownService};
use crate::error::Result;
use crate::executor::{Executor, ServiceOp};
use crate::status::types::{ServiceState, ServiceStatus};
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct StatusProber {
    executor: Arc<Executor>,
    concurrency: usize,
}

impl StatusProber {
    pub fn new(executor: Arc<Executor>, concurrency: usize) -> Self {
        Self {
            executor,
            concurrency: concurrency.max(1),
        }
    }

    /**
     * Live status of one service
     */
    pub async fn probe(&self, name: &str) -> Result<ServiceStatus> {
        let known = self.executor.resolve(name)?;
        Ok(probe_known(self.executor.clone(), known).await)
    }

    /**
     * Live status of several services, keyed by canonical name
     * All names are validated before the first query is issued
     */
    pub async fn probe_many(&self, names: &[String]) -> Result<BTreeMap<String, ServiceStatus>> {
        let known = names
            .iter()
            .map(|name| self.executor.resolve(name))
            .collect::<Result<Vec<_>>>()?;

        // Each future owns its executor handle so the round stays Send
        let executor = self.executor.clone();
        let probes: Vec<_> = known
            .into_iter()
            .map(|k| probe_known(executor.clone(), k))
            .collect();
        let statuses: Vec<ServiceStatus> = stream::iter(probes)
            .buffered(self.concurrency)
            .collect()
            .await;

        Ok(statuses.into_iter().map(|s| (s.name.clone(), s)).collect())
    }

    /**
     * Allow-listed services whose unit exists on this host
     */
    pub async fn probe_installed(&self) -> Vec<&'static KnownService> {
        let executor = self.executor.clone();
        let checks: Vec<(&'static KnownService, bool)> = stream::iter(KNOWN_SERVICES.iter())
            .map(move |known| probe_installed_one(executor.clone(), known))
            .buffered(self.concurrency)
            .collect()
            .await;

        checks
            .into_iter()
            .filter(|(_, installed)| *installed)
            .map(|(known, _)| known)
            .collect()
    }
}

async fn probe_known(executor: Arc<Executor>, known: &'static KnownService) -> ServiceStatus {
    let control = executor.control();

    let state = match executor.run_unprivileged(ServiceOp::QueryState, known.name).await {
        Ok(result) => control.parse_state(known, &result),
        Err(e) => {
            log::warn!("State probe for {} degraded to Unknown: {}", known.name, e);
            ServiceState::Unknown
        }
    };

    let enabled = match executor.run_unprivileged(ServiceOp::QueryEnabled, known.name).await {
        Ok(result) => control.parse_enabled(known, &result),
        Err(e) => {
            log::warn!("Enabled probe for {} failed: {}", known.name, e);
            false
        }
    };

    let last_started = if state == ServiceState::Running {
        match executor.run_unprivileged(ServiceOp::QueryStarted, known.name).await {
            Ok(result) => control.parse_started(&result),
            Err(e) => {
                log::debug!("Start time unavailable for {}: {}", known.name, e);
                None
            }
        }
    } else {
        None
    };

    log::debug!("Probed {}: {:?} (enabled: {})", known.name, state, enabled);

    ServiceStatus {
        name: known.name.to_string(),
        system_unit_name: known.unit.to_string(),
        state,
        enabled,
        uptime: last_started.map(|started| humanize_uptime(started, Utc::now())),
        last_started,
    }
}

async fn probe_installed_one(
    executor: Arc<Executor>,
    known: &'static KnownService,
) -> (&'static KnownService, bool) {
    let installed = match executor.run_unprivileged(ServiceOp::QueryInstalled, known.name).await {
        Ok(result) => executor.control().parse_installed(known, &result),
        Err(e) => {
            log::debug!("Install check for {} failed: {}", known.name, e);
            false
        }
    };
    (known, installed)
}

/**
 * "3d 4h", "2h 5m", "12m", "42s"
 */
pub fn humanize_uptime(started: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - started).num_seconds().max(0);
    let (days, hours, minutes) = (secs / 86_400, (secs % 86_400) / 3600, (secs % 3600) / 60);

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        format!("{}s", secs)
    }
}
