use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/**
 * Four-state view of a unit, whatever the service manager reports
 */
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ServiceState {
    Running,
    Stopped,
    Failed,
    Unknown,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ServiceState::Running => "running",
            ServiceState::Stopped => "stopped",
            ServiceState::Failed => "failed",
            ServiceState::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/**
 * Live status of one service, recomputed on every probe and never persisted
 */
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceStatus {
    pub name: String,
    pub system_unit_name: String,
    pub state: ServiceState,
    pub enabled: bool,
    pub uptime: Option<String>,
    pub last_started: Option<DateTime<Utc>>,
}

impl ServiceStatus {
    /// Status used when the unit could not be queried at all.
    pub fn unknown(name: &str, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            system_unit_name: unit.to_string(),
            state: ServiceState::Unknown,
            enabled: false,
            uptime: None,
            last_started: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == ServiceState::Running
    }
}
