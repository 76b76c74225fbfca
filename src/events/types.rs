use crate::status::types::ServiceState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/**
 * Catalogue mutation reported with DatabaseUpdated
 */
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CatalogueOperation {
    Add,
    Remove,
    SetEnabled,
    SetConfig,
}

/**
 * Change notification fanned out to every subscriber
 * Never carries credential material
 */
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ServiceEvent {
    StatusChanged {
        service_name: String,
        old_status: ServiceState,
        new_status: ServiceState,
        timestamp: DateTime<Utc>,
    },
    ServiceAdded {
        service_name: String,
        status: ServiceState,
        timestamp: DateTime<Utc>,
    },
    ServiceRemoved {
        service_name: String,
        timestamp: DateTime<Utc>,
    },
    ServicesRefreshed {
        count: usize,
        timestamp: DateTime<Utc>,
    },
    DatabaseUpdated {
        operation: CatalogueOperation,
        service_name: String,
        timestamp: DateTime<Utc>,
    },
}

impl ServiceEvent {
    pub fn status_changed(service_name: &str, old_status: ServiceState, new_status: ServiceState) -> Self {
        ServiceEvent::StatusChanged {
            service_name: service_name.to_string(),
            old_status,
            new_status,
            timestamp: Utc::now(),
        }
    }

    pub fn service_added(service_name: &str, status: ServiceState) -> Self {
        ServiceEvent::ServiceAdded {
            service_name: service_name.to_string(),
            status,
            timestamp: Utc::now(),
        }
    }

    pub fn service_removed(service_name: &str) -> Self {
        ServiceEvent::ServiceRemoved {
            service_name: service_name.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn services_refreshed(count: usize) -> Self {
        ServiceEvent::ServicesRefreshed {
            count,
            timestamp: Utc::now(),
        }
    }

    pub fn database_updated(operation: CatalogueOperation, service_name: &str) -> Self {
        ServiceEvent::DatabaseUpdated {
            operation,
            service_name: service_name.to_string(),
            timestamp: Utc::now(),
        }
    }

    /**
     * Service the event is about, None for refresh summaries
     */
    pub fn service_name(&self) -> Option<&str> {
        match self {
            ServiceEvent::StatusChanged { service_name, .. }
            | ServiceEvent::ServiceAdded { service_name, .. }
            | ServiceEvent::ServiceRemoved { service_name, .. }
            | ServiceEvent::DatabaseUpdated { service_name, .. } => Some(service_name),
            ServiceEvent::ServicesRefreshed { .. } => None,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ServiceEvent::StatusChanged { timestamp, .. }
            | ServiceEvent::ServiceAdded { timestamp, .. }
            | ServiceEvent::ServiceRemoved { timestamp, .. }
            | ServiceEvent::ServicesRefreshed { timestamp, .. }
            | ServiceEvent::DatabaseUpdated { timestamp, .. } => *timestamp,
        }
    }
}
