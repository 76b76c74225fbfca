/**
 * ============================================================================
 * COORDINATOR TYPES MODULE
 * ============================================================================
 *
 * PURPOSE: Intents, pipeline phases and results of control operations
 *
 * ============================================================================
 */

use crate::status::types::{ServiceState, ServiceStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Start,
    Stop,
    Restart,
    Enable,
    Disable,
}

impl ControlAction {
    /**
     * Run state the action should leave the unit in, if it changes one
     */
    pub fn expected_state(&self) -> Option<ServiceState> {
        match self {
            ControlAction::Start | ControlAction::Restart => Some(ServiceState::Running),
            ControlAction::Stop => Some(ServiceState::Stopped),
            ControlAction::Enable | ControlAction::Disable => None,
        }
    }

    /**
     * Boot-enabled flag the action should leave the unit with, if it changes it
     */
    pub fn expected_enabled(&self) -> Option<bool> {
        match self {
            ControlAction::Enable => Some(true),
            ControlAction::Disable => Some(false),
            _ => None,
        }
    }

    /**
     * True when the unit is already where the action would take it
     * Restart always runs
     */
    pub fn is_satisfied_by(&self, status: &ServiceStatus) -> bool {
        match self {
            ControlAction::Start => status.state == ServiceState::Running,
            ControlAction::Stop => status.state == ServiceState::Stopped,
            ControlAction::Restart => false,
            ControlAction::Enable => status.enabled && status.state != ServiceState::Unknown,
            ControlAction::Disable => !status.enabled && status.state != ServiceState::Unknown,
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            ControlAction::Start => "started",
            ControlAction::Stop => "stopped",
            ControlAction::Restart => "restarted",
            ControlAction::Enable => "enabled",
            ControlAction::Disable => "disabled",
        }
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            ControlAction::Start => "start",
            ControlAction::Stop => "stop",
            ControlAction::Restart => "restart",
            ControlAction::Enable => "enable",
            ControlAction::Disable => "disable",
        };
        f.write_str(verb)
    }
}

/**
 * Phases of the single-service pipeline, logged as the operation moves
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationPhase {
    Requested,
    Validating,
    AuthRequired,
    WaitingForCredential,
    Executing,
    Verifying,
    Completed,
    Failed,
}

/**
 * Suspended pipeline waiting for the operator's password
 * `attempts` counts credential rejections already seen for this action
 */
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingAction {
    pub id: Uuid,
    pub service: String,
    pub action: ControlAction,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
}

impl PendingAction {
    pub fn new(service: &str, action: ControlAction) -> Self {
        Self {
            id: Uuid::new_v4(),
            service: service.to_string(),
            action,
            attempts: 0,
            created_at: Utc::now(),
        }
    }

    /// Same action context, one rejection further along.
    pub fn retry(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            attempts: self.attempts + 1,
            created_at: Utc::now(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationResult {
    pub service: String,
    pub action: ControlAction,
    pub success: bool,
    // false when the command succeeded but the transition was not observed in time
    pub confirmed: bool,
    pub message: String,
    pub updated_status: Option<ServiceStatus>,
    pub diagnostics: Option<String>,
}

impl OperationResult {
    pub fn failed(service: &str, action: ControlAction, message: impl Into<String>) -> Self {
        Self {
            service: service.to_string(),
            action,
            success: false,
            confirmed: false,
            message: message.into(),
            updated_status: None,
            diagnostics: None,
        }
    }
}

/**
 * Cancellation flag shared by every item of one batch
 */
#[derive(Debug, Clone, Default)]
pub struct BatchCancel(Arc<AtomicBool>);

impl BatchCancel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
