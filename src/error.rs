/**
 * ============================================================================
 * ERROR MODULE
 * ============================================================================
 *
 * PURPOSE: Single error taxonomy shared by every layer of the core
 *
 * CATEGORIES:
 * - Validation: InvalidService, NotFound, DuplicateTracking
 * - Authentication: AuthenticationRequired, AuthenticationFailed
 * - Execution: ExecutionFailed, Timeout
 * - Probing: ProbeUnavailable (callers degrade it to Unknown)
 * - Ambient: Storage, Config, Io
 *
 * Errors serialize to {kind, message} so a UI bridge can forward them as-is.
 *
 * ============================================================================
 */

use crate::coordinator::types::PendingAction;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("'{0}' is not a known or tracked service")]
    InvalidService(String),

    #[error("administrator password required to {} {}", .0.action, .0.service)]
    AuthenticationRequired(PendingAction),

    /// The OS rejected the cached credential. `retry` carries the pending
    /// action when one more attempt is still allowed.
    #[error("authentication failed for {service}: {message}")]
    AuthenticationFailed {
        service: String,
        message: String,
        retry: Option<PendingAction>,
    },

    #[error("{message}")]
    ExecutionFailed {
        service: String,
        exit_code: Option<i32>,
        message: String,
    },

    #[error("command for {service} timed out after {seconds}s")]
    Timeout { service: String, seconds: u64 },

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} is already tracked")]
    DuplicateTracking(String),

    #[error("status of {service} unavailable: {reason}")]
    ProbeUnavailable { service: String, reason: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    /**
     * Stable machine-readable name of the variant
     */
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::InvalidService(_) => "InvalidService",
            ServiceError::AuthenticationRequired(_) => "AuthenticationRequired",
            ServiceError::AuthenticationFailed { .. } => "AuthenticationFailed",
            ServiceError::ExecutionFailed { .. } => "ExecutionFailed",
            ServiceError::Timeout { .. } => "Timeout",
            ServiceError::NotFound(_) => "NotFound",
            ServiceError::DuplicateTracking(_) => "DuplicateTracking",
            ServiceError::ProbeUnavailable { .. } => "ProbeUnavailable",
            ServiceError::Storage(_) => "Storage",
            ServiceError::Config(_) => "Config",
            ServiceError::Io(_) => "Io",
        }
    }

    /**
     * Pending action the UI should resume after collecting a password, if any
     */
    pub fn pending_action(&self) -> Option<&PendingAction> {
        match self {
            ServiceError::AuthenticationRequired(pending) => Some(pending),
            ServiceError::AuthenticationFailed { retry, .. } => retry.as_ref(),
            _ => None,
        }
    }

    pub fn needs_credential(&self) -> bool {
        self.pending_action().is_some()
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        ServiceError::Storage(format!("JSON error: {}", e))
    }
}

impl Serialize for ServiceError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ServiceError", 3)?;
        state.serialize_field("kind", self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.serialize_field("pending", &self.pending_action())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::types::ControlAction;

    #[test]
    fn test_error_serializes_kind_and_message() {
        let err = ServiceError::DuplicateTracking("redis".to_string());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "DuplicateTracking");
        assert_eq!(json["message"], "redis is already tracked");
        assert!(json["pending"].is_null());
    }

    #[test]
    fn test_auth_required_exposes_pending_action() {
        let pending = PendingAction::new("redis", ControlAction::Start);
        let err = ServiceError::AuthenticationRequired(pending.clone());
        assert!(err.needs_credential());
        assert_eq!(err.pending_action().unwrap().id, pending.id);
        assert_eq!(err.to_string(), "administrator password required to start redis");
    }

    #[test]
    fn test_terminal_auth_failure_has_no_retry() {
        let err = ServiceError::AuthenticationFailed {
            service: "redis".to_string(),
            message: "incorrect password".to_string(),
            retry: None,
        };
        assert!(!err.needs_credential());
        assert_eq!(err.kind(), "AuthenticationFailed");
    }
}
