/**
 * ============================================================================
 * LOG READER MODULE
 * ============================================================================
 *
 * PURPOSE: Read-only access to the system journal of one service
 *
 * The request is clamped to 1..=1000 lines and goes through the executor,
 * so the allow-list applies exactly as for control operations.
 *
 * ============================================================================
 */

use crate::error::{Result, ServiceError};
use crate::executor::{Executor, ServiceOp};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const MAX_LOG_LINES: usize = 1000;

#[derive(Debug, Clone, Serialize)]
pub struct ServiceLogs {
    pub service_name: String,
    pub lines: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

pub fn clamp_lines(requested: Option<usize>, default: usize) -> usize {
    requested.unwrap_or(default).clamp(1, MAX_LOG_LINES)
}

pub async fn read_logs(executor: &Executor, name: &str, max_lines: usize) -> Result<ServiceLogs> {
    let known = executor.resolve(name)?;
    let max_lines = max_lines.clamp(1, MAX_LOG_LINES);

    log::debug!("Reading {} log lines for {}", max_lines, known.name);
    let result = executor
        .run_unprivileged(ServiceOp::ReadLogs(max_lines), known.name)
        .await?;

    if !result.success() {
        return Err(ServiceError::ExecutionFailed {
            service: known.name.to_string(),
            exit_code: result.exit_code,
            message: format!("Failed to read logs: {}", result.diagnostic_text()),
        });
    }

    Ok(ServiceLogs {
        service_name: known.name.to_string(),
        lines: executor.control().parse_logs(&result, max_lines),
        timestamp: Utc::now(),
    })
}
