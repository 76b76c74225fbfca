use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CommandOutcome {
    Succeeded,
    ExitedNonZero,
    TimedOut,
    SpawnFailed,
}

/**
 * One OS invocation as shown in the diagnostics view
 * `args` is argv only; secrets travel on stdin and never land here
 */
#[derive(Debug, Clone, Serialize)]
pub struct CommandRecord {
    pub timestamp: DateTime<Utc>,
    pub program: String,
    pub args: Vec<String>,
    pub unit: String,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    pub outcome: CommandOutcome,
}

/**
 * Bounded ring of recent command records, oldest evicted first
 */
pub struct DiagnosticsLog {
    records: Mutex<VecDeque<CommandRecord>>,
    capacity: usize,
}

impl DiagnosticsLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn record(&self, record: CommandRecord) {
        log::debug!(
            "{} {} -> {:?} (exit {:?}, {}ms)",
            record.program,
            record.args.join(" "),
            record.outcome,
            record.exit_code,
            record.duration_ms
        );

        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Oldest first.
    pub fn recent(&self) -> Vec<CommandRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}
