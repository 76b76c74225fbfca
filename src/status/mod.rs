/**
 * ============================================================================
 * STATUS MODULE
 * ============================================================================
 *
 * PURPOSE: Read-only view of live service state
 *
 * ARCHITECTURE:
 * - types: ServiceState and ServiceStatus
 * - prober: single and fan-out probes through the executor
 * - ledger: last-known states shared by the coordinator and the monitor
 * - metrics: CPU, memory and disk usage of a unit's process tree
 *
 * ============================================================================
 */

pub mod ledger;
pub mod metrics;
pub mod prober;
pub mod types;

pub use ledger::{LedgerDiff, StatusLedger};
pub use metrics::ServiceMetrics;
pub use prober::StatusProber;
pub use types::{ServiceState, ServiceStatus};
