/**
 * ============================================================================
 * CATALOGUE MODULE
 * ============================================================================
 *
 * PURPOSE: Which services exist, and which ones the operator tracks
 *
 * ARCHITECTURE:
 * - allowlist: compiled-in table of manageable services
 * - types: persisted rows
 * - store: durable JSON-backed registry of tracked services
 *
 * ============================================================================
 */

pub mod allowlist;
pub mod store;
pub mod types;

pub use allowlist::{KnownService, UnitScope};
pub use store::CatalogueStore;
pub use types::{ConfigValueType, ServiceConfigEntry, TrackedService};
