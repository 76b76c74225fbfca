/**
 * ============================================================================
 * EVENTS MODULE
 * ============================================================================
 *
 * PURPOSE: Typed change notifications for the UI layer
 *
 * ARCHITECTURE:
 * - types: ServiceEvent and its constructors
 * - bus: broadcast fan-out with per-subscriber bounded buffers
 *
 * ============================================================================
 */

pub mod bus;
pub mod types;

pub use bus::{EventBus, EventSubscription};
pub use types::{CatalogueOperation, ServiceEvent};
