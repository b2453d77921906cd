//! In-memory storage adapters.
//!
//! Used by the test suites and by local runs without Postgres. Each adapter
//! is `Clone` and shares its state across clones.

mod audit_log;
mod entitlement_store;
mod processed_events;

pub use audit_log::InMemoryAuditLog;
pub use entitlement_store::InMemoryEntitlementStore;
pub use processed_events::InMemoryProcessedEventStore;
