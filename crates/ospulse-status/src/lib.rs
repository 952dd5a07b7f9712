//! Per-host/per-service availability tracking.
//!
//! The reconciler runs the recurring service-status aggregation, diffs the
//! discovered (host, service) pairs against persisted state rows, and
//! applies the resulting state changes. Planning is pure and separately
//! testable from application.

pub mod error;
pub mod reconciler;
pub mod store;

pub use reconciler::{partition_hosts, plan, service_states, ServiceStatusReconciler, StateChange};
pub use store::StatusStore;
