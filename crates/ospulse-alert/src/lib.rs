//! Alert rules evaluated against bounded-recency search windows.
//!
//! Each rule owns a saved-search definition whose watermark lives in the
//! status store. The [`evaluator::AlertEvaluator`] runs every registered
//! rule over its own `[watermark, now)` window; a rule that errors is
//! logged and skipped without blocking the rest of the batch.

pub mod evaluator;
pub mod rules;

use chrono::{DateTime, Utc};
use ospulse_common::types::AlertEvent;
use ospulse_search::{QuerySpec, SavedSearch};
use serde_json::Value;

pub use evaluator::{AlertEvaluator, AlertReport};
pub use rules::LogEventRule;

/// An alert rule evaluated once per scheduler tick against the documents
/// that arrived inside its recency window.
pub trait AlertRule: Send + Sync {
    /// Unique identifier, doubling as the saved-search uuid under which
    /// this rule's watermark is persisted.
    fn search_uuid(&self) -> &str;

    /// Human-readable name (e.g. `"excessive error logs"`).
    fn name(&self) -> &str;

    /// The persistable saved-search row for this rule, used to seed the
    /// status store on startup. Watermarks of existing rows win.
    fn saved_search(&self) -> SavedSearch;

    /// Build the bounded search for the given window.
    fn query(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> QuerySpec;

    /// Inspect the raw search result and produce zero or more events.
    fn evaluate(
        &self,
        result: &Value,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<AlertEvent>>;
}
