//! Search/analytics store capability and the index retention pruner.
//!
//! The store is treated as an opaque document store with query and
//! aggregation support. Components consume it through the [`SearchStore`]
//! trait; [`http::EsHttpStore`] is the Elasticsearch-over-HTTP
//! implementation used by the server binary.

pub mod http;
pub mod index;
pub mod pruner;
pub mod query;

use anyhow::Result;
use serde_json::Value;

pub use index::{daily_index, IndexSeries, PRUNED_SERIES};
pub use query::{host_buckets, HostBucket, QuerySpec, SavedSearch, ServiceBucket};

/// Opaque document store with query/aggregation capability.
#[async_trait::async_trait]
pub trait SearchStore: Send + Sync {
    /// Write one document into today's index of the named series.
    async fn index(&self, series_prefix: &str, doc_type: &str, document: Value) -> Result<()>;

    /// Execute a search and return the raw structured result, including
    /// any `aggregations` section.
    async fn search(&self, query: &QuerySpec) -> Result<Value>;

    /// List the names of all indices currently present in the store.
    async fn list_index_names(&self) -> Result<Vec<String>>;

    /// Delete the named indices.
    async fn delete_indices(&self, names: &[String]) -> Result<()>;
}
