use crate::index::{select_expired, IndexSeries, PRUNED_SERIES};
use crate::SearchStore;
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Deletes time-partitioned indices older than the configured retention.
///
/// Filtering is purely a function of the current index listing, each
/// series' prefix and date format, and the cutoff computed at call time;
/// no pruning state is persisted.
pub struct IndexPruner {
    store: Arc<dyn SearchStore>,
    series: &'static [IndexSeries],
    retention_days: u32,
}

impl IndexPruner {
    pub fn new(store: Arc<dyn SearchStore>, retention_days: u32) -> Self {
        Self {
            store,
            series: PRUNED_SERIES,
            retention_days,
        }
    }

    /// Prune every configured series once. A deletion failure for one
    /// series is logged and does not abort the remaining series. Returns
    /// the cumulative list of index names actually deleted.
    pub async fn prune(&self) -> Result<Vec<String>> {
        let all_names = self
            .store
            .list_index_names()
            .await
            .context("Failed to list index names")?;

        let cutoff = (Utc::now() - Duration::days(self.retention_days as i64)).date_naive();
        let mut deleted = Vec::new();

        for series in self.series {
            let expired = select_expired(&all_names, series, cutoff);
            if expired.is_empty() {
                continue;
            }

            match self.store.delete_indices(&expired).await {
                Ok(()) => {
                    tracing::info!(
                        prefix = series.prefix,
                        count = expired.len(),
                        "Deleted expired indices"
                    );
                    deleted.extend(expired);
                }
                Err(e) => {
                    tracing::error!(
                        prefix = series.prefix,
                        error = %e,
                        "Failed to delete expired indices"
                    );
                }
            }
        }

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QuerySpec;
    use serde_json::Value;
    use std::sync::Mutex;

    struct MockStore {
        names: Vec<String>,
        deleted: Mutex<Vec<Vec<String>>>,
        fail_prefix: Option<&'static str>,
    }

    #[async_trait::async_trait]
    impl SearchStore for MockStore {
        async fn index(&self, _: &str, _: &str, _: Value) -> Result<()> {
            Ok(())
        }

        async fn search(&self, _: &QuerySpec) -> Result<Value> {
            Ok(Value::Null)
        }

        async fn list_index_names(&self) -> Result<Vec<String>> {
            Ok(self.names.clone())
        }

        async fn delete_indices(&self, names: &[String]) -> Result<()> {
            if let Some(prefix) = self.fail_prefix {
                if names.iter().any(|n| n.starts_with(prefix)) {
                    anyhow::bail!("simulated deletion failure");
                }
            }
            self.deleted.lock().unwrap().push(names.to_vec());
            Ok(())
        }
    }

    fn old_name(prefix: &str, fmt: &str) -> String {
        let date = Utc::now() - Duration::days(90);
        format!("{prefix}{}", date.format(fmt))
    }

    #[tokio::test]
    async fn test_prune_deletes_only_expired_series_members() {
        let store = Arc::new(MockStore {
            names: vec![
                old_name("logstash-", "%Y.%m.%d"),
                format!("logstash-{}", Utc::now().format("%Y.%m.%d")),
                old_name("other-", "%Y.%m.%d"),
            ],
            deleted: Mutex::new(Vec::new()),
            fail_prefix: None,
        });

        let pruner = IndexPruner::new(store.clone(), 30);
        let deleted = pruner.prune().await.unwrap();

        assert_eq!(deleted, vec![old_name("logstash-", "%Y.%m.%d")]);
        assert_eq!(store.deleted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_prune_continues_after_per_series_failure() {
        // events_ sorts before goldstone- in PRUNED_SERIES, so a failure
        // there must not stop the later series from being pruned.
        let store = Arc::new(MockStore {
            names: vec![
                old_name("events_", "%Y-%m-%d"),
                old_name("goldstone-", "%Y.%m.%d"),
            ],
            deleted: Mutex::new(Vec::new()),
            fail_prefix: Some("events_"),
        });

        let pruner = IndexPruner::new(store.clone(), 30);
        let deleted = pruner.prune().await.unwrap();

        assert_eq!(deleted, vec![old_name("goldstone-", "%Y.%m.%d")]);
    }
}
