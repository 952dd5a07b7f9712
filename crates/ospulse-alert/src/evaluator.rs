use crate::AlertRule;
use anyhow::Result;
use chrono::{Duration, Utc};
use ospulse_common::types::AlertEvent;
use ospulse_search::query::INITIAL_WINDOW_MINUTES;
use ospulse_search::SearchStore;
use ospulse_status::StatusStore;
use std::sync::Arc;

/// Outcome of one evaluation pass over all registered rules.
#[derive(Debug, Clone, Default)]
pub struct AlertReport {
    pub events: Vec<AlertEvent>,
    pub evaluated: usize,
    pub failed: usize,
}

/// Runs every registered rule over its own recency window. Rules are
/// isolated from each other: a failing rule is logged and skipped, and
/// only successful rules get their watermark advanced.
pub struct AlertEvaluator {
    store: Arc<StatusStore>,
    search: Arc<dyn SearchStore>,
    rules: Vec<Box<dyn AlertRule>>,
}

impl AlertEvaluator {
    pub fn new(
        store: Arc<StatusStore>,
        search: Arc<dyn SearchStore>,
        rules: Vec<Box<dyn AlertRule>>,
    ) -> Self {
        Self { store, search, rules }
    }

    /// Persist saved-search rows for every rule that does not have one
    /// yet. Watermarks of already-present rows are preserved.
    pub fn seed(&self) -> Result<()> {
        for rule in &self.rules {
            self.store.seed_saved_search(&rule.saved_search())?;
        }
        Ok(())
    }

    pub async fn run(&self) -> Result<AlertReport> {
        let mut report = AlertReport::default();

        for rule in &self.rules {
            match self.run_rule(rule.as_ref()).await {
                Ok(events) => {
                    for event in &events {
                        tracing::warn!(
                            rule = %event.rule_name,
                            hits = event.hits,
                            message = %event.message,
                            "Alert fired"
                        );
                    }
                    report.events.extend(events);
                    report.evaluated += 1;
                }
                Err(e) => {
                    tracing::error!(
                        rule = rule.name(),
                        error = %e,
                        "Alert rule evaluation failed, skipping"
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn run_rule(&self, rule: &dyn AlertRule) -> Result<Vec<AlertEvent>> {
        let saved = self.store.get_saved_search(rule.search_uuid())?;
        let now = Utc::now();
        let start = saved
            .last_end
            .unwrap_or_else(|| now - Duration::minutes(INITIAL_WINDOW_MINUTES));

        let spec = rule.query(start, now);
        let result = self.search.search(&spec).await?;
        let events = rule.evaluate(&result, start, now)?;

        // Advance only after the whole run succeeded, so a failed rule
        // re-covers the same window next tick.
        self.store.update_search_window(rule.search_uuid(), start, now)?;
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::LogEventRule;
    use chrono::{DateTime, Utc};
    use ospulse_search::QuerySpec;
    use serde_json::{json, Value};

    struct CannedSearch;

    #[async_trait::async_trait]
    impl SearchStore for CannedSearch {
        async fn index(&self, _: &str, _: &str, _: Value) -> Result<()> {
            Ok(())
        }
        async fn search(&self, _: &QuerySpec) -> Result<Value> {
            Ok(json!({"hits": {"total": 42}}))
        }
        async fn list_index_names(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn delete_indices(&self, _: &[String]) -> Result<()> {
            Ok(())
        }
    }

    struct BrokenRule;

    impl AlertRule for BrokenRule {
        fn search_uuid(&self) -> &str {
            "broken-rule"
        }
        fn name(&self) -> &str {
            "always broken"
        }
        fn saved_search(&self) -> ospulse_search::SavedSearch {
            LogEventRule {
                uuid: "broken-rule".to_string(),
                name: "always broken".to_string(),
                index_prefix: "logstash-".to_string(),
                query: json!({"match_all": {}}),
                threshold: 1,
            }
            .saved_search()
        }
        fn query(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> QuerySpec {
            self.saved_search().bounded(start, end)
        }
        fn evaluate(
            &self,
            _: &Value,
            _: DateTime<Utc>,
            _: DateTime<Utc>,
        ) -> Result<Vec<AlertEvent>> {
            anyhow::bail!("rule logic is broken")
        }
    }

    fn log_rule(threshold: u64) -> Box<dyn AlertRule> {
        Box::new(LogEventRule {
            uuid: "log-errors-1".to_string(),
            name: "excessive error logs".to_string(),
            index_prefix: "logstash-".to_string(),
            query: json!({"term": {"loglevel": "ERROR"}}),
            threshold,
        })
    }

    #[tokio::test]
    async fn test_failing_rule_does_not_block_the_rest_of_the_batch() {
        let store = Arc::new(StatusStore::open_in_memory().unwrap());
        let evaluator = AlertEvaluator::new(
            store.clone(),
            Arc::new(CannedSearch),
            vec![Box::new(BrokenRule), log_rule(10)],
        );
        evaluator.seed().unwrap();

        let report = evaluator.run().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.evaluated, 1);
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].hits, 42);

        // The healthy rule's watermark advanced, the broken one's did not
        assert!(store
            .get_saved_search("log-errors-1")
            .unwrap()
            .last_end
            .is_some());
        assert!(store
            .get_saved_search("broken-rule")
            .unwrap()
            .last_end
            .is_none());
    }

    #[tokio::test]
    async fn test_quiet_window_produces_no_events_but_advances() {
        let store = Arc::new(StatusStore::open_in_memory().unwrap());
        let evaluator =
            AlertEvaluator::new(store.clone(), Arc::new(CannedSearch), vec![log_rule(100)]);
        evaluator.seed().unwrap();

        let report = evaluator.run().await.unwrap();
        assert!(report.events.is_empty());
        assert_eq!(report.evaluated, 1);

        let before = store
            .get_saved_search("log-errors-1")
            .unwrap()
            .last_end
            .unwrap();
        evaluator.run().await.unwrap();
        let after = store
            .get_saved_search("log-errors-1")
            .unwrap()
            .last_end
            .unwrap();
        assert!(after >= before);
    }
}
