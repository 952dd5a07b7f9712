use crate::AlertRule;
use chrono::{DateTime, Utc};
use ospulse_common::types::AlertEvent;
use ospulse_search::{QuerySpec, SavedSearch};
use serde_json::Value;

/// Fires one event when the number of log documents matching the rule's
/// query inside the window reaches the configured threshold.
pub struct LogEventRule {
    pub uuid: String,
    pub name: String,
    /// Index-name prefix the rule searches under (e.g. `"logstash-"`).
    pub index_prefix: String,
    /// Query clause selecting the interesting documents (e.g. a
    /// `{"term": {"loglevel": "ERROR"}}` match).
    pub query: Value,
    /// Minimum matching-document count that fires the rule.
    pub threshold: u64,
}

impl LogEventRule {
    fn template(&self) -> SavedSearch {
        SavedSearch {
            uuid: self.uuid.clone(),
            name: self.name.clone(),
            index_prefix: self.index_prefix.clone(),
            query: self.query.clone(),
            aggs: None,
            last_start: None,
            last_end: None,
        }
    }
}

impl AlertRule for LogEventRule {
    fn search_uuid(&self) -> &str {
        &self.uuid
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn saved_search(&self) -> SavedSearch {
        self.template()
    }

    fn query(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> QuerySpec {
        self.template().bounded(start, end)
    }

    fn evaluate(
        &self,
        result: &Value,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<AlertEvent>> {
        let hits = result
            .pointer("/hits/total")
            .and_then(Value::as_u64)
            .ok_or_else(|| anyhow::anyhow!("search result has no hits.total count"))?;

        if hits < self.threshold {
            return Ok(Vec::new());
        }

        Ok(vec![AlertEvent {
            rule_id: self.uuid.clone(),
            rule_name: self.name.clone(),
            message: format!(
                "{}: {} matching events between {} and {}",
                self.name,
                hits,
                start.to_rfc3339(),
                end.to_rfc3339(),
            ),
            hits,
            window_start: start,
            window_end: end,
        }])
    }
}
