use chrono::{DateTime, Duration, Utc};
use ospulse_common::time::to_es_date;
use serde_json::{json, Value};

/// Uuid of the well-known saved search that drives service-status
/// discovery. Fixed so state carried over from existing deployments keeps
/// working.
pub const SERVICE_STATUS_SEARCH_UUID: &str = "c7fa5f00-e851-4a71-9be0-7dbf8415426c";

/// Window used for the very first run of a saved search, before any
/// watermark exists.
pub const INITIAL_WINDOW_MINUTES: i64 = 5;

/// One executable search request: an index pattern plus a complete
/// `_search` request body (recency filter already applied).
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub index_pattern: String,
    pub body: Value,
}

/// A persisted recurring-search specification with its own recency window.
///
/// `last_end` is the watermark: the next run covers `[last_end, now)` and
/// the caller advances it only after the run completes without error, so a
/// failed run re-covers the same window.
#[derive(Debug, Clone)]
pub struct SavedSearch {
    pub uuid: String,
    pub name: String,
    pub index_prefix: String,
    /// Query clause template (e.g. a `term`/`match` clause).
    pub query: Value,
    /// Optional aggregation clause appended to the request body.
    pub aggs: Option<Value>,
    pub last_start: Option<DateTime<Utc>>,
    pub last_end: Option<DateTime<Utc>>,
}

impl SavedSearch {
    /// Derive the bounded recent-time search for this definition.
    /// Returns the query plus the `[start, end)` window it covers.
    pub fn search_recent(&self, now: DateTime<Utc>) -> (QuerySpec, DateTime<Utc>, DateTime<Utc>) {
        let start = self
            .last_end
            .unwrap_or_else(|| now - Duration::minutes(INITIAL_WINDOW_MINUTES));
        let end = now;
        (self.bounded(start, end), start, end)
    }

    /// Build the search for an explicit `[start, end)` window.
    pub fn bounded(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> QuerySpec {
        let mut body = json!({
            "size": 0,
            "query": {
                "bool": {
                    "must": self.query.clone(),
                    "filter": {
                        "range": {
                            "@timestamp": {
                                "gte": to_es_date(start),
                                "lt": to_es_date(end),
                            }
                        }
                    }
                }
            }
        });
        if let Some(aggs) = &self.aggs {
            body["aggs"] = aggs.clone();
        }

        QuerySpec {
            index_pattern: format!("{}*", self.index_prefix),
            body,
        }
    }
}

/// The well-known service-status saved search: a two-level aggregation
/// bucketing log documents per host, then per service component.
pub fn service_status_search() -> SavedSearch {
    SavedSearch {
        uuid: SERVICE_STATUS_SEARCH_UUID.to_string(),
        name: "service status".to_string(),
        index_prefix: "logstash-".to_string(),
        query: json!({"match_all": {}}),
        aggs: Some(json!({
            "per_host": {
                "terms": {"field": "host.raw"},
                "aggs": {
                    "per_component": {
                        "terms": {"field": "component", "min_doc_count": 0}
                    }
                }
            }
        })),
        last_start: None,
        last_end: None,
    }
}

/// One grouped-count entry for a service component under a host bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceBucket {
    pub key: String,
    pub doc_count: u64,
}

/// One per-host aggregation bucket with its nested per-service counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBucket {
    pub key: String,
    pub services: Vec<ServiceBucket>,
}

/// Extract the two-level host/service buckets from a raw search result.
/// A result without a `per_host` aggregation yields an empty list.
pub fn host_buckets(result: &Value) -> Vec<HostBucket> {
    let buckets = match result
        .pointer("/aggregations/per_host/buckets")
        .and_then(Value::as_array)
    {
        Some(buckets) => buckets,
        None => return Vec::new(),
    };

    buckets
        .iter()
        .filter_map(|bucket| {
            let key = bucket.get("key")?.as_str()?.to_string();
            let services = bucket
                .pointer("/per_component/buckets")
                .and_then(Value::as_array)
                .map(|nested| {
                    nested
                        .iter()
                        .filter_map(|svc| {
                            Some(ServiceBucket {
                                key: svc.get("key")?.as_str()?.to_string(),
                                doc_count: svc.get("doc_count")?.as_u64()?,
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();
            Some(HostBucket { key, services })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 6, 15, h, m, 0).unwrap()
    }

    #[test]
    fn test_search_recent_starts_at_watermark() {
        let mut ss = service_status_search();
        ss.last_end = Some(at(9, 0));

        let (spec, start, end) = ss.search_recent(at(9, 5));
        assert_eq!(start, at(9, 0));
        assert_eq!(end, at(9, 5));
        assert_eq!(spec.index_pattern, "logstash-*");
        assert_eq!(
            spec.body
                .pointer("/query/bool/filter/range/@timestamp/gte")
                .unwrap(),
            "2020-06-15T09:00:00.000Z"
        );
        assert_eq!(
            spec.body
                .pointer("/query/bool/filter/range/@timestamp/lt")
                .unwrap(),
            "2020-06-15T09:05:00.000Z"
        );
        assert!(spec.body.pointer("/aggs/per_host").is_some());
    }

    #[test]
    fn test_search_recent_without_watermark_uses_initial_window() {
        let ss = service_status_search();
        let (_, start, end) = ss.search_recent(at(9, 5));
        assert_eq!(end - start, Duration::minutes(INITIAL_WINDOW_MINUTES));
    }

    #[test]
    fn test_host_buckets_parses_two_level_aggregation() {
        let result = json!({
            "aggregations": {
                "per_host": {
                    "buckets": [
                        {
                            "key": "rdo-kilo",
                            "doc_count": 13834,
                            "per_component": {
                                "buckets": [
                                    {"key": "keystone", "doc_count": 8810},
                                    {"key": "cinder", "doc_count": 0}
                                ]
                            }
                        },
                        {"key": "quiet-host", "doc_count": 0, "per_component": {"buckets": []}}
                    ]
                }
            }
        });

        let buckets = host_buckets(&result);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].key, "rdo-kilo");
        assert_eq!(
            buckets[0].services,
            vec![
                ServiceBucket { key: "keystone".to_string(), doc_count: 8810 },
                ServiceBucket { key: "cinder".to_string(), doc_count: 0 },
            ]
        );
        assert!(buckets[1].services.is_empty());
    }

    #[test]
    fn test_host_buckets_on_result_without_aggregations() {
        assert!(host_buckets(&json!({"hits": {"total": 0}})).is_empty());
    }
}
