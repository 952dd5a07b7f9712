use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::time::to_es_date;

/// Availability state of one service on one host.
///
/// The state machine is `UNKNOWN -> UP|DOWN -> UP|DOWN -> UNKNOWN` (on host
/// disappearance). `DELETED` is only ever set by a human; the reconciler
/// never assigns it.
///
/// # Examples
///
/// ```
/// use ospulse_common::types::ServiceState;
///
/// let state: ServiceState = "DOWN".parse().unwrap();
/// assert_eq!(state, ServiceState::Down);
/// assert_eq!(state.to_string(), "DOWN");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceState {
    Up,
    Down,
    Unknown,
    Deleted,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceState::Up => write!(f, "UP"),
            ServiceState::Down => write!(f, "DOWN"),
            ServiceState::Unknown => write!(f, "UNKNOWN"),
            ServiceState::Deleted => write!(f, "DELETED"),
        }
    }
}

impl std::str::FromStr for ServiceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "UP" => Ok(ServiceState::Up),
            "DOWN" => Ok(ServiceState::Down),
            "UNKNOWN" => Ok(ServiceState::Unknown),
            "DELETED" => Ok(ServiceState::Deleted),
            _ => Err(format!("unknown service state: {s}")),
        }
    }
}

/// One monitored (host, service) pair. Unique on `(host, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredService {
    pub host: String,
    pub name: String,
    pub state: ServiceState,
}

/// One API performance measurement taken by the probe executor.
///
/// Immutable once written; exactly one is persisted per successful probe
/// invocation. Field names match the documents already in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub component: String,
    pub uri: String,
    pub response_status: u16,
    /// Wall-clock latency of the measured call, in seconds.
    pub response_time: f64,
    /// Value of the response's `content-length` header.
    pub response_length: u64,
    #[serde(rename = "@timestamp")]
    pub timestamp: String,
    pub task_id: String,
}

impl PerformanceSample {
    pub fn to_document(&self) -> Value {
        // Serialization cannot fail for this shape
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// One topology discovery document: all resources of one kind, as listed
/// from the control plane in a single run.
///
/// Serialized with the record-type tag as the field holding the resource
/// list, e.g. `{"@timestamp": ..., "region": ..., "endpoints": [...]}`.
#[derive(Debug, Clone)]
pub struct TopologySnapshot {
    pub record_type: String,
    pub region: String,
    pub timestamp: DateTime<Utc>,
    pub resources: Vec<Value>,
}

impl TopologySnapshot {
    pub fn new(record_type: &str, region: &str, resources: Vec<Value>) -> Self {
        Self {
            record_type: record_type.to_string(),
            region: region.to_string(),
            timestamp: Utc::now(),
            resources,
        }
    }

    pub fn to_document(&self) -> Value {
        json!({
            "@timestamp": to_es_date(self.timestamp),
            "region": self.region,
            (&self.record_type): self.resources,
        })
    }
}

/// One gauge metric document, e.g. a hypervisor statistic.
#[derive(Debug, Clone)]
pub struct MetricDocument {
    pub name: String,
    pub value: Value,
    pub unit: &'static str,
    pub region: String,
    pub timestamp: DateTime<Utc>,
}

impl MetricDocument {
    pub fn to_document(&self) -> Value {
        json!({
            "type": "core_metric",
            "name": self.name,
            "value": self.value,
            "metric_type": "gauge",
            "unit": self.unit,
            "@timestamp": to_es_date(self.timestamp),
            "region": self.region,
        })
    }
}

/// An event produced by an alert rule evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub rule_id: String,
    pub rule_name: String,
    pub message: String,
    pub hits: u64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_state_round_trips_through_str() {
        for s in ["UP", "DOWN", "UNKNOWN", "DELETED"] {
            let state: ServiceState = s.parse().unwrap();
            assert_eq!(state.to_string(), s);
        }
        assert!("flapping".parse::<ServiceState>().is_err());
    }

    #[test]
    fn test_performance_sample_document_uses_at_timestamp_field() {
        let sample = PerformanceSample {
            component: "glance".to_string(),
            uri: "/v2/images".to_string(),
            response_status: 200,
            response_time: 0.042,
            response_length: 1024,
            timestamp: "2020-06-15T09:30:00.000Z".to_string(),
            task_id: "abc".to_string(),
        };
        let doc = sample.to_document();
        assert_eq!(doc["@timestamp"], "2020-06-15T09:30:00.000Z");
        assert_eq!(doc["response_status"], 200);
        assert_eq!(doc["response_length"], 1024);
        assert_eq!(doc["component"], "glance");
        assert!(doc.get("timestamp").is_none());
    }

    #[test]
    fn test_topology_snapshot_document_keys_resources_by_record_type() {
        let snap = TopologySnapshot::new(
            "endpoints",
            "RegionOne",
            vec![json!({"id": "e1"}), json!({"id": "e2"})],
        );
        let doc = snap.to_document();
        assert_eq!(doc["region"], "RegionOne");
        assert_eq!(doc["endpoints"].as_array().unwrap().len(), 2);
        assert!(doc["@timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_metric_document_shape() {
        let doc = MetricDocument {
            name: "nova.hypervisor.free_ram_mb".to_string(),
            value: json!(2048),
            unit: "MB",
            region: "RegionOne".to_string(),
            timestamp: Utc::now(),
        }
        .to_document();
        assert_eq!(doc["type"], "core_metric");
        assert_eq!(doc["metric_type"], "gauge");
        assert_eq!(doc["unit"], "MB");
        assert_eq!(doc["value"], 2048);
    }
}
