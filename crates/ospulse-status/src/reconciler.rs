use crate::store::StatusStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ospulse_common::types::{MonitoredService, ServiceState};
use ospulse_search::query::SERVICE_STATUS_SEARCH_UUID;
use ospulse_search::{host_buckets, HostBucket, SearchStore};
use std::collections::BTreeSet;
use std::sync::Arc;

/// One planned change to the persisted monitored-service set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    /// A (host, service) pair seen for the first time.
    Discovered(MonitoredService),
    /// An existing row whose state differs from the latest observation.
    Transition {
        host: String,
        name: String,
        from: ServiceState,
        to: ServiceState,
    },
}

/// The three-way host partition between the aggregation result and the
/// persisted rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPartition {
    pub new: BTreeSet<String>,
    pub missing: BTreeSet<String>,
    pub common: BTreeSet<String>,
}

pub fn partition_hosts(
    found: &BTreeSet<String>,
    monitored: &BTreeSet<String>,
) -> HostPartition {
    HostPartition {
        new: found - monitored,
        missing: monitored - found,
        common: found & monitored,
    }
}

/// Derive per-service states for `host` from its aggregation bucket.
/// `doc_count > 0` maps to UP, a present-but-empty bucket to DOWN; a
/// service with no bucket at all yields no entry.
pub fn service_states(buckets: &[HostBucket], host: &str) -> Vec<MonitoredService> {
    buckets
        .iter()
        .find(|bucket| bucket.key == host)
        .map(|bucket| {
            bucket
                .services
                .iter()
                .map(|svc| MonitoredService {
                    host: host.to_string(),
                    name: svc.key.clone(),
                    state: if svc.doc_count > 0 {
                        ServiceState::Up
                    } else {
                        ServiceState::Down
                    },
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Compute the full change set between an aggregation result and the
/// current rows. Pure: applying the returned changes and planning again
/// against the same aggregation yields an empty plan.
pub fn plan(buckets: &[HostBucket], current: &[MonitoredService]) -> Vec<StateChange> {
    let found: BTreeSet<String> = buckets.iter().map(|b| b.key.clone()).collect();
    let monitored: BTreeSet<String> = current.iter().map(|s| s.host.clone()).collect();
    let partition = partition_hosts(&found, &monitored);

    let mut changes = Vec::new();

    for host in &partition.new {
        // Every service on a newly seen host becomes monitored.
        for status in service_states(buckets, host) {
            changes.push(StateChange::Discovered(status));
        }
    }

    for host in &partition.missing {
        // The host has disappeared from all records, possibly pruned out
        // of every index. Its services go to UNKNOWN until a human marks
        // them deleted or the host reappears.
        for service in current.iter().filter(|s| &s.host == host) {
            if service.state != ServiceState::Unknown {
                changes.push(StateChange::Transition {
                    host: service.host.clone(),
                    name: service.name.clone(),
                    from: service.state,
                    to: ServiceState::Unknown,
                });
            }
        }
    }

    for host in &partition.common {
        for status in service_states(buckets, host) {
            match current
                .iter()
                .find(|s| s.host == status.host && s.name == status.name)
            {
                None => changes.push(StateChange::Discovered(status)),
                Some(existing) if existing.state != status.state => {
                    changes.push(StateChange::Transition {
                        host: status.host,
                        name: status.name,
                        from: existing.state,
                        to: status.state,
                    });
                }
                Some(_) => {}
            }
        }
    }

    changes
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconcileReport {
    pub discovered: usize,
    pub transitions: usize,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

/// Runs the recurring service-status aggregation and applies the planned
/// changes, advancing the saved search's watermark only when the whole
/// run succeeded so a failed run re-covers the same window.
pub struct ServiceStatusReconciler {
    store: Arc<StatusStore>,
    search: Arc<dyn SearchStore>,
}

impl ServiceStatusReconciler {
    pub fn new(store: Arc<StatusStore>, search: Arc<dyn SearchStore>) -> Self {
        Self { store, search }
    }

    pub async fn run(&self) -> Result<ReconcileReport> {
        tracing::info!("Starting service status check");

        let saved = self
            .store
            .get_saved_search(SERVICE_STATUS_SEARCH_UUID)
            .context("Service status saved search not found")?;
        let (spec, start, end) = saved.search_recent(Utc::now());

        let result = self
            .search
            .search(&spec)
            .await
            .context("Service status search failed")?;
        let buckets = host_buckets(&result);
        let current = self.store.list_services()?;

        let changes = plan(&buckets, &current);
        let mut report = ReconcileReport {
            discovered: 0,
            transitions: 0,
            window_start: start,
            window_end: end,
        };

        for change in &changes {
            match change {
                StateChange::Discovered(service) => {
                    self.store.create_service(service)?;
                    tracing::info!(
                        host = %service.host,
                        service = %service.name,
                        state = %service.state,
                        "Service status update: service discovered"
                    );
                    report.discovered += 1;
                }
                StateChange::Transition { host, name, from, to } => {
                    self.store.update_state(host, name, *to)?;
                    tracing::info!(
                        host = %host,
                        service = %name,
                        from = %from,
                        to = %to,
                        "Service status update: service changed state"
                    );
                    report.transitions += 1;
                }
            }
        }

        self.store
            .update_search_window(&saved.uuid, start, end)?;
        tracing::info!(
            discovered = report.discovered,
            transitions = report.transitions,
            "Finished service status check"
        );
        Ok(report)
    }
}
