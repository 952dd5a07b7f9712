use crate::cache::CredentialCache;
use crate::error::{CloudError, Result};
use crate::ControlPlane;
use chrono::Utc;
use ospulse_common::types::{MetricDocument, TopologySnapshot};
use ospulse_search::SearchStore;
use serde_json::Value;
use std::sync::Arc;

/// Series receiving topology snapshot documents.
pub const TOPOLOGY_INDEX_PREFIX: &str = "goldstone-";
/// Series receiving gauge metric documents.
pub const METRIC_INDEX_PREFIX: &str = "goldstone_metrics-";
const METRIC_DOCTYPE: &str = "core_metric";

const HYPERVISOR_METRIC_PREFIX: &str = "nova.hypervisor.";

/// Discovers control-plane resource collections and writes them as dated,
/// region-tagged snapshot documents.
pub struct TopologyCollector {
    cache: Arc<CredentialCache>,
    store: Arc<dyn SearchStore>,
}

/// Outcome of one discovery run.
#[derive(Debug, Default)]
pub struct TopologyReport {
    pub region: String,
    pub written: Vec<&'static str>,
    pub failed: Vec<&'static str>,
}

fn metric_unit(key: &str) -> &'static str {
    match key {
        "disk_available_least" | "free_disk_gb" | "local_gb" | "local_gb_used" => "GB",
        "free_ram_mb" | "memory_mb" | "memory_mb_used" => "MB",
        _ => "count",
    }
}

impl TopologyCollector {
    pub fn new(cache: Arc<CredentialCache>, store: Arc<dyn SearchStore>) -> Self {
        Self { cache, store }
    }

    /// Snapshot all five resource kinds. The region is derived once from
    /// the handle's service catalog and reused for every write; a failure
    /// on one kind does not block the others.
    pub async fn collect(&self) -> Result<TopologyReport> {
        let client = self.cache.get(None).await?;
        let region = client
            .service_catalog()
            .region()
            .ok_or(CloudError::MissingRegion)?
            .to_string();

        let mut report = TopologyReport {
            region: region.clone(),
            ..Default::default()
        };

        self.write_kind(&mut report, "endpoints", client.list_endpoints().await, &region)
            .await;
        self.write_kind(&mut report, "roles", client.list_roles().await, &region)
            .await;
        self.write_kind(&mut report, "services", client.list_services().await, &region)
            .await;
        self.write_kind(&mut report, "tenants", client.list_tenants().await, &region)
            .await;
        self.write_kind(&mut report, "users", client.list_users().await, &region)
            .await;

        Ok(report)
    }

    async fn write_kind(
        &self,
        report: &mut TopologyReport,
        kind: &'static str,
        listing: anyhow::Result<Vec<Value>>,
        region: &str,
    ) {
        let resources = match listing {
            Ok(resources) => resources,
            Err(e) => {
                tracing::error!(kind, error = %e, "Failed to list topology resources");
                report.failed.push(kind);
                return;
            }
        };

        let snapshot = TopologySnapshot::new(kind, region, resources);
        match self
            .store
            .index(TOPOLOGY_INDEX_PREFIX, kind, snapshot.to_document())
            .await
        {
            Ok(()) => {
                tracing::debug!(kind, region, "Indexed topology snapshot");
                report.written.push(kind);
            }
            Err(e) => {
                tracing::error!(kind, error = %e, "Failed to index topology snapshot");
                report.failed.push(kind);
            }
        }
    }

    /// Fetch aggregate hypervisor statistics and write one gauge metric
    /// document per statistic. Returns the number of metrics written.
    pub async fn collect_hypervisor_statistics(&self) -> Result<usize> {
        let client = self.cache.get(None).await?;
        let region = client
            .service_catalog()
            .region()
            .ok_or(CloudError::MissingRegion)?
            .to_string();

        let stats = client
            .hypervisor_statistics()
            .await
            .map_err(|e| CloudError::ControlPlane(e.to_string()))?;
        let stats = match stats.as_object() {
            Some(stats) => stats.clone(),
            None => return Ok(0),
        };

        let now = Utc::now();
        let mut written = 0;
        for (key, value) in stats {
            let doc = MetricDocument {
                name: format!("{HYPERVISOR_METRIC_PREFIX}{key}"),
                value,
                unit: metric_unit(&key),
                region: region.clone(),
                timestamp: now,
            };
            match self
                .store
                .index(METRIC_INDEX_PREFIX, METRIC_DOCTYPE, doc.to_document())
                .await
            {
                Ok(()) => written += 1,
                Err(e) => {
                    tracing::error!(metric = %key, error = %e, "Failed to index hypervisor metric");
                }
            }
        }
        Ok(written)
    }
}
