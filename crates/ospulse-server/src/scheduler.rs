//! Periodic task loops. Every scheduler owns one concern and one tick
//! period; task failures are logged at this boundary and never escape the
//! loop, so a bad tick only costs that tick.

use ospulse_alert::AlertEvaluator;
use ospulse_cloud::probe::ApiProber;
use ospulse_cloud::topology::TopologyCollector;
use ospulse_search::pruner::IndexPruner;
use ospulse_status::ServiceStatusReconciler;
use std::sync::Arc;
use tokio::time::{interval, Duration};

/// Endpoints timed on every probe tick: component name, catalog service
/// type, request path.
const PROBE_TARGETS: &[(&str, &str, &str)] = &[
    ("nova", "compute", "/os-agents"),
    ("cinder", "volume", "/volumes"),
    ("neutron", "network", "/v2.0/agents"),
];

pub struct ProbeScheduler {
    prober: Arc<ApiProber>,
    tick_secs: u64,
}

impl ProbeScheduler {
    pub fn new(prober: Arc<ApiProber>, tick_secs: u64) -> Self {
        Self { prober, tick_secs }
    }

    pub async fn run(&self) {
        tracing::info!(tick_secs = self.tick_secs, "API probe scheduler started");
        let mut tick = interval(Duration::from_secs(self.tick_secs));
        loop {
            tick.tick().await;

            for (component, service_type, path) in PROBE_TARGETS {
                match self.prober.probe(component, service_type, path).await {
                    Ok(sample) => tracing::debug!(
                        component,
                        status = sample.response_status,
                        seconds = sample.response_time,
                        "Probe recorded"
                    ),
                    Err(e) => tracing::error!(component, error = %e, "Probe failed"),
                }
            }

            // The image service gets the follow-the-first-image variant
            match self.prober.probe_image_list("glance").await {
                Ok(sample) => tracing::debug!(
                    component = "glance",
                    status = sample.response_status,
                    seconds = sample.response_time,
                    "Probe recorded"
                ),
                Err(e) => tracing::error!(component = "glance", error = %e, "Probe failed"),
            }
        }
    }
}

pub struct TopologyScheduler {
    collector: Arc<TopologyCollector>,
    tick_secs: u64,
}

impl TopologyScheduler {
    pub fn new(collector: Arc<TopologyCollector>, tick_secs: u64) -> Self {
        Self { collector, tick_secs }
    }

    pub async fn run(&self) {
        tracing::info!(tick_secs = self.tick_secs, "Topology scheduler started");
        let mut tick = interval(Duration::from_secs(self.tick_secs));
        loop {
            tick.tick().await;

            match self.collector.collect().await {
                Ok(report) => tracing::info!(
                    region = %report.region,
                    written = report.written.len(),
                    failed = report.failed.len(),
                    "Topology snapshot written"
                ),
                Err(e) => tracing::error!(error = %e, "Topology collection failed"),
            }

            match self.collector.collect_hypervisor_statistics().await {
                Ok(written) => {
                    tracing::info!(metrics = written, "Hypervisor statistics written")
                }
                Err(e) => {
                    tracing::error!(error = %e, "Hypervisor statistics collection failed")
                }
            }
        }
    }
}

pub struct StatusScheduler {
    reconciler: Arc<ServiceStatusReconciler>,
    tick_secs: u64,
}

impl StatusScheduler {
    pub fn new(reconciler: Arc<ServiceStatusReconciler>, tick_secs: u64) -> Self {
        Self { reconciler, tick_secs }
    }

    pub async fn run(&self) {
        tracing::info!(tick_secs = self.tick_secs, "Service status scheduler started");
        let mut tick = interval(Duration::from_secs(self.tick_secs));
        loop {
            tick.tick().await;
            match self.reconciler.run().await {
                Ok(report) => tracing::info!(
                    discovered = report.discovered,
                    transitions = report.transitions,
                    "Service status reconciled"
                ),
                Err(e) => tracing::error!(error = %e, "Service status check failed"),
            }
        }
    }
}

pub struct AlertScheduler {
    evaluator: Arc<AlertEvaluator>,
    tick_secs: u64,
}

impl AlertScheduler {
    pub fn new(evaluator: Arc<AlertEvaluator>, tick_secs: u64) -> Self {
        Self { evaluator, tick_secs }
    }

    pub async fn run(&self) {
        tracing::info!(tick_secs = self.tick_secs, "Alert scheduler started");
        let mut tick = interval(Duration::from_secs(self.tick_secs));
        loop {
            tick.tick().await;
            match self.evaluator.run().await {
                Ok(report) => tracing::info!(
                    fired = report.events.len(),
                    evaluated = report.evaluated,
                    failed = report.failed,
                    "Alert evaluation cycle finished"
                ),
                Err(e) => tracing::error!(error = %e, "Alert evaluation cycle failed"),
            }
        }
    }
}

pub struct PruneScheduler {
    pruner: Arc<IndexPruner>,
    tick_secs: u64,
}

impl PruneScheduler {
    pub fn new(pruner: Arc<IndexPruner>, tick_secs: u64) -> Self {
        Self { pruner, tick_secs }
    }

    pub async fn run(&self) {
        tracing::info!(tick_secs = self.tick_secs, "Index prune scheduler started");
        let mut tick = interval(Duration::from_secs(self.tick_secs));
        loop {
            tick.tick().await;
            match self.pruner.prune().await {
                Ok(deleted) if deleted.is_empty() => {
                    tracing::debug!("No expired indices")
                }
                Ok(deleted) => tracing::info!(count = deleted.len(), "Expired indices deleted"),
                Err(e) => tracing::error!(error = %e, "Index pruning failed"),
            }
        }
    }
}
