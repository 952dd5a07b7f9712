use anyhow::{Context, Result};
use ospulse_alert::{AlertEvaluator, AlertRule, LogEventRule};
use ospulse_cloud::cache::CredentialCache;
use ospulse_cloud::keystone::KeystoneConnector;
use ospulse_cloud::probe::ApiProber;
use ospulse_cloud::topology::TopologyCollector;
use ospulse_search::http::EsHttpStore;
use ospulse_search::pruner::IndexPruner;
use ospulse_search::query::service_status_search;
use ospulse_search::SearchStore;
use ospulse_status::{ServiceStatusReconciler, StatusStore};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use ospulse_server::config::{AlertRuleConfig, ServerConfig};
use ospulse_server::scheduler::{
    AlertScheduler, ProbeScheduler, PruneScheduler, StatusScheduler, TopologyScheduler,
};

fn build_rules(configs: &[AlertRuleConfig]) -> Vec<Box<dyn AlertRule>> {
    configs
        .iter()
        .map(|rule| {
            Box::new(LogEventRule {
                uuid: rule.uuid.clone(),
                name: rule.name.clone(),
                index_prefix: rule.index_prefix.clone(),
                query: json!({"term": {(rule.match_field.as_str()): rule.match_value.clone()}}),
                threshold: rule.threshold,
            }) as Box<dyn AlertRule>
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ospulse=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config_path = args.get(1).map(|s| s.as_str()).unwrap_or("config.toml");
    let config = ServerConfig::load(config_path)
        .with_context(|| format!("Failed to load config from {config_path}"))?;

    let data_dir = Path::new(&config.data_dir);
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data dir {}", config.data_dir))?;

    let status_store = Arc::new(StatusStore::open(&data_dir.join("status.db"))?);
    status_store.seed_saved_search(&service_status_search())?;

    let search: Arc<dyn SearchStore> =
        Arc::new(EsHttpStore::new(&config.search.base_url, config.http_timeout_secs)?);

    let connector = Arc::new(KeystoneConnector::new(config.http_timeout_secs)?);
    let cache = Arc::new(CredentialCache::new(
        connector,
        config.openstack.credentials(),
    ));

    let prober = Arc::new(ApiProber::new(
        cache.clone(),
        search.clone(),
        config.http_timeout_secs,
    )?);
    let collector = Arc::new(TopologyCollector::new(cache.clone(), search.clone()));
    let reconciler = Arc::new(ServiceStatusReconciler::new(
        status_store.clone(),
        search.clone(),
    ));
    let evaluator = Arc::new(AlertEvaluator::new(
        status_store.clone(),
        search.clone(),
        build_rules(&config.alert_rules),
    ));
    evaluator.seed()?;
    let pruner = Arc::new(IndexPruner::new(search.clone(), config.retention_days));

    let intervals = &config.intervals;
    let probe_loop = ProbeScheduler::new(prober, intervals.probe_secs);
    let topology_loop = TopologyScheduler::new(collector, intervals.topology_secs);
    let status_loop = StatusScheduler::new(reconciler, intervals.status_secs);
    let alert_loop = AlertScheduler::new(evaluator, intervals.alert_secs);
    let prune_loop = PruneScheduler::new(pruner, intervals.prune_secs);

    tokio::spawn(async move { probe_loop.run().await });
    tokio::spawn(async move { topology_loop.run().await });
    tokio::spawn(async move { status_loop.run().await });
    tokio::spawn(async move { alert_loop.run().await });
    tokio::spawn(async move { prune_loop.run().await });

    tracing::info!(
        search = %config.search.base_url,
        auth_url = %config.openstack.auth_url,
        "ospulse server started"
    );

    signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, exiting");
    Ok(())
}
