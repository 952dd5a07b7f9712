use ospulse_cloud::Credentials;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    pub openstack: OpenStackConfig,
    pub search: SearchConfig,
    #[serde(default)]
    pub intervals: IntervalConfig,
    #[serde(default)]
    pub alert_rules: Vec<AlertRuleConfig>,
}

/// Identity-service credentials used for every control-plane connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenStackConfig {
    pub username: String,
    pub password: String,
    pub tenant: String,
    /// Identity v2 base URL, e.g. `http://10.10.11.10:5000/v2.0`.
    pub auth_url: String,
}

impl OpenStackConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
            tenant: self.tenant.clone(),
            auth_url: self.auth_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Search-store base URL, e.g. `http://10.10.11.121:9200`.
    pub base_url: String,
}

/// Per-task tick periods, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalConfig {
    #[serde(default = "default_probe_secs")]
    pub probe_secs: u64,
    #[serde(default = "default_topology_secs")]
    pub topology_secs: u64,
    #[serde(default = "default_status_secs")]
    pub status_secs: u64,
    #[serde(default = "default_alert_secs")]
    pub alert_secs: u64,
    #[serde(default = "default_prune_secs")]
    pub prune_secs: u64,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            probe_secs: default_probe_secs(),
            topology_secs: default_topology_secs(),
            status_secs: default_status_secs(),
            alert_secs: default_alert_secs(),
            prune_secs: default_prune_secs(),
        }
    }
}

/// One configured log-event alert rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRuleConfig {
    pub uuid: String,
    pub name: String,
    #[serde(default = "default_alert_index_prefix")]
    pub index_prefix: String,
    /// Field/value pair the rule's `term` query matches on.
    pub match_field: String,
    pub match_value: String,
    #[serde(default = "default_alert_threshold")]
    pub threshold: u64,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_retention_days() -> u32 {
    30
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_probe_secs() -> u64 {
    30
}

fn default_topology_secs() -> u64 {
    300
}

fn default_status_secs() -> u64 {
    60
}

fn default_alert_secs() -> u64 {
    300
}

fn default_prune_secs() -> u64 {
    86_400
}

fn default_alert_index_prefix() -> String {
    "logstash-".to_string()
}

fn default_alert_threshold() -> u64 {
    1
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}
