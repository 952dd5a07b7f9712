use crate::{
    CatalogEndpoint, CatalogService, ControlPlane, ControlPlaneConnector, Credentials,
    ServiceCatalog,
};
use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;

/// Connects to a keystone v2 identity endpoint and yields authenticated
/// [`ControlPlane`] handles.
pub struct KeystoneConnector {
    http: Client,
}

impl KeystoneConnector {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http })
    }
}

fn parse_catalog(access: &Value) -> ServiceCatalog {
    let services = access
        .get("serviceCatalog")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let service_type = entry.get("type")?.as_str()?.to_string();
                    let endpoints = entry
                        .get("endpoints")
                        .and_then(Value::as_array)
                        .map(|eps| {
                            eps.iter()
                                .filter_map(|ep| {
                                    Some(CatalogEndpoint {
                                        region: ep
                                            .get("region")
                                            .and_then(Value::as_str)
                                            .unwrap_or_default()
                                            .to_string(),
                                        public_url: ep.get("publicURL")?.as_str()?.to_string(),
                                    })
                                })
                                .collect()
                        })
                        .unwrap_or_default();
                    Some(CatalogService {
                        service_type,
                        endpoints,
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    ServiceCatalog { services }
}

#[async_trait::async_trait]
impl ControlPlaneConnector for KeystoneConnector {
    async fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn ControlPlane>> {
        let url = format!("{}/tokens", credentials.auth_url.trim_end_matches('/'));
        let payload = json!({
            "auth": {
                "passwordCredentials": {
                    "username": credentials.username,
                    "password": credentials.password,
                },
                "tenantName": credentials.tenant,
            }
        });

        let response = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .await
            .context("Token request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("token request returned status {status}");
        }
        let body: Value = response
            .json()
            .await
            .context("Failed to decode token response")?;
        let access = body
            .get("access")
            .context("Token response missing 'access'")?;
        let token = access
            .pointer("/token/id")
            .and_then(Value::as_str)
            .context("Token response missing token id")?
            .to_string();
        let catalog = parse_catalog(access);
        let identity_url = catalog
            .public_url("identity")
            .map(str::to_string)
            .unwrap_or_else(|| credentials.auth_url.clone());

        Ok(Arc::new(KeystoneClient {
            http: self.http.clone(),
            token,
            catalog,
            identity_url,
        }))
    }
}

/// Authenticated keystone client handle.
pub struct KeystoneClient {
    http: Client,
    token: String,
    catalog: ServiceCatalog,
    identity_url: String,
}

impl KeystoneClient {
    async fn get_json(&self, url: &str) -> Result<Value> {
        let response = self
            .http
            .get(url)
            .header("x-auth-token", &self.token)
            .header("content-type", "application/json")
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("GET {url} returned status {status}");
        }
        response
            .json()
            .await
            .with_context(|| format!("Failed to decode response from {url}"))
    }

    /// List one identity resource collection; `body_key` names the array
    /// in the response body.
    async fn list(&self, path: &str, body_key: &str) -> Result<Vec<Value>> {
        let url = format!("{}{}", self.identity_url.trim_end_matches('/'), path);
        let body = self.get_json(&url).await?;
        Ok(body
            .get(body_key)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl ControlPlane for KeystoneClient {
    fn auth_token(&self) -> &str {
        &self.token
    }

    fn service_catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    async fn list_endpoints(&self) -> Result<Vec<Value>> {
        self.list("/endpoints", "endpoints").await
    }

    async fn list_roles(&self) -> Result<Vec<Value>> {
        self.list("/OS-KSADM/roles", "roles").await
    }

    async fn list_services(&self) -> Result<Vec<Value>> {
        self.list("/OS-KSADM/services", "OS-KSADM:services").await
    }

    async fn list_tenants(&self) -> Result<Vec<Value>> {
        self.list("/tenants", "tenants").await
    }

    async fn list_users(&self) -> Result<Vec<Value>> {
        self.list("/users", "users").await
    }

    async fn hypervisor_statistics(&self) -> Result<Value> {
        let compute = self
            .catalog
            .public_url("compute")
            .context("No compute endpoint in catalog")?;
        let url = format!("{}/os-hypervisors/statistics", compute.trim_end_matches('/'));
        let body = self.get_json(&url).await?;
        Ok(body
            .get("hypervisor_statistics")
            .cloned()
            .unwrap_or(Value::Null))
    }
}
