//! Control-plane client capability, credential caching, API probing and
//! topology discovery for an OpenStack-style cloud.

pub mod cache;
pub mod error;
pub mod keystone;
pub mod probe;
pub mod topology;

use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;

/// Credential set for one control-plane identity. The full tuple is the
/// memoization key of the [`cache::CredentialCache`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub tenant: String,
    pub auth_url: String,
}

/// One endpoint advertised in the service catalog.
#[derive(Debug, Clone)]
pub struct CatalogEndpoint {
    pub region: String,
    pub public_url: String,
}

/// One catalog entry: a service type and its endpoints.
#[derive(Debug, Clone)]
pub struct CatalogService {
    pub service_type: String,
    pub endpoints: Vec<CatalogEndpoint>,
}

/// The service catalog returned alongside an auth token.
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    pub services: Vec<CatalogService>,
}

impl ServiceCatalog {
    /// Public URL of the first endpoint advertised for `service_type`.
    pub fn public_url(&self, service_type: &str) -> Option<&str> {
        self.services
            .iter()
            .find(|svc| svc.service_type == service_type)
            .and_then(|svc| svc.endpoints.first())
            .map(|ep| ep.public_url.as_str())
    }

    /// Region of this deployment, derived from the identity endpoint when
    /// present, otherwise from the first catalog entry.
    pub fn region(&self) -> Option<&str> {
        let identity = self
            .services
            .iter()
            .find(|svc| svc.service_type == "identity")
            .and_then(|svc| svc.endpoints.first());
        identity
            .or_else(|| self.services.first().and_then(|svc| svc.endpoints.first()))
            .map(|ep| ep.region.as_str())
    }
}

/// An authenticated control-plane client handle.
///
/// Listing calls return resources as plain structured records so topology
/// snapshots can carry them verbatim.
#[async_trait::async_trait]
pub trait ControlPlane: Send + Sync {
    /// The raw auth token obtained at construction.
    fn auth_token(&self) -> &str;

    /// The service catalog obtained at construction.
    fn service_catalog(&self) -> &ServiceCatalog;

    async fn list_endpoints(&self) -> Result<Vec<Value>>;
    async fn list_roles(&self) -> Result<Vec<Value>>;
    async fn list_services(&self) -> Result<Vec<Value>>;
    async fn list_tenants(&self) -> Result<Vec<Value>>;
    async fn list_users(&self) -> Result<Vec<Value>>;

    /// Aggregate hypervisor statistics as a key -> value object.
    async fn hypervisor_statistics(&self) -> Result<Value>;
}

/// Builds authenticated [`ControlPlane`] handles from credentials.
#[async_trait::async_trait]
pub trait ControlPlaneConnector: Send + Sync {
    async fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn ControlPlane>>;
}
