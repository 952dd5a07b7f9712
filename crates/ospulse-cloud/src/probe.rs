use crate::cache::CredentialCache;
use crate::error::{CloudError, Result};
use crate::ControlPlane;
use anyhow::Context;
use chrono::Utc;
use md5::{Digest, Md5};
use ospulse_common::id::next_task_id;
use ospulse_common::time::to_es_date;
use ospulse_common::types::PerformanceSample;
use ospulse_search::SearchStore;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Series receiving performance samples.
pub const PERF_INDEX_PREFIX: &str = "api_stats-";
const PERF_DOCTYPE: &str = "api_perf";

/// Issues one authenticated probe call per invocation, measures it, and
/// persists the resulting [`PerformanceSample`].
///
/// There is no retry within an invocation: any failure after the handle
/// was obtained invalidates the credential cache so the next scheduled
/// tick re-authenticates.
pub struct ApiProber {
    cache: Arc<CredentialCache>,
    store: Arc<dyn SearchStore>,
    http: reqwest::Client,
}

struct TimedReply {
    status: u16,
    elapsed_secs: f64,
    content_length: Option<u64>,
    uri: String,
    body: String,
}

/// The probe target expects the auth token hashed, not sent verbatim.
fn hash_token(token: &str) -> String {
    format!("{:x}", Md5::digest(token.as_bytes()))
}

/// Id of the first listed image, if the listing holds more than one.
fn first_image_id(body: &str) -> Result<Option<String>> {
    let parsed: Value = serde_json::from_str(body)?;
    let images = match parsed.get("images").and_then(Value::as_array) {
        Some(images) if images.len() > 1 => images,
        _ => return Ok(None),
    };
    Ok(images[0]
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string))
}

impl ApiProber {
    pub fn new(
        cache: Arc<CredentialCache>,
        store: Arc<dyn SearchStore>,
        timeout_secs: u64,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { cache, store, http })
    }

    /// Probe one endpoint of `service_type` and persist the sample.
    pub async fn probe(
        &self,
        component: &str,
        service_type: &str,
        path: &str,
    ) -> Result<PerformanceSample> {
        let client = self.cache.get(None).await?;
        match self
            .execute(client.as_ref(), component, service_type, path, false)
            .await
        {
            Ok(sample) => Ok(sample),
            Err(e) => {
                // Reauthenticate next tick to be safe
                self.cache.invalidate().await;
                Err(e)
            }
        }
    }

    /// Probe the image listing. When the listing returns more than one
    /// image, one follow-up detail call is issued against the first image
    /// and the persisted sample reflects that call instead.
    pub async fn probe_image_list(&self, component: &str) -> Result<PerformanceSample> {
        let client = self.cache.get(None).await?;
        match self
            .execute(client.as_ref(), component, "image", "/v2/images", true)
            .await
        {
            Ok(sample) => Ok(sample),
            Err(e) => {
                self.cache.invalidate().await;
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        client: &dyn ControlPlane,
        component: &str,
        service_type: &str,
        path: &str,
        follow_first_item: bool,
    ) -> Result<PerformanceSample> {
        let base = client
            .service_catalog()
            .public_url(service_type)
            .ok_or_else(|| CloudError::MissingEndpoint(service_type.to_string()))?
            .to_string();
        let token_hash = hash_token(client.auth_token());

        let mut reply = self.timed_get(&format!("{base}{path}"), &token_hash).await?;

        if follow_first_item && reply.status == 200 {
            if let Some(id) = first_image_id(&reply.body)? {
                reply = self
                    .timed_get(&format!("{base}{path}/{id}"), &token_hash)
                    .await?;
            }
        }

        if reply.status != 200 {
            return Err(CloudError::UnexpectedStatus {
                component: component.to_string(),
                status: reply.status,
            });
        }
        let response_length = reply.content_length.ok_or(CloudError::MissingContentLength)?;

        let sample = PerformanceSample {
            component: component.to_string(),
            uri: reply.uri,
            response_status: reply.status,
            response_time: reply.elapsed_secs,
            response_length,
            timestamp: to_es_date(Utc::now()),
            task_id: next_task_id(),
        };
        tracing::debug!(
            component,
            uri = %sample.uri,
            status = sample.response_status,
            response_time = sample.response_time,
            "Probe completed"
        );

        self.store
            .index(PERF_INDEX_PREFIX, PERF_DOCTYPE, sample.to_document())
            .await
            .map_err(|e| CloudError::Store(e.to_string()))?;
        Ok(sample)
    }

    async fn timed_get(&self, url: &str, token_hash: &str) -> Result<TimedReply> {
        let started = Instant::now();
        let response = self
            .http
            .get(url)
            .header("x-auth-token", token_hash)
            .header("content-type", "application/json")
            .send()
            .await?;
        let elapsed_secs = started.elapsed().as_secs_f64();

        let status = response.status().as_u16();
        let uri = response.url().path().to_string();
        let content_length = response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let body = response.text().await.unwrap_or_default();

        Ok(TimedReply {
            status,
            elapsed_secs,
            content_length,
            uri,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        CatalogEndpoint, CatalogService, ControlPlaneConnector, Credentials, ServiceCatalog,
    };
    use ospulse_search::QuerySpec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    struct StubControlPlane {
        catalog: ServiceCatalog,
    }

    #[async_trait::async_trait]
    impl ControlPlane for StubControlPlane {
        fn auth_token(&self) -> &str {
            "stub-token"
        }
        fn service_catalog(&self) -> &ServiceCatalog {
            &self.catalog
        }
        async fn list_endpoints(&self) -> anyhow::Result<Vec<Value>> {
            Ok(Vec::new())
        }
        async fn list_roles(&self) -> anyhow::Result<Vec<Value>> {
            Ok(Vec::new())
        }
        async fn list_services(&self) -> anyhow::Result<Vec<Value>> {
            Ok(Vec::new())
        }
        async fn list_tenants(&self) -> anyhow::Result<Vec<Value>> {
            Ok(Vec::new())
        }
        async fn list_users(&self) -> anyhow::Result<Vec<Value>> {
            Ok(Vec::new())
        }
        async fn hypervisor_statistics(&self) -> anyhow::Result<Value> {
            Ok(Value::Null)
        }
    }

    struct StubConnector {
        image_url: String,
        connects: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ControlPlaneConnector for StubConnector {
        async fn connect(&self, _: &Credentials) -> anyhow::Result<Arc<dyn ControlPlane>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(StubControlPlane {
                catalog: ServiceCatalog {
                    services: vec![CatalogService {
                        service_type: "image".to_string(),
                        endpoints: vec![CatalogEndpoint {
                            region: "RegionOne".to_string(),
                            public_url: self.image_url.clone(),
                        }],
                    }],
                },
            }))
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        docs: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait::async_trait]
    impl SearchStore for RecordingStore {
        async fn index(&self, prefix: &str, _: &str, document: Value) -> anyhow::Result<()> {
            self.docs.lock().unwrap().push((prefix.to_string(), document));
            Ok(())
        }
        async fn search(&self, _: &QuerySpec) -> anyhow::Result<Value> {
            Ok(Value::Null)
        }
        async fn list_index_names(&self) -> anyhow::Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn delete_indices(&self, _: &[String]) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn canned(status: u16, body: &str) -> String {
        let reason = if status == 200 { "OK" } else { "Error" };
        format!(
            "HTTP/1.1 {status} {reason}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len(),
        )
    }

    /// Serve one canned response per connection and record request paths.
    async fn spawn_server(responses: Vec<String>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let paths = Arc::new(Mutex::new(Vec::new()));
        let recorded = paths.clone();

        tokio::spawn(async move {
            let mut responses = responses.into_iter();
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = vec![0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let path = request
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("/")
                    .to_string();
                recorded.lock().unwrap().push(path);

                let response = match responses.next() {
                    Some(r) => r,
                    None => break,
                };
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{addr}"), paths)
    }

    fn build_prober(
        image_url: &str,
    ) -> (ApiProber, Arc<StubConnector>, Arc<RecordingStore>) {
        let connector = Arc::new(StubConnector {
            image_url: image_url.to_string(),
            connects: AtomicUsize::new(0),
        });
        let cache = Arc::new(CredentialCache::new(
            connector.clone(),
            Credentials {
                username: "admin".to_string(),
                password: "secret".to_string(),
                tenant: "admin".to_string(),
                auth_url: "http://keystone:5000/v2.0".to_string(),
            },
        ));
        let store = Arc::new(RecordingStore::default());
        let prober = ApiProber::new(cache, store.clone(), 5).unwrap();
        (prober, connector, store)
    }

    #[tokio::test]
    async fn test_failed_probe_invalidates_cache_and_writes_nothing() {
        let (url, _) = spawn_server(vec![canned(500, "{}")]).await;
        let (prober, connector, store) = build_prober(&url);

        let result = prober.probe_image_list("glance").await;
        assert!(matches!(
            result,
            Err(CloudError::UnexpectedStatus { status: 500, .. })
        ));
        assert!(store.docs.lock().unwrap().is_empty());

        // The cache was invalidated exactly once: the first probe built a
        // handle, the next access must build a second.
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
        let _ = prober.cache.get(None).await.unwrap();
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_image_probe_follows_first_item_when_listing_has_two() {
        let listing = r#"{"images": [{"id": "img-1"}, {"id": "img-2"}]}"#;
        let (url, paths) =
            spawn_server(vec![canned(200, listing), canned(200, r#"{"id": "img-1"}"#)]).await;
        let (prober, _, store) = build_prober(&url);

        let sample = prober.probe_image_list("glance").await.unwrap();

        let paths = paths.lock().unwrap();
        assert_eq!(paths.as_slice(), ["/v2/images", "/v2/images/img-1"]);
        assert_eq!(sample.uri, "/v2/images/img-1");
        assert_eq!(sample.response_status, 200);
        assert_eq!(sample.response_length, 15);

        let docs = store.docs.lock().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].0, PERF_INDEX_PREFIX);
        assert_eq!(docs[0].1["uri"], "/v2/images/img-1");
        assert_eq!(docs[0].1["component"], "glance");
    }

    #[tokio::test]
    async fn test_single_image_listing_is_not_followed() {
        let listing = r#"{"images": [{"id": "img-1"}]}"#;
        let (url, paths) = spawn_server(vec![canned(200, listing)]).await;
        let (prober, _, store) = build_prober(&url);

        let sample = prober.probe_image_list("glance").await.unwrap();

        assert_eq!(paths.lock().unwrap().as_slice(), ["/v2/images"]);
        assert_eq!(sample.uri, "/v2/images");
        assert_eq!(store.docs.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_token_hash_is_md5_hex() {
        // md5("stub-token")
        assert_eq!(hash_token("stub-token"), "96b7cd3325335741d83e79b3f1dbe7a3");
        assert_eq!(hash_token("").len(), 32);
    }
}
