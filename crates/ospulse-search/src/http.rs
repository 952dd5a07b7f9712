use crate::{daily_index, QuerySpec, SearchStore};
use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

/// Elasticsearch-over-HTTP implementation of [`SearchStore`].
pub struct EsHttpStore {
    base_url: String,
    client: Client,
}

#[derive(Deserialize)]
struct CatIndexRow {
    index: String,
}

impl EsHttpStore {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl SearchStore for EsHttpStore {
    async fn index(&self, series_prefix: &str, doc_type: &str, document: Value) -> Result<()> {
        let index = daily_index(series_prefix, Utc::now().date_naive());
        let url = format!("{}/{}/{}", self.base_url, index, doc_type);
        let response = self
            .client
            .post(&url)
            .json(&document)
            .send()
            .await
            .with_context(|| format!("Failed to index document into {index}"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("indexing into {index} returned status {status}");
        }
        Ok(())
    }

    async fn search(&self, query: &QuerySpec) -> Result<Value> {
        let url = format!("{}/{}/_search", self.base_url, query.index_pattern);
        let response = self
            .client
            .post(&url)
            .json(&query.body)
            .send()
            .await
            .with_context(|| format!("Search against {} failed", query.index_pattern))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!(
                "search against {} returned status {status}",
                query.index_pattern
            );
        }
        response
            .json::<Value>()
            .await
            .context("Failed to decode search response")
    }

    async fn list_index_names(&self) -> Result<Vec<String>> {
        let url = format!("{}/_cat/indices?h=index&format=json", self.base_url);
        let rows: Vec<CatIndexRow> = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to list indices")?
            .error_for_status()
            .context("Index listing returned an error status")?
            .json()
            .await
            .context("Failed to decode index listing")?;

        Ok(rows.into_iter().map(|row| row.index).collect())
    }

    async fn delete_indices(&self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        let url = format!("{}/{}", self.base_url, names.join(","));
        self.client
            .delete(&url)
            .send()
            .await
            .context("Failed to delete indices")?
            .error_for_status()
            .context("Index deletion returned an error status")?;
        Ok(())
    }
}
