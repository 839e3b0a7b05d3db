//! SearchClient — HTTP client for the search engine.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::error::{SearchError, SearchResult};
use crate::types::*;

/// Default request timeout for every engine call.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default engine endpoint when neither `ES_URL` nor `ES_BASE_URL` is set.
const DEFAULT_BASE_URL: &str = "http://localhost:9200";

/// The subset of engine operations the control loops consume.
///
/// Loops take `Arc<dyn DataPlane>` so tests can substitute a scripted
/// engine; `SearchClient` is the production implementation.
#[async_trait]
pub trait DataPlane: Send + Sync {
    /// List every shard copy in the cluster.
    async fn shard_allocation(&self) -> SearchResult<Vec<ShardInfo>>;

    /// Apply transient-scope cluster settings.
    async fn update_cluster_settings(&self, settings: serde_json::Value) -> SearchResult<()>;

    /// Active shard recoveries grouped by index.
    async fn recovery_status(&self) -> SearchResult<HashMap<String, Vec<ShardRecovery>>>;

    /// Cluster-wide node and shard tallies.
    async fn cluster_stats(&self) -> SearchResult<ClusterStats>;
}

/// Typed client over the search engine's HTTP API.
#[derive(Clone)]
pub struct SearchClient {
    base_url: String,
    http: reqwest::Client,
}

impl SearchClient {
    /// Create a client against the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    /// Create a client from `ES_URL` / `ES_BASE_URL`, falling back to
    /// `http://localhost:9200`.
    pub fn from_env() -> Self {
        let base = std::env::var("ES_URL")
            .or_else(|_| std::env::var("ES_BASE_URL"))
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map a non-2xx response into `SearchError::Api` with the body text.
    async fn check(resp: reqwest::Response) -> SearchResult<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(SearchError::Api {
            status: status.as_u16(),
            body,
        })
    }

    // ── Index operations ──────────────────────────────────────────

    /// Create a vector index with the given mapping properties.
    pub async fn create_vector_index(
        &self,
        name: &str,
        properties: serde_json::Value,
    ) -> SearchResult<()> {
        let body = json!({ "mappings": { "properties": properties } });
        let resp = self
            .http
            .put(self.url(&format!("/{name}")))
            .json(&body)
            .send()
            .await?;
        Self::check(resp).await?;
        debug!(index = name, "vector index created");
        Ok(())
    }

    /// Delete an index. A 404 counts as success: the index is gone either way.
    pub async fn delete_index(&self, name: &str) -> SearchResult<()> {
        let resp = self.http.delete(self.url(&format!("/{name}"))).send().await?;
        if resp.status().as_u16() == 404 {
            return Ok(());
        }
        Self::check(resp).await?;
        Ok(())
    }

    /// Index a document, letting the engine assign an id when none is given.
    pub async fn index_document(
        &self,
        index: &str,
        id: Option<&str>,
        document: &serde_json::Value,
    ) -> SearchResult<()> {
        let path = match id {
            Some(id) => format!("/{index}/_doc/{id}"),
            None => format!("/{index}/_doc"),
        };
        let resp = self.http.post(self.url(&path)).json(document).send().await?;
        Self::check(resp).await?;
        Ok(())
    }

    /// Run a search query and return the raw response body.
    pub async fn search(
        &self,
        index: &str,
        query: &serde_json::Value,
    ) -> SearchResult<serde_json::Value> {
        let resp = self
            .http
            .post(self.url(&format!("/{index}/_search")))
            .json(query)
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        resp.json().await.map_err(|e| SearchError::Decode(e.to_string()))
    }

    /// Raw statistics for one index.
    pub async fn index_stats(&self, index: &str) -> SearchResult<serde_json::Value> {
        let resp = self
            .http
            .get(self.url(&format!("/{index}/_stats")))
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        resp.json().await.map_err(|e| SearchError::Decode(e.to_string()))
    }

    /// List indices with summary rows.
    pub async fn list_indices(&self) -> SearchResult<Vec<IndexSummary>> {
        let resp = self
            .http
            .get(self.url("/_cat/indices?format=json"))
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        resp.json().await.map_err(|e| SearchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl DataPlane for SearchClient {
    async fn shard_allocation(&self) -> SearchResult<Vec<ShardInfo>> {
        let resp = self
            .http
            .get(self.url("/_cat/shards?format=json"))
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        resp.json().await.map_err(|e| SearchError::Decode(e.to_string()))
    }

    async fn update_cluster_settings(&self, settings: serde_json::Value) -> SearchResult<()> {
        let resp = self
            .http
            .put(self.url("/_cluster/settings"))
            .json(&settings)
            .send()
            .await?;
        Self::check(resp).await?;
        debug!("cluster settings updated");
        Ok(())
    }

    async fn recovery_status(&self) -> SearchResult<HashMap<String, Vec<ShardRecovery>>> {
        let resp = self
            .http
            .get(self.url("/_recovery?active_only=true"))
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| SearchError::Decode(e.to_string()))?;
        Ok(parse_recovery_payload(&payload))
    }

    async fn cluster_stats(&self) -> SearchResult<ClusterStats> {
        let resp = self.http.get(self.url("/_cluster/stats")).send().await?;
        let resp = Self::check(resp).await?;
        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| SearchError::Decode(e.to_string()))?;
        parse_cluster_stats(&payload)
            .ok_or_else(|| SearchError::Decode("cluster stats missing node/shard tallies".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = SearchClient::new("http://es:9200/");
        assert_eq!(client.base_url(), "http://es:9200");
        assert_eq!(client.url("/_cluster/stats"), "http://es:9200/_cluster/stats");
    }

    #[test]
    fn default_base_url() {
        assert_eq!(DEFAULT_BASE_URL, "http://localhost:9200");
    }
}
