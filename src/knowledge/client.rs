use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{Chunk, KnowledgeClient, RetrievalResult, RetryPolicy};
use crate::config::KnowledgeConfig;
use crate::error::{GraphSearchError, Result};

/// Request body for similarity retrieval
#[derive(Serialize)]
struct KnowledgeRequest<'a> {
    query: &'a str,
    top_k: usize,
    similarity_threshold: f32,
}

/// Request body for neighbor expansion
#[derive(Serialize)]
struct NeighborsRequest<'a> {
    entities_ids: &'a [i64],
    query: &'a str,
    max_depth: usize,
    max_neighbors: usize,
    similarity_threshold: f32,
}

/// Request body for chunk lookup
#[derive(Serialize)]
struct ChunksRequest<'a> {
    relationships_ids: &'a [i64],
}

/// HTTP client for a knowledge base hosted by the graph service.
///
/// Every call is a JSON POST under
/// `{base_url}/admin/knowledge_bases/{kb_id}/graph/knowledge`, with a per-request
/// timeout and retries on rate limiting and transient server errors.
pub struct HttpKnowledgeClient {
    client: Client,
    base_url: String,
    kb_id: i64,
    retry: RetryPolicy,
}

impl HttpKnowledgeClient {
    /// Create a new client
    ///
    /// # Arguments
    ///
    /// * `base_url` - Service root, e.g. `https://example.com/api/v1`
    /// * `kb_id` - Knowledge base to query
    /// * `timeout` - Per-request timeout
    /// * `retry` - Retry policy applied to every call
    pub fn new(base_url: &str, kb_id: i64, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            kb_id,
            retry,
        })
    }

    pub fn from_config(config: &KnowledgeConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            config.kb_id,
            Duration::from_secs(config.timeout_secs),
            RetryPolicy::new(config.max_retries),
        )
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!(
            "{}/admin/knowledge_bases/{}/graph/knowledge{}",
            self.base_url, self.kb_id, suffix
        )
    }

    async fn post_once<B, T>(&self, operation: &str, url: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.client.post(url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(GraphSearchError::Status {
                endpoint: operation.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            log::error!("Invalid JSON response received from {}: {}", operation, e);
            GraphSearchError::Json(e)
        })
    }

    async fn post<B, T>(&self, operation: &str, url: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        self.retry
            .run(operation, || self.post_once(operation, url, body))
            .await
            .map_err(|e| {
                log::error!("Request to {} failed: {}", operation, e);
                e
            })
    }
}

#[async_trait]
impl KnowledgeClient for HttpKnowledgeClient {
    async fn retrieve_knowledge(
        &self,
        query: &str,
        top_k: usize,
        similarity_threshold: f32,
    ) -> Result<RetrievalResult> {
        log::info!("retrieve_knowledge with argument: {}", query);
        let body = KnowledgeRequest {
            query,
            top_k,
            similarity_threshold,
        };
        self.post("retrieve_knowledge", &self.endpoint(""), &body).await
    }

    async fn retrieve_neighbors(
        &self,
        entity_ids: &[i64],
        query: &str,
        max_depth: usize,
        max_neighbors: usize,
        similarity_threshold: f32,
    ) -> Result<RetrievalResult> {
        log::info!("retrieve_neighbors with arguments: {:?}, {}", entity_ids, query);
        let body = NeighborsRequest {
            entities_ids: entity_ids,
            query,
            max_depth,
            max_neighbors,
            similarity_threshold,
        };
        self.post("retrieve_neighbors", &self.endpoint("/neighbors"), &body)
            .await
    }

    async fn retrieve_chunks(&self, relationship_ids: &[i64]) -> Result<Vec<Chunk>> {
        log::debug!("retrieve_chunks for {} relationships", relationship_ids.len());
        let body = ChunksRequest {
            relationships_ids: relationship_ids,
        };
        self.post("retrieve_chunks", &self.endpoint("/chunks"), &body)
            .await
    }
}
