use std::sync::Arc;

use async_trait::async_trait;

use super::{Chunk, KnowledgeClient, RetrievalResult};
use crate::cache::{RetrievalCache, RetrievalKey};
use crate::error::Result;

/// Knowledge client decorator that memoizes `retrieve_knowledge` responses.
///
/// Neighbor expansion and chunk lookups always go to the inner client.
/// Failed calls are never cached.
pub struct CachedKnowledgeClient<C> {
    inner: C,
    cache: Arc<RetrievalCache>,
}

impl<C: KnowledgeClient> CachedKnowledgeClient<C> {
    pub fn new(inner: C, cache: Arc<RetrievalCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl<C: KnowledgeClient> KnowledgeClient for CachedKnowledgeClient<C> {
    async fn retrieve_knowledge(
        &self,
        query: &str,
        top_k: usize,
        similarity_threshold: f32,
    ) -> Result<RetrievalResult> {
        let key = RetrievalKey::new(query, top_k, similarity_threshold);
        if let Some(cached) = self.cache.get(&key) {
            log::debug!("Cache hit for query: {}", query);
            return Ok(cached);
        }

        let result = self
            .inner
            .retrieve_knowledge(query, top_k, similarity_threshold)
            .await?;
        self.cache.put(key, result.clone());
        Ok(result)
    }

    async fn retrieve_neighbors(
        &self,
        entity_ids: &[i64],
        query: &str,
        max_depth: usize,
        max_neighbors: usize,
        similarity_threshold: f32,
    ) -> Result<RetrievalResult> {
        self.inner
            .retrieve_neighbors(entity_ids, query, max_depth, max_neighbors, similarity_threshold)
            .await
    }

    async fn retrieve_chunks(&self, relationship_ids: &[i64]) -> Result<Vec<Chunk>> {
        self.inner.retrieve_chunks(relationship_ids).await
    }
}
