//! Knowledge-graph service boundary: wire types, the client trait, and its
//! HTTP and cached implementations.

mod cached;
mod client;
pub mod retry;

pub use cached::CachedKnowledgeClient;
pub use client::HttpKnowledgeClient;
pub use retry::RetryPolicy;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// An entity as returned by the knowledge service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Backend-specific metadata; dropped from the public view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// Endpoint of a relationship. The service sends full entity objects here;
/// only the identifying fields are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: i64,
    pub name: String,
}

/// A directed relationship between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: i64,
    pub source_entity: EntityRef,
    pub target_entity: EntityRef,
    #[serde(default, alias = "relationship")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// Chunk identifier. The service uses integer ids or UUID strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChunkId {
    Int(i64),
    Text(String),
}

/// Source text backing a relationship.
///
/// Passed through to callers as-is; fields this crate does not know about
/// are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    #[serde(default)]
    pub source_uri: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub document_id: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Entities and relationships returned by a single retrieval call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty()
    }
}

/// Remote operations offered by the knowledge-graph service.
///
/// Implementations surface transport failures as errors; an empty
/// [`RetrievalResult`] always means the service found nothing.
#[async_trait]
pub trait KnowledgeClient: Send + Sync {
    /// Similarity search over entities and relationships.
    async fn retrieve_knowledge(
        &self,
        query: &str,
        top_k: usize,
        similarity_threshold: f32,
    ) -> Result<RetrievalResult>;

    /// Expand the neighborhood of already-known entities, narrowed by `query`.
    async fn retrieve_neighbors(
        &self,
        entity_ids: &[i64],
        query: &str,
        max_depth: usize,
        max_neighbors: usize,
        similarity_threshold: f32,
    ) -> Result<RetrievalResult>;

    /// Fetch the chunks behind a set of relationships.
    async fn retrieve_chunks(&self, relationship_ids: &[i64]) -> Result<Vec<Chunk>>;
}
