//! The exploration graph: everything judged useful so far in a session.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::knowledge::{Chunk, Entity, KnowledgeClient, Relationship};

/// Entity as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicEntity {
    pub id: i64,
    pub name: String,
    pub description: String,
}

/// Relationship as returned to callers, with endpoints flattened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicRelationship {
    pub id: i64,
    pub source_entity: String,
    pub source_entity_id: i64,
    pub target_entity: String,
    pub target_entity_id: i64,
    pub relationship: String,
}

/// Public result of a retrieval session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublicGraph {
    pub entities: Vec<PublicEntity>,
    pub relationships: Vec<PublicRelationship>,
    pub chunks: Vec<Chunk>,
}

/// Owned, read-only copy of the exploration graph, ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExplorationSnapshot {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    pub chunks: Vec<Chunk>,
}

/// Deduplicated accumulator of entities and relationships, keyed by id.
///
/// Ids are never removed once added.
#[derive(Debug, Default)]
pub struct ExplorationGraph {
    entities: HashMap<i64, Entity>,
    relationships: HashMap<i64, Relationship>,
    chunks: Vec<Chunk>,
}

impl ExplorationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entity(&mut self, entity: Entity) {
        self.entities.insert(entity.id, entity);
    }

    pub fn add_relationship(&mut self, relationship: Relationship) {
        self.relationships.insert(relationship.id, relationship);
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    fn relationship_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.relationships.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Fetch the chunks behind every accumulated relationship in one call,
    /// replacing any previously fetched chunks. Does nothing when there are
    /// no relationships.
    pub async fn retrieve_chunks(&mut self, client: &dyn KnowledgeClient) -> Result<()> {
        let ids = self.relationship_ids();
        if ids.is_empty() {
            return Ok(());
        }
        self.chunks = client.retrieve_chunks(&ids).await?;
        Ok(())
    }

    pub fn snapshot(&self) -> ExplorationSnapshot {
        let mut entities: Vec<Entity> = self.entities.values().cloned().collect();
        entities.sort_by_key(|e| e.id);
        let mut relationships: Vec<Relationship> = self.relationships.values().cloned().collect();
        relationships.sort_by_key(|r| r.id);

        ExplorationSnapshot {
            entities,
            relationships,
            chunks: self.chunks.clone(),
        }
    }

    /// Stripped view returned to callers, ordered by id.
    pub fn public_view(&self) -> PublicGraph {
        let snapshot = self.snapshot();

        let entities = snapshot
            .entities
            .into_iter()
            .map(|e| PublicEntity {
                id: e.id,
                name: e.name,
                description: e.description,
            })
            .collect();

        let relationships = snapshot
            .relationships
            .into_iter()
            .map(|r| PublicRelationship {
                id: r.id,
                source_entity: r.source_entity.name,
                source_entity_id: r.source_entity.id,
                target_entity: r.target_entity.name,
                target_entity_id: r.target_entity.id,
                relationship: r.description,
            })
            .collect();

        PublicGraph {
            entities,
            relationships,
            chunks: snapshot.chunks,
        }
    }
}
