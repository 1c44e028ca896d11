//! Retrieved items waiting for an evaluation verdict.

use std::collections::HashMap;

use crate::graph::ExplorationGraph;
use crate::knowledge::{Entity, Relationship, RetrievalResult};

/// Entities and relationships retrieved since they were last judged.
///
/// A repeated id overwrites the earlier entry.
#[derive(Debug, Default)]
pub struct CandidatePool {
    entities: HashMap<i64, Entity>,
    relationships: HashMap<i64, Relationship>,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, result: RetrievalResult) {
        for entity in result.entities {
            self.entities.insert(entity.id, entity);
        }
        for relationship in result.relationships {
            self.relationships.insert(relationship.id, relationship);
        }
    }

    pub fn take_entity(&mut self, id: i64) -> Option<Entity> {
        self.entities.remove(&id)
    }

    pub fn take_relationship(&mut self, id: i64) -> Option<Relationship> {
        self.relationships.remove(&id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty()
    }

    /// Owned copy of the pool, ordered by id.
    pub fn snapshot(&self) -> RetrievalResult {
        let mut entities: Vec<Entity> = self.entities.values().cloned().collect();
        entities.sort_by_key(|e| e.id);
        let mut relationships: Vec<Relationship> = self.relationships.values().cloned().collect();
        relationships.sort_by_key(|r| r.id);
        RetrievalResult {
            entities,
            relationships,
        }
    }

    /// Move every candidate into `graph`, leaving the pool empty.
    pub fn drain_into(&mut self, graph: &mut ExplorationGraph) {
        for (_, entity) in self.entities.drain() {
            graph.add_entity(entity);
        }
        for (_, relationship) in self.relationships.drain() {
            graph.add_relationship(relationship);
        }
    }
}
