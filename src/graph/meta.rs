//! Query planning: decompose a question into the entities, relationships and
//! search queries that retrieval should aim for.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{GraphSearchError, Result};
use crate::llm::{parse_json_response, TextGenerator};

/// An entity the answer is expected to involve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedEntity {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A relationship between planned entities, by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedRelationship {
    pub source_entity: String,
    pub target_entity: String,
    pub relationship: String,
}

/// Shape the completion is asked to produce.
#[derive(Deserialize)]
struct PlanResponse {
    entities: Vec<PlannedEntity>,
    relationships: Vec<PlannedRelationship>,
    initial_queries: Vec<String>,
}

/// Target structure for one retrieval session.
///
/// Immutable once built; always carries at least one initial query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetaGraph {
    entities: BTreeMap<String, PlannedEntity>,
    relationships: Vec<PlannedRelationship>,
    initial_queries: Vec<String>,
}

impl MetaGraph {
    /// Plan used when the completion cannot be trusted: search for the raw query.
    pub fn fallback(query: &str) -> Self {
        Self {
            entities: BTreeMap::new(),
            relationships: Vec::new(),
            initial_queries: vec![query.to_string()],
        }
    }

    /// Parse a planning completion. Entities are keyed by name; a later
    /// duplicate replaces an earlier one.
    pub fn from_completion(text: &str) -> Result<Self> {
        let response: PlanResponse = parse_json_response(text)?;

        let initial_queries: Vec<String> = response
            .initial_queries
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        if initial_queries.is_empty() {
            return Err(GraphSearchError::Llm(
                "plan contains no initial queries".to_string(),
            ));
        }

        let entities = response
            .entities
            .into_iter()
            .map(|e| (e.name.clone(), e))
            .collect();

        Ok(Self {
            entities,
            relationships: response.relationships,
            initial_queries,
        })
    }

    pub fn entities(&self) -> &BTreeMap<String, PlannedEntity> {
        &self.entities
    }

    pub fn relationships(&self) -> &[PlannedRelationship] {
        &self.relationships
    }

    pub fn initial_queries(&self) -> &[String] {
        &self.initial_queries
    }
}

/// Result of planning. Planning never fails a session; a bad completion
/// degrades to [`MetaGraph::fallback`].
#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    Generated(MetaGraph),
    Fallback { meta_graph: MetaGraph, reason: String },
}

impl PlanOutcome {
    pub fn meta_graph(&self) -> &MetaGraph {
        match self {
            PlanOutcome::Generated(g) => g,
            PlanOutcome::Fallback { meta_graph, .. } => meta_graph,
        }
    }

    pub fn into_meta_graph(self) -> MetaGraph {
        match self {
            PlanOutcome::Generated(g) => g,
            PlanOutcome::Fallback { meta_graph, .. } => meta_graph,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, PlanOutcome::Fallback { .. })
    }
}

/// Turns a raw query into a [`MetaGraph`].
#[async_trait]
pub trait QueryPlanner: Send + Sync {
    async fn plan(&self, query: &str) -> PlanOutcome;
}

/// Planner backed by a text-completion service.
pub struct MetaGraphPlanner {
    generator: Arc<dyn TextGenerator>,
}

impl MetaGraphPlanner {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl QueryPlanner for MetaGraphPlanner {
    async fn plan(&self, query: &str) -> PlanOutcome {
        let response = match self.generator.generate(&planning_prompt(query)).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("Error generating meta-graph for query: {}, error: {}", query, e);
                return PlanOutcome::Fallback {
                    meta_graph: MetaGraph::fallback(query),
                    reason: e.to_string(),
                };
            }
        };

        match MetaGraph::from_completion(&response) {
            Ok(meta_graph) => PlanOutcome::Generated(meta_graph),
            Err(e) => {
                log::error!(
                    "Error parsing meta-graph for query: {}, response: {}, error: {}",
                    query,
                    response,
                    e
                );
                PlanOutcome::Fallback {
                    meta_graph: MetaGraph::fallback(query),
                    reason: e.to_string(),
                }
            }
        }
    }
}

fn planning_prompt(query: &str) -> String {
    format!(
        r#"Task: Build a meta-graph for the query below. The meta-graph captures the query's meaning as entities and the relationships between them, so that the original intent could be reconstructed from it.

Requirements:
1. Entities are the subjects and objects the query is about.
2. Relationships describe the actions, comparisons or connections the query asks about.
3. Only include entities that contribute to the query's meaning; keep the graph small, consistent and precise.
4. Write 2-4 concrete search queries that would collect the information needed to answer the query.

Respond with JSON only, in this format:
{{
    "entities": [
        {{"name": "entity name", "description": "what this entity is"}}
    ],
    "relationships": [
        {{"source_entity": "entity name", "target_entity": "entity name", "relationship": "how they relate"}}
    ],
    "initial_queries": [
        "a search query for information needed to answer the query"
    ]
}}

Query to analyze: "{}""#,
        query
    )
}
