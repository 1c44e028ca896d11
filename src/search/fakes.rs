//! In-memory stand-ins for the external services, shared by unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::action::{ActionRecord, EvaluationResult};
use super::evaluator::{EvaluationRequest, SufficiencyEvaluator};
use crate::error::{GraphSearchError, Result};
use crate::graph::{MetaGraph, PlanOutcome, QueryPlanner};
use crate::knowledge::{
    Chunk, ChunkId, Entity, EntityRef, KnowledgeClient, Relationship, RetrievalResult,
};
use crate::llm::TextGenerator;

pub fn entity(id: i64, name: &str) -> Entity {
    Entity {
        id,
        name: name.to_string(),
        description: format!("description of {}", name),
        meta: None,
    }
}

pub fn relationship(id: i64, source: i64, target: i64) -> Relationship {
    Relationship {
        id,
        source_entity: EntityRef {
            id: source,
            name: format!("e{}", source),
        },
        target_entity: EntityRef {
            id: target,
            name: format!("e{}", target),
        },
        description: format!("r{}", id),
        meta: None,
    }
}

pub fn plan_with_queries(queries: &[&str]) -> MetaGraph {
    let text = serde_json::json!({
        "entities": [],
        "relationships": [],
        "initial_queries": queries,
    })
    .to_string();
    MetaGraph::from_completion(&text).unwrap()
}

fn result(entities: Vec<(i64, &str)>, relationships: Vec<(i64, i64, i64)>) -> RetrievalResult {
    RetrievalResult {
        entities: entities.into_iter().map(|(id, name)| entity(id, name)).collect(),
        relationships: relationships
            .into_iter()
            .map(|(id, s, t)| relationship(id, s, t))
            .collect(),
    }
}

fn unavailable() -> GraphSearchError {
    GraphSearchError::Status {
        endpoint: "fake".to_string(),
        status: 503,
        body: "unavailable".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NeighborCall {
    pub entity_ids: Vec<i64>,
    pub query: String,
    pub max_depth: usize,
    pub max_neighbors: usize,
}

#[derive(Default)]
struct Calls {
    knowledge: Vec<String>,
    neighbors: Vec<NeighborCall>,
    chunks: Vec<Vec<i64>>,
}

/// Shared view of the calls a [`FakeKnowledgeClient`] received.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Calls>>);

impl CallLog {
    pub fn knowledge_queries(&self) -> Vec<String> {
        self.0.lock().unwrap().knowledge.clone()
    }

    pub fn neighbor_calls(&self) -> Vec<NeighborCall> {
        self.0.lock().unwrap().neighbors.clone()
    }

    pub fn chunk_calls(&self) -> Vec<Vec<i64>> {
        self.0.lock().unwrap().chunks.clone()
    }
}

/// Knowledge service answering from canned per-query results. Unknown
/// queries return an empty result.
#[derive(Default)]
pub struct FakeKnowledgeClient {
    knowledge: HashMap<String, RetrievalResult>,
    neighbors: HashMap<String, RetrievalResult>,
    failing_knowledge: HashSet<String>,
    failing_neighbors: HashSet<String>,
    failing_chunks: bool,
    chunk_payload: Option<Value>,
    fail_all: bool,
    calls: CallLog,
}

impl FakeKnowledgeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_knowledge(
        mut self,
        query: &str,
        entities: Vec<(i64, &str)>,
        relationships: Vec<(i64, i64, i64)>,
    ) -> Self {
        self.knowledge
            .insert(query.to_string(), result(entities, relationships));
        self
    }

    pub fn with_neighbors(
        mut self,
        query: &str,
        entities: Vec<(i64, &str)>,
        relationships: Vec<(i64, i64, i64)>,
    ) -> Self {
        self.neighbors
            .insert(query.to_string(), result(entities, relationships));
        self
    }

    pub fn failing_knowledge(mut self, query: &str) -> Self {
        self.failing_knowledge.insert(query.to_string());
        self
    }

    pub fn failing_neighbors(mut self, query: &str) -> Self {
        self.failing_neighbors.insert(query.to_string());
        self
    }

    pub fn failing_chunks(mut self) -> Self {
        self.failing_chunks = true;
        self
    }

    /// Answer chunk lookups with this raw service payload.
    pub fn with_chunk_payload(mut self, payload: Value) -> Self {
        self.chunk_payload = Some(payload);
        self
    }

    pub fn fail_all(mut self) -> Self {
        self.fail_all = true;
        self
    }

    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }
}

#[async_trait]
impl KnowledgeClient for FakeKnowledgeClient {
    async fn retrieve_knowledge(
        &self,
        query: &str,
        _top_k: usize,
        _similarity_threshold: f32,
    ) -> Result<RetrievalResult> {
        self.calls.0.lock().unwrap().knowledge.push(query.to_string());
        if self.fail_all || self.failing_knowledge.contains(query) {
            return Err(unavailable());
        }
        Ok(self.knowledge.get(query).cloned().unwrap_or_default())
    }

    async fn retrieve_neighbors(
        &self,
        entity_ids: &[i64],
        query: &str,
        max_depth: usize,
        max_neighbors: usize,
        _similarity_threshold: f32,
    ) -> Result<RetrievalResult> {
        self.calls.0.lock().unwrap().neighbors.push(NeighborCall {
            entity_ids: entity_ids.to_vec(),
            query: query.to_string(),
            max_depth,
            max_neighbors,
        });
        if self.fail_all || self.failing_neighbors.contains(query) {
            return Err(unavailable());
        }
        Ok(self.neighbors.get(query).cloned().unwrap_or_default())
    }

    async fn retrieve_chunks(&self, relationship_ids: &[i64]) -> Result<Vec<Chunk>> {
        self.calls
            .0
            .lock()
            .unwrap()
            .chunks
            .push(relationship_ids.to_vec());
        if self.fail_all || self.failing_chunks {
            return Err(unavailable());
        }
        if let Some(payload) = &self.chunk_payload {
            return Ok(serde_json::from_value(payload.clone())?);
        }
        Ok(relationship_ids
            .iter()
            .map(|id| Chunk {
                id: ChunkId::Int(id * 10),
                source_uri: format!("doc://{}", id),
                text: format!("text behind r{}", id),
                document_id: Some(Value::from(1)),
                extra: Map::new(),
            })
            .collect())
    }
}

/// Completion service replaying a fixed script, one entry per call.
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(responses: Vec<Result<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GraphSearchError::Llm("script exhausted".to_string())))
    }
}

pub struct FixedPlanner(MetaGraph);

impl FixedPlanner {
    pub fn new(meta_graph: MetaGraph) -> Self {
        Self(meta_graph)
    }
}

#[async_trait]
impl QueryPlanner for FixedPlanner {
    async fn plan(&self, _query: &str) -> PlanOutcome {
        PlanOutcome::Generated(self.0.clone())
    }
}

/// What the evaluator was shown in one round.
#[derive(Debug, Clone)]
pub struct EvaluationCall {
    pub candidate_entity_ids: Vec<i64>,
    pub candidate_relationship_ids: Vec<i64>,
    pub exploration_entity_ids: Vec<i64>,
    pub history: Vec<ActionRecord>,
}

/// Evaluator replaying scripted verdicts, then repeating a fallback.
pub struct ScriptedEvaluator {
    script: Mutex<VecDeque<Result<EvaluationResult>>>,
    fallback: EvaluationResult,
    calls: Mutex<Vec<EvaluationCall>>,
}

impl ScriptedEvaluator {
    pub fn new(script: Vec<Result<EvaluationResult>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: EvaluationResult::default(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn repeating(verdict: EvaluationResult) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: verdict,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<EvaluationCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SufficiencyEvaluator for ScriptedEvaluator {
    async fn evaluate(&self, request: EvaluationRequest<'_>) -> Result<EvaluationResult> {
        self.calls.lock().unwrap().push(EvaluationCall {
            candidate_entity_ids: request.candidates.entities.iter().map(|e| e.id).collect(),
            candidate_relationship_ids: request
                .candidates
                .relationships
                .iter()
                .map(|r| r.id)
                .collect(),
            exploration_entity_ids: request.exploration.entities.iter().map(|e| e.id).collect(),
            history: request.history.to_vec(),
        });
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}
