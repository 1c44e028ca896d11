//! Sufficiency evaluation: decide which candidates are useful, whether the
//! exploration graph can answer the query, and what to retrieve next.

use std::sync::Arc;

use async_trait::async_trait;

use super::action::{ActionRecord, EvaluationResult};
use crate::error::{GraphSearchError, Result};
use crate::graph::{ExplorationSnapshot, MetaGraph};
use crate::knowledge::RetrievalResult;
use crate::llm::{parse_json_response, TextGenerator};

/// Everything an evaluator may look at in one round. All views are
/// read-only copies owned by the orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationRequest<'a> {
    pub query: &'a str,
    pub meta_graph: &'a MetaGraph,
    pub history: &'a [ActionRecord],
    pub exploration: &'a ExplorationSnapshot,
    pub candidates: &'a RetrievalResult,
}

/// Judges retrieved candidates against the target structure.
///
/// An `Err` is fatal for the retrieval session.
#[async_trait]
pub trait SufficiencyEvaluator: Send + Sync {
    async fn evaluate(&self, request: EvaluationRequest<'_>) -> Result<EvaluationResult>;
}

/// Evaluator backed by a text-completion service.
pub struct LlmSufficiencyEvaluator {
    generator: Arc<dyn TextGenerator>,
}

impl LlmSufficiencyEvaluator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl SufficiencyEvaluator for LlmSufficiencyEvaluator {
    async fn evaluate(&self, request: EvaluationRequest<'_>) -> Result<EvaluationResult> {
        let prompt = evaluation_prompt(&request)?;

        let response = self.generator.generate(&prompt).await.map_err(|e| {
            GraphSearchError::Evaluation(format!("completion failed: {}", e))
        })?;

        parse_json_response(&response).map_err(|e| {
            GraphSearchError::Evaluation(format!(
                "unparsable evaluation ({}): {}",
                e,
                response.chars().take(500).collect::<String>()
            ))
        })
    }
}

fn evaluation_prompt(request: &EvaluationRequest<'_>) -> Result<String> {
    let meta_graph = serde_json::to_string_pretty(request.meta_graph)?;
    let exploration = serde_json::to_string_pretty(request.exploration)?;
    let history = serde_json::to_string_pretty(request.history)?;
    let entities = serde_json::to_string_pretty(&request.candidates.entities)?;
    let relationships = serde_json::to_string_pretty(&request.candidates.relationships)?;

    Ok(format!(
        r#"Judge how useful the newly retrieved information is for answering the query.

Meta-graph (target structure of the query):
{meta_graph}

Current exploration graph:
{exploration}

Actions history:
{history}

New retrieved entities:
{entities}

New retrieved relationships:
{relationships}

Query to answer: "{query}"

Work step by step, guided by the meta-graph and the query:
1. Discard retrieved entities and relationships that do not help answer the query.
2. Select the useful ones. Only pick ids from the new retrieved entities and relationships, skip anything already in the exploration graph, and prefer new, distinct information.
3. Decide whether information is still missing:
   - Compare the meta-graph's entities and relationships with the exploration graph and check that every key point of the query is covered.
   - The information is sufficient only if it answers every key question in the query.
   - If something is missing, name it and plan next actions with the available tools:
     * retrieve_knowledge: search for information not yet in the graph.
     * retrieve_neighbors: expand around entities already in the exploration graph.
     * Prefer tools or query wordings that differ from the actions history.

Respond with JSON only, in this format:
{{
    "useful_entity_ids": [101, 102],
    "useful_relationship_ids": [201],
    "is_sufficient": false,
    "missing_information": ["description of a missing key point"],
    "next_actions": [
        {{"tool": "retrieve_knowledge", "query": "query for information not yet in the graph"}},
        {{"tool": "retrieve_neighbors", "entity_ids": [101], "query": "query narrowing which neighbors to retrieve"}}
    ]
}}"#,
        query = request.query,
    ))
}
