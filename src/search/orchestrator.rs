//! The retrieval loop: plan, fan out, evaluate, accumulate, repeat.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use uuid::Uuid;

use super::action::ActionRecord;
use super::dispatcher::{ActionDispatcher, RetrievalParams};
use super::evaluator::{EvaluationRequest, LlmSufficiencyEvaluator, SufficiencyEvaluator};
use super::trace::{RetrieveTracer, Trace};
use crate::error::{GraphSearchError, Result};
use crate::graph::{CandidatePool, ExplorationGraph, MetaGraphPlanner, PublicGraph, QueryPlanner};
use crate::knowledge::KnowledgeClient;
use crate::llm::TextGenerator;

/// Per-call knobs for [`GraphRetriever::retrieve`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetrieveOptions {
    pub top_k: usize,
    pub similarity_threshold: f32,
    pub max_depth: usize,
    /// Upper bound on evaluation rounds.
    pub max_iterations: usize,
    /// Maximum retrieval calls in flight per batch.
    pub concurrency: usize,
    pub enable_tracing: bool,
    /// When false, skip evaluation and return everything from the initial
    /// fan-out.
    pub enable_optimization: bool,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            similarity_threshold: 0.5,
            max_depth: 1,
            max_iterations: 5,
            concurrency: 5,
            enable_tracing: false,
            enable_optimization: true,
        }
    }
}

impl RetrieveOptions {
    fn params(&self) -> RetrievalParams {
        RetrievalParams {
            top_k: self.top_k,
            similarity_threshold: self.similarity_threshold,
            max_depth: self.max_depth,
        }
    }
}

/// Result of a retrieval session.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalOutput {
    #[serde(flatten)]
    pub graph: PublicGraph,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traces: Option<Trace>,
}

/// Drives iterative retrieval for one query at a time.
///
/// Planner, evaluator and knowledge client are injected; each call to
/// [`retrieve`](Self::retrieve) owns its own session state.
pub struct GraphRetriever {
    planner: Arc<dyn QueryPlanner>,
    evaluator: Arc<dyn SufficiencyEvaluator>,
    knowledge: Arc<dyn KnowledgeClient>,
}

impl GraphRetriever {
    pub fn new(
        planner: Arc<dyn QueryPlanner>,
        evaluator: Arc<dyn SufficiencyEvaluator>,
        knowledge: Arc<dyn KnowledgeClient>,
    ) -> Self {
        Self {
            planner,
            evaluator,
            knowledge,
        }
    }

    /// Use one completion service for both planning and evaluation.
    pub fn from_generator(
        generator: Arc<dyn TextGenerator>,
        knowledge: Arc<dyn KnowledgeClient>,
    ) -> Self {
        Self::new(
            Arc::new(MetaGraphPlanner::new(generator.clone())),
            Arc::new(LlmSufficiencyEvaluator::new(generator)),
            knowledge,
        )
    }

    /// Assemble a subgraph sufficient to answer `query`.
    ///
    /// Stops when the evaluator reports sufficiency or after
    /// `max_iterations` rounds. Retrieval failures degrade the result; an
    /// evaluation failure or a chunk-fetch failure aborts with an error.
    pub async fn retrieve(&self, query: &str, options: &RetrieveOptions) -> Result<RetrievalOutput> {
        if query.trim().is_empty() {
            return Err(GraphSearchError::InvalidInput("Query cannot be empty".to_string()));
        }

        let session_id = Uuid::new_v4();
        let mut tracer = options
            .enable_tracing
            .then(|| RetrieveTracer::new(session_id, query));
        log::info!("[{}] Starting search with query: {}", session_id, query);

        // Planning
        let start = Instant::now();
        let meta_graph = self.planner.plan(query).await.into_meta_graph();
        log::debug!(
            "[{}] Meta-graph generation completed in {:?}",
            session_id,
            start.elapsed()
        );
        if let Some(t) = tracer.as_mut() {
            t.record_meta_graph(&meta_graph);
        }

        let params = options.params();
        let dispatcher = ActionDispatcher::new(self.knowledge.clone(), options.concurrency);
        let mut history: Vec<ActionRecord> = meta_graph
            .initial_queries()
            .iter()
            .cloned()
            .map(ActionRecord::Query)
            .collect();
        let mut pool = CandidatePool::new();
        let mut exploration = ExplorationGraph::new();

        // Initial retrieval
        let start = Instant::now();
        for retrieval in dispatcher
            .retrieve_initial(meta_graph.initial_queries(), params)
            .await
        {
            if let Some(t) = tracer.as_mut() {
                t.record_initial_retrieval(&retrieval.query, &retrieval.result);
            }
            pool.merge(retrieval.result);
        }
        log::info!(
            "[{}] Initial retrieval completed in {:?}: {} entities, {} relationships",
            session_id,
            start.elapsed(),
            pool.entity_count(),
            pool.relationship_count()
        );

        if !options.enable_optimization {
            pool.drain_into(&mut exploration);
            return Ok(RetrievalOutput {
                graph: exploration.public_view(),
                traces: tracer.map(RetrieveTracer::finish),
            });
        }

        let mut sufficient = false;
        for iteration in 1..=options.max_iterations {
            log::info!("[{}] --- Iteration {}: {} ---", session_id, iteration, query);

            let start = Instant::now();
            let exploration_snapshot = exploration.snapshot();
            let candidates = pool.snapshot();
            let evaluation = self
                .evaluator
                .evaluate(EvaluationRequest {
                    query,
                    meta_graph: &meta_graph,
                    history: &history,
                    exploration: &exploration_snapshot,
                    candidates: &candidates,
                })
                .await
                .map_err(|e| {
                    log::error!(
                        "[{}] Evaluation failed in iteration {}: {}",
                        session_id,
                        iteration,
                        e
                    );
                    e
                })?;
            log::info!("[{}] Analysis completed in {:?}", session_id, start.elapsed());
            log::debug!("[{}] evaluation result: {:?}", session_id, evaluation);

            if let Some(t) = tracer.as_mut() {
                t.record_iteration(iteration, &evaluation, &exploration_snapshot);
            }

            // Ids the evaluator names that are not pooled are ignored.
            for id in &evaluation.useful_entity_ids {
                if let Some(entity) = pool.take_entity(*id) {
                    exploration.add_entity(entity);
                }
            }
            for id in &evaluation.useful_relationship_ids {
                if let Some(relationship) = pool.take_relationship(*id) {
                    exploration.add_relationship(relationship);
                }
            }

            if evaluation.is_sufficient {
                log::info!(
                    "[{}] Sufficient information retrieved for query: {}",
                    session_id,
                    query
                );
                sufficient = true;
                break;
            }

            if evaluation.next_actions.is_empty() {
                log::warn!(
                    "[{}] Iteration {}: not sufficient but no next actions proposed",
                    session_id,
                    iteration
                );
            }

            let start = Instant::now();
            let outcomes = dispatcher
                .dispatch(evaluation.next_actions.clone(), params)
                .await;
            if !outcomes.is_empty() && outcomes.iter().all(|o| o.result.is_empty()) {
                log::warn!(
                    "[{}] Iteration {}: all {} actions returned nothing",
                    session_id,
                    iteration,
                    outcomes.len()
                );
            }
            for outcome in outcomes {
                if let Some(t) = tracer.as_mut() {
                    t.record_action(iteration, &outcome.action, &outcome.result);
                }
                pool.merge(outcome.result);
            }
            history.extend(evaluation.next_actions.into_iter().map(ActionRecord::Action));

            log::info!(
                "[{}] Iteration {} completed in {:?}",
                session_id,
                iteration,
                start.elapsed()
            );
        }

        if !sufficient {
            log::info!(
                "[{}] Stopped after {} iterations without a sufficiency verdict",
                session_id,
                options.max_iterations
            );
        }

        // Chunk retrieval
        exploration.retrieve_chunks(self.knowledge.as_ref()).await?;
        log::info!(
            "[{}] Retrieved {} entities, {} relationships, {} chunks",
            session_id,
            exploration.entity_count(),
            exploration.relationship_count(),
            exploration.chunks().len()
        );

        Ok(RetrievalOutput {
            graph: exploration.public_view(),
            traces: tracer.map(RetrieveTracer::finish),
        })
    }
}
