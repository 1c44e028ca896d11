//! Optional per-session record of every retrieval phase.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::action::{Action, EvaluationResult};
use crate::graph::{ExplorationSnapshot, MetaGraph};
use crate::knowledge::RetrievalResult;

#[derive(Debug, Clone, Serialize)]
pub struct InitialRetrievalTrace {
    pub query: String,
    pub results: RetrievalResult,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetaGraphPhase {
    pub meta_graph: Option<MetaGraph>,
    pub initial_retrievals: Vec<InitialRetrievalTrace>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionTrace {
    pub action: Action,
    pub results: RetrievalResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct IterationTrace {
    pub iteration: usize,
    pub evaluation: EvaluationResult,
    /// Exploration graph as the evaluator saw it in this round.
    pub exploration_graph_snapshot: ExplorationSnapshot,
    pub actions: Vec<ActionTrace>,
}

/// Append-only trace of one retrieval session.
#[derive(Debug, Clone, Serialize)]
pub struct Trace {
    pub session_id: Uuid,
    pub query: String,
    pub started_at: DateTime<Utc>,
    pub meta_graph_phase: MetaGraphPhase,
    pub iterations: Vec<IterationTrace>,
}

/// Builds a [`Trace`] as the orchestrator moves through its phases.
pub struct RetrieveTracer {
    trace: Trace,
}

impl RetrieveTracer {
    pub fn new(session_id: Uuid, query: &str) -> Self {
        Self {
            trace: Trace {
                session_id,
                query: query.to_string(),
                started_at: Utc::now(),
                meta_graph_phase: MetaGraphPhase::default(),
                iterations: Vec::new(),
            },
        }
    }

    pub fn record_meta_graph(&mut self, meta_graph: &MetaGraph) {
        self.trace.meta_graph_phase.meta_graph = Some(meta_graph.clone());
    }

    pub fn record_initial_retrieval(&mut self, query: &str, results: &RetrievalResult) {
        self.trace
            .meta_graph_phase
            .initial_retrievals
            .push(InitialRetrievalTrace {
                query: query.to_string(),
                results: results.clone(),
            });
    }

    /// Open a new iteration with its evaluation verdict.
    pub fn record_iteration(
        &mut self,
        iteration: usize,
        evaluation: &EvaluationResult,
        snapshot: &ExplorationSnapshot,
    ) {
        self.trace.iterations.push(IterationTrace {
            iteration,
            evaluation: evaluation.clone(),
            exploration_graph_snapshot: snapshot.clone(),
            actions: Vec::new(),
        });
    }

    pub fn record_action(&mut self, iteration: usize, action: &Action, results: &RetrievalResult) {
        match self
            .trace
            .iterations
            .iter_mut()
            .rev()
            .find(|t| t.iteration == iteration)
        {
            Some(current) => current.actions.push(ActionTrace {
                action: action.clone(),
                results: results.clone(),
            }),
            None => log::warn!("trace has no iteration {}; action {} dropped", iteration, action),
        }
    }

    pub fn finish(self) -> Trace {
        self.trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::fakes::{entity, plan_with_queries};

    #[test]
    fn test_records_phases_in_order() {
        let mut tracer = RetrieveTracer::new(Uuid::new_v4(), "What is ACV?");
        tracer.record_meta_graph(&plan_with_queries(&["definition of ACV"]));
        tracer.record_initial_retrieval(
            "definition of ACV",
            &RetrievalResult {
                entities: vec![entity(101, "ACV")],
                relationships: vec![],
            },
        );
        tracer.record_iteration(1, &EvaluationResult::default(), &ExplorationSnapshot::default());
        let action = Action::RetrieveKnowledge {
            query: "ACV formula".to_string(),
        };
        tracer.record_action(1, &action, &RetrievalResult::default());
        tracer.record_iteration(2, &EvaluationResult::default(), &ExplorationSnapshot::default());

        let trace = tracer.finish();
        assert_eq!(trace.query, "What is ACV?");
        assert!(trace.meta_graph_phase.meta_graph.is_some());
        assert_eq!(trace.meta_graph_phase.initial_retrievals.len(), 1);
        assert_eq!(trace.iterations.len(), 2);
        assert_eq!(trace.iterations[0].actions.len(), 1);
        assert_eq!(trace.iterations[0].actions[0].action, action);
        assert!(trace.iterations[1].actions.is_empty());
    }

    #[test]
    fn test_action_for_unknown_iteration_dropped() {
        let mut tracer = RetrieveTracer::new(Uuid::new_v4(), "q");
        tracer.record_action(
            3,
            &Action::RetrieveKnowledge {
                query: "x".to_string(),
            },
            &RetrievalResult::default(),
        );
        assert!(tracer.finish().iterations.is_empty());
    }

    #[test]
    fn test_trace_serializes() {
        let mut tracer = RetrieveTracer::new(Uuid::nil(), "q");
        tracer.record_iteration(1, &EvaluationResult::default(), &ExplorationSnapshot::default());
        let json = serde_json::to_value(tracer.finish()).unwrap();
        assert_eq!(json["session_id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["iterations"][0]["iteration"], 1);
        assert!(json["meta_graph_phase"]["meta_graph"].is_null());
    }
}
