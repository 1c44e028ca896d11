//! Concurrent execution of retrieval actions against the knowledge service.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};

use super::action::Action;
use crate::error::{GraphSearchError, Result};
use crate::knowledge::{KnowledgeClient, RetrievalResult};

/// Parameters shared by every call in a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalParams {
    pub top_k: usize,
    pub similarity_threshold: f32,
    pub max_depth: usize,
}

/// An action paired with what it retrieved. Failed actions carry an empty result.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub action: Action,
    pub result: RetrievalResult,
}

/// Result of one initial sub-query.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialRetrieval {
    pub query: String,
    pub result: RetrievalResult,
}

/// Runs batches of actions with at most `concurrency` calls in flight.
///
/// Workers only return values; merging is left to the caller once the
/// whole batch has completed.
pub struct ActionDispatcher {
    client: Arc<dyn KnowledgeClient>,
    concurrency: usize,
}

impl ActionDispatcher {
    pub fn new(client: Arc<dyn KnowledgeClient>, concurrency: usize) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
        }
    }

    async fn execute(&self, action: &Action, params: RetrievalParams) -> Result<RetrievalResult> {
        match action {
            Action::RetrieveKnowledge { query } => {
                self.client
                    .retrieve_knowledge(query, params.top_k, params.similarity_threshold)
                    .await
            }
            Action::RetrieveNeighbors { entity_ids, query } => {
                self.client
                    .retrieve_neighbors(
                        entity_ids,
                        query,
                        params.max_depth,
                        params.top_k,
                        params.similarity_threshold,
                    )
                    .await
            }
            Action::Unsupported => Err(GraphSearchError::InvalidInput(
                "unsupported retrieval tool".to_string(),
            )),
        }
    }

    /// Execute every action. A failing action is logged and yields an empty
    /// result; the batch itself never fails. Outcome order is unspecified.
    pub async fn dispatch(&self, actions: Vec<Action>, params: RetrievalParams) -> Vec<ActionOutcome> {
        stream::iter(actions)
            .map(|action| async move {
                let result = match self.execute(&action, params).await {
                    Ok(result) => result,
                    Err(e) => {
                        log::warn!("Error processing action {}: {}", action, e);
                        RetrievalResult::default()
                    }
                };
                ActionOutcome { action, result }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }

    /// Run one similarity search per initial sub-query. Failing sub-queries
    /// are logged and skipped.
    pub async fn retrieve_initial(
        &self,
        queries: &[String],
        params: RetrievalParams,
    ) -> Vec<InitialRetrieval> {
        stream::iter(queries)
            .map(|query| async move {
                match self
                    .client
                    .retrieve_knowledge(query, params.top_k, params.similarity_threshold)
                    .await
                {
                    Ok(result) => Some(InitialRetrieval {
                        query: query.clone(),
                        result,
                    }),
                    Err(e) => {
                        log::error!("Error retrieving knowledge for query {}: {}", query, e);
                        None
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .filter_map(|r| async move { r })
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::Chunk;
    use crate::search::fakes::FakeKnowledgeClient;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const PARAMS: RetrievalParams = RetrievalParams {
        top_k: 10,
        similarity_threshold: 0.5,
        max_depth: 2,
    };

    fn knowledge(query: &str) -> Action {
        Action::RetrieveKnowledge {
            query: query.to_string(),
        }
    }

    #[tokio::test]
    async fn test_dispatch_routes_each_tool() {
        let client = FakeKnowledgeClient::new()
            .with_knowledge("k", vec![(1, "a")], vec![])
            .with_neighbors("n", vec![(2, "b")], vec![(10, 1, 2)]);
        let calls = client.calls();
        let dispatcher = ActionDispatcher::new(Arc::new(client), 5);

        let mut outcomes = dispatcher
            .dispatch(
                vec![
                    knowledge("k"),
                    Action::RetrieveNeighbors {
                        entity_ids: vec![1],
                        query: "n".to_string(),
                    },
                ],
                PARAMS,
            )
            .await;
        outcomes.sort_by_key(|o| o.result.entities[0].id);

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].result.entities[0].id, 1);
        assert_eq!(outcomes[1].result.relationships[0].id, 10);

        let neighbor_calls = calls.neighbor_calls();
        assert_eq!(neighbor_calls.len(), 1);
        assert_eq!(neighbor_calls[0].entity_ids, vec![1]);
        assert_eq!(neighbor_calls[0].max_depth, 2);
        assert_eq!(neighbor_calls[0].max_neighbors, 10);
    }

    #[tokio::test]
    async fn test_all_failures_yield_empty_results() {
        let client = FakeKnowledgeClient::new().fail_all();
        let dispatcher = ActionDispatcher::new(Arc::new(client), 5);

        let outcomes = dispatcher
            .dispatch(
                vec![
                    knowledge("a"),
                    Action::RetrieveNeighbors {
                        entity_ids: vec![1],
                        query: "b".to_string(),
                    },
                ],
                PARAMS,
            )
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.result.is_empty()));
    }

    #[tokio::test]
    async fn test_unsupported_action_yields_empty_without_calls() {
        let client = FakeKnowledgeClient::new();
        let calls = client.calls();
        let dispatcher = ActionDispatcher::new(Arc::new(client), 5);

        let outcomes = dispatcher.dispatch(vec![Action::Unsupported], PARAMS).await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].action, Action::Unsupported);
        assert!(outcomes[0].result.is_empty());
        assert!(calls.knowledge_queries().is_empty());
        assert!(calls.neighbor_calls().is_empty());
    }

    #[tokio::test]
    async fn test_initial_retrieval_skips_failures() {
        let client = FakeKnowledgeClient::new()
            .with_knowledge("good", vec![(1, "a")], vec![])
            .failing_knowledge("bad");
        let dispatcher = ActionDispatcher::new(Arc::new(client), 5);

        let retrievals = dispatcher
            .retrieve_initial(&["good".to_string(), "bad".to_string()], PARAMS)
            .await;

        assert_eq!(retrievals.len(), 1);
        assert_eq!(retrievals[0].query, "good");
    }

    /// Tracks the peak number of concurrent calls.
    struct ConcurrencyProbe {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl KnowledgeClient for ConcurrencyProbe {
        async fn retrieve_knowledge(&self, _: &str, _: usize, _: f32) -> Result<RetrievalResult> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(RetrievalResult::default())
        }

        async fn retrieve_neighbors(
            &self,
            _: &[i64],
            _: &str,
            _: usize,
            _: usize,
            _: f32,
        ) -> Result<RetrievalResult> {
            Ok(RetrievalResult::default())
        }

        async fn retrieve_chunks(&self, _: &[i64]) -> Result<Vec<Chunk>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let probe = Arc::new(ConcurrencyProbe {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let dispatcher = ActionDispatcher::new(probe.clone(), 2);

        let actions = (0..6).map(|i| knowledge(&format!("q{}", i))).collect();
        let outcomes = dispatcher.dispatch(actions, PARAMS).await;

        assert_eq!(outcomes.len(), 6);
        let peak = probe.peak.load(Ordering::SeqCst);
        assert!(peak <= 2, "peak concurrency was {}", peak);
        assert!(peak >= 1);
    }
}
