//! Retrieval actions and evaluation verdicts exchanged with the evaluator.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A retrieval instruction issued by the evaluator.
///
/// The wire form is tagged by `tool`. Tags other than the two supported
/// tools parse as [`Action::Unsupported`], which the dispatcher rejects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum Action {
    /// Similarity search for information not yet in the graph.
    RetrieveKnowledge { query: String },
    /// Expand around entities already in the exploration graph.
    RetrieveNeighbors {
        #[serde(alias = "entities_ids")]
        entity_ids: Vec<i64>,
        query: String,
    },
    #[serde(other)]
    Unsupported,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::RetrieveKnowledge { query } => write!(f, "retrieve_knowledge({:?})", query),
            Action::RetrieveNeighbors { entity_ids, query } => {
                write!(f, "retrieve_neighbors({:?}, {:?})", entity_ids, query)
            }
            Action::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// One entry of a session's action history: an initial sub-query from
/// planning, or an action dispatched later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionRecord {
    Query(String),
    Action(Action),
}

/// Verdict of one evaluation round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    #[serde(default)]
    pub useful_entity_ids: BTreeSet<i64>,
    #[serde(default)]
    pub useful_relationship_ids: BTreeSet<i64>,
    #[serde(default)]
    pub is_sufficient: bool,
    #[serde(default)]
    pub missing_information: Vec<String>,
    #[serde(default)]
    pub next_actions: Vec<Action>,
}
