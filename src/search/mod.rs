//! Iterative graph search: action model, evaluation, dispatch, tracing, and
//! the orchestrating loop.

pub mod action;
pub mod dispatcher;
pub mod evaluator;
pub mod orchestrator;
pub mod trace;

#[cfg(test)]
pub(crate) mod fakes;

pub use action::{Action, ActionRecord, EvaluationResult};
pub use dispatcher::{ActionDispatcher, ActionOutcome, InitialRetrieval, RetrievalParams};
pub use evaluator::{EvaluationRequest, LlmSufficiencyEvaluator, SufficiencyEvaluator};
pub use orchestrator::{GraphRetriever, RetrievalOutput, RetrieveOptions};
pub use trace::{RetrieveTracer, Trace};
