//! Session graph state: the planned target, the accumulated exploration
//! graph, and the pool of not-yet-judged candidates.

mod candidates;
mod exploration;
pub mod meta;

pub use candidates::CandidatePool;
pub use exploration::{
    ExplorationGraph, ExplorationSnapshot, PublicEntity, PublicGraph, PublicRelationship,
};
pub use meta::{
    MetaGraph, MetaGraphPlanner, PlanOutcome, PlannedEntity, PlannedRelationship, QueryPlanner,
};
