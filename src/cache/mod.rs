pub mod retrieval_cache;

pub use retrieval_cache::{RetrievalCache, RetrievalKey};
