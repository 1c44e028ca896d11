pub mod cache;
pub mod config;
pub mod error;
pub mod graph;
pub mod knowledge;
pub mod llm;
pub mod search;

pub use config::Config;
pub use error::{GraphSearchError, Result};
pub use search::{GraphRetriever, RetrievalOutput, RetrieveOptions};
