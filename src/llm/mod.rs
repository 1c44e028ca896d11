//! Text-completion boundary used for query planning and sufficiency checks.

pub mod json;
pub mod openai;

pub use json::{extract_json, parse_json_response};
pub use openai::OpenAiCompatibleGenerator;

use async_trait::async_trait;

use crate::error::Result;

/// A text-in, text-out completion capability.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}
