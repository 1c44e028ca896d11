use thiserror::Error;

/// HTTP statuses that are worth retrying (rate limit and transient server errors)
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Main error type for kgsearch
#[derive(Error, Debug)]
pub enum GraphSearchError {
    /// Transport-level HTTP failures (connect, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote service answered with a non-success status
    #[error("{endpoint} returned status {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// JSON encoding/decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Text-completion service errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Sufficiency evaluation failed; fatal for the retrieval session
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl GraphSearchError {
    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            GraphSearchError::Status { status, .. } => RETRYABLE_STATUSES.contains(status),
            GraphSearchError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Convenient Result type using GraphSearchError
pub type Result<T> = std::result::Result<T, GraphSearchError>;
