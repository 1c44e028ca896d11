//! Pull JSON payloads out of free-form completion text.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{GraphSearchError, Result};

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)```").expect("valid fence pattern")
    })
}

/// Every top-level JSON object or array in `text`, in order of appearance.
/// Values nested inside an earlier match are not reported separately.
fn json_values(text: &str) -> Vec<Value> {
    let mut values = Vec::new();
    let mut resume = 0;
    for (start, c) in text.char_indices() {
        if start < resume || (c != '{' && c != '[') {
            continue;
        }
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            resume = start + stream.byte_offset();
            values.push(value);
        }
    }
    values
}

/// JSON candidates of a completion: fenced code blocks first, then the raw text.
fn candidates(text: &str) -> impl Iterator<Item = Value> + '_ {
    let fenced = fence_regex()
        .captures_iter(text)
        .filter_map(|cap| cap.get(1))
        .flat_map(|m| json_values(m.as_str()));
    fenced.chain(json_values(text))
}

/// Extract the first JSON object or array from a completion.
///
/// Fenced code blocks are tried first, then the raw text. Prose before and
/// after the JSON is ignored.
pub fn extract_json(text: &str) -> Option<Value> {
    candidates(text).next()
}

/// Extract and deserialize the JSON payload of a completion.
///
/// Returns the first candidate that deserializes into `T`, so stray JSON in
/// the prose (a `[1]` citation, say) does not hide the real payload.
pub fn parse_json_response<T: DeserializeOwned>(text: &str) -> Result<T> {
    let mut first_error = None;
    for value in candidates(text) {
        match serde_json::from_value(value) {
            Ok(parsed) => return Ok(parsed),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e.into()),
        None => Err(GraphSearchError::Llm(format!(
            "No JSON found in response: {}",
            text.chars().take(200).collect::<String>()
        ))),
    }
}
