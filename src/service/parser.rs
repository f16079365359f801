//! Recovery of JSON payloads from free-form oracle output

use regex::Regex;
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("no JSON object found in response")]
    NoJsonObject,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),
}

/// Extracts the outermost `{ ... }` span of a response and decodes it
pub struct ResponseParser {
    object_span: Regex,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            // Greedy: from the first '{' to the last '}' across lines
            object_span: Regex::new(r"(?s)\{.*\}").unwrap(),
        }
    }

    /// Decode the JSON object embedded in `raw`
    pub fn parse_object(&self, raw: &str) -> Result<Map<String, Value>, ParseError> {
        let span = self
            .object_span
            .find(raw)
            .ok_or(ParseError::NoJsonObject)?;

        match serde_json::from_str::<Value>(span.as_str()) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ParseError::NoJsonObject),
            Err(e) => Err(ParseError::InvalidJson(e.to_string())),
        }
    }
}

/// Pull the list stored under `key` out of a decoded response object
pub fn take_items(mut object: Map<String, Value>, key: &str) -> Vec<Value> {
    match object.remove(key) {
        Some(Value::Array(items)) => items,
        Some(item @ Value::Object(_)) => vec![item],
        _ => Vec::new(),
    }
}
