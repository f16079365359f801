use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::model::output::PhaseOutput;
use crate::model::phase::Phase;

/// A unit of retrieved text handed to extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ContextChunk {
    pub content: String,
    /// Opaque provenance (document, page, score, ...)
    #[serde(default)]
    #[schema(value_type = Object)]
    pub source_metadata: BTreeMap<String, Value>,
}

impl ContextChunk {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source_metadata: BTreeMap::new(),
        }
    }
}

/// Input to one analysis run
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub context_chunks: Vec<ContextChunk>,
    #[serde(default)]
    pub proposal_text: String,
    /// Phases to produce; empty means all of them
    #[serde(default)]
    pub requested_phases: Vec<Phase>,
    #[serde(default)]
    pub source_documents: Vec<String>,
    /// Outputs of earlier runs that satisfy prerequisite phases
    #[serde(default)]
    pub prior_outputs: Vec<PhaseOutput>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_metadata_keeps_value_types() {
        let request: AnalysisRequest = serde_json::from_str(
            r#"{"context_chunks":[{"content":"Traffic controller","source_metadata":{"page":4,"score":0.82,"ocr":false,"span":{"start":10}}}],"proposal_text":"x"}"#,
        )
        .unwrap();

        let metadata = &request.context_chunks[0].source_metadata;
        assert_eq!(metadata["page"], 4);
        assert_eq!(metadata["score"], 0.82);
        assert_eq!(metadata["ocr"], false);
        assert_eq!(metadata["span"]["start"], 10);
    }

    #[test]
    fn test_chunk_without_metadata() {
        let chunk: ContextChunk = serde_json::from_str(r#"{"content":"Signals"}"#).unwrap();
        assert_eq!(chunk, ContextChunk::new("Signals"));
    }
}
