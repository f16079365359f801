//! Retriever backed by an HTTP search endpoint

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::{ChunkRetriever, RetrieverError};
use crate::model::ContextChunk;
use crate::model::config::RetrieverConfig;

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    top_k: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    chunks: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(alias = "text")]
    content: String,
    #[serde(default, alias = "metadata")]
    source_metadata: BTreeMap<String, Value>,
}

impl From<SearchHit> for ContextChunk {
    fn from(hit: SearchHit) -> Self {
        ContextChunk {
            content: hit.content,
            source_metadata: hit.source_metadata,
        }
    }
}

/// POSTs `{query, top_k}` and expects `{chunks: [{content, source_metadata}]}`
pub struct HttpChunkRetriever {
    client: Client,
    endpoint: Url,
}

impl HttpChunkRetriever {
    pub fn new(config: &RetrieverConfig) -> Result<Self, RetrieverError> {
        let client = Client::builder()
            .user_agent("arcadia-trace/1.0")
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.url.clone(),
        })
    }
}

#[async_trait]
impl ChunkRetriever for HttpChunkRetriever {
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ContextChunk>, RetrieverError> {
        tracing::debug!(endpoint = %self.endpoint, top_k = top_k, "Querying chunk retriever");

        let response = self
            .client
            .post(self.endpoint.as_str())
            .json(&SearchRequest { query, top_k })
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(endpoint = %self.endpoint, "Chunk retriever rate limited");
            return Err(RetrieverError::RateLimited);
        }

        if response.status().is_server_error() {
            return Err(RetrieverError::Unavailable(format!(
                "HTTP {}: {}",
                response.status(),
                self.endpoint
            )));
        }

        if !response.status().is_success() {
            return Err(RetrieverError::ParseError(format!(
                "HTTP {}: {}",
                response.status(),
                self.endpoint
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| RetrieverError::ParseError(e.to_string()))?;

        Ok(body
            .chunks
            .into_iter()
            .take(top_k)
            .map(ContextChunk::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_hit_metadata_passed_through() {
        let body: SearchResponse = serde_json::from_str(
            r#"{"chunks": [{"text": "The controller switches lights", "metadata": {"doc": "req.pdf", "page": 4, "score": 0.82}}]}"#,
        )
        .unwrap();

        let chunk = ContextChunk::from(body.chunks.into_iter().next().unwrap());
        assert_eq!(chunk.content, "The controller switches lights");
        assert_eq!(chunk.source_metadata["doc"], "req.pdf");
        assert_eq!(chunk.source_metadata["page"], 4);
        assert_eq!(chunk.source_metadata["score"], 0.82);
    }

    #[test]
    fn test_new_keeps_configured_endpoint() {
        let config = RetrieverConfig {
            url: Url::parse("http://localhost:9200/search").unwrap(),
            timeout_secs: 5,
        };

        let retriever = HttpChunkRetriever::new(&config).unwrap();
        assert_eq!(retriever.endpoint.as_str(), "http://localhost:9200/search");
    }

    #[test]
    fn test_empty_response_body() {
        let body: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(body.chunks.is_empty());
    }
}
