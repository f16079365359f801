//! Chunk retrieval oracle used to widen a phase's context window

mod http;

use async_trait::async_trait;

use crate::model::ContextChunk;

pub use http::HttpChunkRetriever;

#[derive(Debug, thiserror::Error)]
pub enum RetrieverError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Retriever unavailable: {0}")]
    Unavailable(String),
}

/// Source of context chunks relevant to a free-text query
#[async_trait]
pub trait ChunkRetriever: Send + Sync {
    /// Return up to `top_k` chunks, most relevant first
    async fn retrieve(&self, query: &str, top_k: usize)
    -> Result<Vec<ContextChunk>, RetrieverError>;
}
