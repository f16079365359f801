//! Application state and service initialization
//!
//! This module centralizes service construction and dependency injection so
//! handlers only see ready-to-use shared state.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::model::{Config, ConfigError};
use crate::retriever::HttpChunkRetriever;
use crate::service::{AnalysisPipeline, GenerativeOracle, LlmClient};

/// Application state shared by every worker
pub struct AppState {
    /// Extraction and traceability pipeline
    pub pipeline: Arc<AnalysisPipeline>,
    /// Bounds the number of analysis runs in flight
    pub run_limiter: Arc<Semaphore>,
    /// Cancelled when the server shuts down; every run gets a child token
    pub shutdown: CancellationToken,
    /// Model identifier reported by the readiness probe
    pub oracle_model: String,
}

impl AppState {
    /// Initialize all services and build application state
    ///
    /// This performs:
    /// 1. LLM client initialization (requires OPENAI_API_KEY)
    /// 2. Optional chunk retriever initialization
    /// 3. Pipeline construction and configuration validation
    pub fn new(config: &Config, shutdown: CancellationToken) -> Result<Self, AppError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| AppError::MissingConfig("OPENAI_API_KEY"))?;

        let llm_client = LlmClient::new(&api_key, config.oracle.request_timeout())
            .map_err(|_| AppError::InvalidConfig("Invalid OPENAI_API_KEY"))?;
        let oracle: Arc<dyn GenerativeOracle> = Arc::new(llm_client);

        let mut pipeline = AnalysisPipeline::new(Arc::clone(&oracle), config.pipeline.clone())?;

        match &config.retriever {
            Some(retriever_config) => {
                tracing::info!(url = %retriever_config.url, "Chunk retriever enabled");
                let retriever = HttpChunkRetriever::new(retriever_config)
                    .map_err(|_| AppError::InvalidConfig("Failed to build chunk retriever client"))?;
                pipeline = pipeline.with_retriever(Arc::new(retriever));
            }
            None => tracing::info!("No chunk retriever configured, using provided chunks only"),
        }

        Ok(Self::with_pipeline(
            pipeline,
            oracle.model().to_string(),
            config.server.max_concurrent_runs,
            shutdown,
        ))
    }

    /// Build state around an already constructed pipeline
    pub fn with_pipeline(
        pipeline: AnalysisPipeline,
        oracle_model: String,
        max_concurrent_runs: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            run_limiter: Arc::new(Semaphore::new(max_concurrent_runs)),
            shutdown,
            oracle_model,
        }
    }
}

/// Application-level errors
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AppError {
    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingConfig(&'static str),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// Configuration rejected by validation
    #[error(transparent)]
    Config(#[from] ConfigError),
}
