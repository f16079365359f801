//! Generative oracle abstraction and the OpenAI-backed client
//!
//! Extraction only needs "prompt in, text out". The trait keeps the pipeline
//! independent of the provider so tests can script responses.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::openai;

/// Environment variable for the extraction model
const ENV_EXTRACTION_MODEL: &str = "EXTRACTION_MODEL";

/// Default model for phase extraction
const DEFAULT_MODEL: &str = openai::GPT_4O_MINI;

/// Preamble shared by every extraction call
pub const EXTRACTION_PREAMBLE: &str = "You are a systems engineering analyst applying the Arcadia method. \
You read requirement excerpts and proposals and answer ONLY with a single JSON object \
matching the requested format. Do not add commentary before or after the JSON.";

/// Sampling options for one completion
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f64,
    pub max_tokens: Option<u64>,
}

#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum OracleError {
    #[error("Generative oracle unavailable: {0}")]
    Unavailable(String),

    #[error("Generative oracle timed out after {0:?}")]
    Timeout(Duration),
}

/// Text completion service used by the phase extractors
#[async_trait]
pub trait GenerativeOracle: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, OracleError>;

    /// Model identifier for logs and health reporting
    fn model(&self) -> &str;
}

/// Shared LLM client wrapper
#[derive(Clone)]
pub struct LlmClient {
    client: openai::Client,
    model: String,
    request_timeout: Duration,
}

impl LlmClient {
    /// Create a new LLM client with the provided API key
    ///
    /// The model comes from `EXTRACTION_MODEL` (defaults to gpt-4o-mini).
    pub fn new(api_key: &str, request_timeout: Duration) -> Result<Self, String> {
        let client = openai::Client::new(api_key)
            .map_err(|e| format!("Failed to create OpenAI client: {}", e))?;

        let model =
            std::env::var(ENV_EXTRACTION_MODEL).unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        tracing::info!(
            model = %model,
            timeout_secs = request_timeout.as_secs(),
            "Extraction LLM client initialized"
        );

        Ok(Self {
            client,
            model,
            request_timeout,
        })
    }
}

#[async_trait]
impl GenerativeOracle for LlmClient {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, OracleError> {
        let start_time = Instant::now();

        let mut builder = self
            .client
            .agent(&self.model)
            .preamble(EXTRACTION_PREAMBLE)
            .temperature(options.temperature);
        if let Some(max_tokens) = options.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }
        let agent = builder.build();

        match tokio::time::timeout(self.request_timeout, agent.prompt(prompt.to_string())).await {
            Ok(Ok(response)) => {
                tracing::info!(
                    model = %self.model,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    prompt_length = prompt.len(),
                    response_length = response.len(),
                    "OpenAI API call completed successfully"
                );
                Ok(response)
            }
            Ok(Err(e)) => {
                tracing::error!(
                    model = %self.model,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    prompt_length = prompt.len(),
                    error = %e,
                    "OpenAI API call failed"
                );
                Err(OracleError::Unavailable(e.to_string()))
            }
            Err(_) => {
                tracing::error!(
                    model = %self.model,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    prompt_length = prompt.len(),
                    "OpenAI API call timed out"
                );
                Err(OracleError::Timeout(self.request_timeout))
            }
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}
