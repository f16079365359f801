pub mod extraction;
pub mod llm;
pub mod parser;
pub mod pipeline;
pub mod traceability;

pub use llm::{GenerativeOracle, LlmClient};
pub use pipeline::{AnalysisPipeline, PipelineError};
