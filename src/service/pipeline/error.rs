//! Error types for analysis runs

use thiserror::Error;

use crate::model::Phase;
use crate::retriever::RetrieverError;
use crate::service::extraction::ExtractionError;

/// Run-level failure of an analysis
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// A phase could not be extracted because the oracle was unreachable
    #[error("Phase {phase} failed: {source}")]
    PhaseFailed {
        phase: Phase,
        #[source]
        source: ExtractionError,
    },

    /// The chunk retrieval backend could not be reached
    #[error("Chunk retrieval unavailable for {phase} phase: {source}")]
    RetrievalUnavailable {
        phase: Phase,
        #[source]
        source: RetrieverError,
    },

    /// A pre-supplied phase output was rejected
    #[error("Invalid prior output for {phase} phase: {message}")]
    InvalidPriorOutput { phase: Phase, message: String },
}

impl PipelineError {
    /// Whether the failure is caused by an external backend
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            PipelineError::PhaseFailed { .. } | PipelineError::RetrievalUnavailable { .. }
        )
    }
}
