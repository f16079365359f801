//! Error types for phase extraction

use thiserror::Error;

use crate::model::{EntityCategory, Phase};

/// Error type for phase extraction
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExtractionError {
    /// Every oracle call of the phase failed
    #[error("Generative oracle unavailable during {phase} extraction: {message}")]
    OracleUnavailable { phase: Phase, message: String },
}

/// An extracted item lacked data required to build an entity
#[derive(Debug, Clone, Error)]
#[error("{category} item rejected: {reason}")]
pub struct PartialEntityData {
    pub category: EntityCategory,
    pub reason: String,
}

impl PartialEntityData {
    pub fn new(category: EntityCategory, reason: impl Into<String>) -> Self {
        Self {
            category,
            reason: reason.into(),
        }
    }
}
