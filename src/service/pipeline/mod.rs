//! Analysis orchestration
//!
//! A run extracts phases in dependency order (operational, system, logical,
//! physical) up to the latest requested phase. Prerequisite phases are
//! extracted in the same run unless the request supplies them. Once extraction
//! stops, traceability is computed over every phase output of the run.

mod error;

use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::model::config::PipelineConfig;
use crate::model::{
    AnalysisRequest, ConfigError, ContextChunk, Phase, PhaseOutput, RunMetadata,
    StructuredResult,
};
use crate::retriever::ChunkRetriever;
use crate::service::extraction::validation::validate_phase_output;
use crate::service::extraction::{ExtractionInput, PhaseExtractor};
use crate::service::llm::GenerativeOracle;
use crate::service::traceability::TraceabilityEngine;

pub use error::PipelineError;

/// Characters of the proposal appended to retrieval queries
const QUERY_PROPOSAL_CHARS: usize = 200;

/// Phases a run has to produce for the requested ones, in extraction order
///
/// An empty request means every phase.
pub fn plan_phases(requested: &[Phase]) -> Vec<Phase> {
    match requested.iter().max() {
        Some(last) => last.prerequisites().chain([*last]).collect(),
        None => Phase::ALL.to_vec(),
    }
}

/// Orchestrates extraction and traceability for one analysis request
pub struct AnalysisPipeline {
    extractor: PhaseExtractor,
    traceability: TraceabilityEngine,
    retriever: Option<Arc<dyn ChunkRetriever>>,
}

impl AnalysisPipeline {
    pub fn new(
        oracle: Arc<dyn GenerativeOracle>,
        config: PipelineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            extractor: PhaseExtractor::new(oracle, config.extraction),
            traceability: TraceabilityEngine::new(config.traceability),
            retriever: None,
        })
    }

    /// Widen phase context windows with chunks from `retriever`
    pub fn with_retriever(mut self, retriever: Arc<dyn ChunkRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn has_retriever(&self) -> bool {
        self.retriever.is_some()
    }

    /// Run an analysis
    ///
    /// Cancellation stops the run between phases and categories; the result
    /// then holds the completed work with `partial` set.
    pub async fn run(
        &self,
        request: AnalysisRequest,
        cancel: &CancellationToken,
    ) -> Result<StructuredResult, PipelineError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = Instant::now();

        let mut requested = if request.requested_phases.is_empty() {
            Phase::ALL.to_vec()
        } else {
            request.requested_phases.clone()
        };
        requested.sort();
        requested.dedup();
        let plan = plan_phases(&requested);

        let mut supplied = supplied_outputs(request.prior_outputs)?;

        tracing::info!(
            run_id = %run_id,
            requested = ?requested,
            plan = ?plan,
            supplied = ?supplied.keys().collect::<Vec<_>>(),
            context_chunks = request.context_chunks.len(),
            "Starting analysis run"
        );

        let mut outputs: BTreeMap<Phase, PhaseOutput> = BTreeMap::new();
        let mut completed_phases = Vec::new();
        let mut supplied_phases = Vec::new();
        let mut phase_duration_ms = BTreeMap::new();
        let mut partial = false;

        for phase in plan {
            if let Some(output) = supplied.remove(&phase) {
                tracing::debug!(run_id = %run_id, phase = %phase, "Using supplied phase output");
                outputs.insert(phase, output);
                supplied_phases.push(phase);
                continue;
            }

            if cancel.is_cancelled() {
                tracing::warn!(run_id = %run_id, phase = %phase, "Run cancelled before phase");
                partial = true;
                break;
            }

            let phase_started = Instant::now();
            let chunks = self
                .phase_chunks(phase, &request.context_chunks, &request.proposal_text)
                .await?;
            let input = ExtractionInput {
                chunks: &chunks,
                proposal_text: &request.proposal_text,
                provided_chunks: request.context_chunks.len(),
            };

            let prior: Vec<&PhaseOutput> = outputs.values().collect();
            let output = self
                .extractor
                .extract(phase, &input, &prior, cancel)
                .await
                .map_err(|source| PipelineError::PhaseFailed { phase, source })?;

            phase_duration_ms.insert(
                phase.to_string(),
                phase_started.elapsed().as_millis() as u64,
            );
            if output.is_empty() {
                tracing::warn!(run_id = %run_id, phase = %phase, "Phase produced no entities");
            }
            if output.metadata.partial {
                partial = true;
            } else {
                completed_phases.push(phase);
            }
            outputs.insert(phase, output);
        }

        for phase in supplied.keys() {
            tracing::warn!(
                run_id = %run_id,
                phase = %phase,
                "Ignoring supplied output for a phase outside the plan"
            );
        }

        let report = self.traceability.compute(&outputs);

        let phase_confidence = outputs
            .iter()
            .map(|(phase, output)| (phase.to_string(), output.metadata.confidence))
            .collect();
        let total_entities = outputs.values().map(PhaseOutput::entity_count).sum();

        let mut result = StructuredResult {
            run: RunMetadata {
                run_id,
                started_at,
                completed_at: Utc::now(),
                duration_ms: started.elapsed().as_millis() as u64,
                requested_phases: requested,
                completed_phases,
                supplied_phases,
                source_documents: request.source_documents,
                phase_duration_ms,
                phase_confidence,
                total_entities,
                service_version: env!("CARGO_PKG_VERSION").to_string(),
            },
            operational: None,
            system: None,
            logical: None,
            physical: None,
            traceability_links: report.links,
            gaps: report.gaps,
            quality_metrics: report.metrics,
            consistency_checks: report.consistency_checks,
            impact_analysis: report.impact_analysis,
            partial,
        };
        for (phase, output) in outputs {
            *result.phase_slot(phase) = Some(output);
        }

        tracing::info!(
            run_id = %run_id,
            elapsed_ms = result.run.duration_ms,
            total_entities = result.run.total_entities,
            links = result.traceability_links.len(),
            gaps = result.gaps.len(),
            partial = result.partial,
            "Analysis run completed"
        );

        Ok(result)
    }

    /// Provided chunks, topped up with retrieved ones when the window has room
    async fn phase_chunks<'a>(
        &self,
        phase: Phase,
        provided: &'a [ContextChunk],
        proposal: &str,
    ) -> Result<Cow<'a, [ContextChunk]>, PipelineError> {
        let config = self.extractor.config();
        let needed = config.max_context_chunks.saturating_sub(provided.len());
        let Some(retriever) = self.retriever.as_ref().filter(|_| needed > 0) else {
            return Ok(Cow::Borrowed(provided));
        };

        let query = retrieval_query(phase, proposal);
        let start_time = Instant::now();
        let retrieved = retriever
            .retrieve(&query, config.retrieval_top_k.max(needed))
            .await
            .map_err(|source| {
                tracing::error!(phase = %phase, error = %source, "Chunk retrieval failed");
                PipelineError::RetrievalUnavailable { phase, source }
            })?;

        let mut seen: HashSet<String> = provided.iter().map(|c| c.content.clone()).collect();
        let mut chunks = provided.to_vec();
        for chunk in retrieved {
            if chunks.len() - provided.len() >= needed {
                break;
            }
            if chunk.content.trim().is_empty() || !seen.insert(chunk.content.clone()) {
                continue;
            }
            chunks.push(chunk);
        }

        tracing::debug!(
            phase = %phase,
            elapsed_ms = start_time.elapsed().as_millis(),
            retrieved = chunks.len() - provided.len(),
            "Context window topped up with retrieved chunks"
        );

        Ok(Cow::Owned(chunks))
    }
}

/// Retrieval query for a phase: its keywords plus the head of the proposal
fn retrieval_query(phase: Phase, proposal: &str) -> String {
    let head: String = proposal.chars().take(QUERY_PROPOSAL_CHARS).collect();
    format!("{} {}", phase.keywords().join(" "), head.trim())
        .trim()
        .to_string()
}

/// Validate supplied phase outputs and index them by phase
fn supplied_outputs(
    prior_outputs: Vec<PhaseOutput>,
) -> Result<BTreeMap<Phase, PhaseOutput>, PipelineError> {
    let mut supplied = BTreeMap::new();

    for output in prior_outputs {
        let phase = output.phase;
        let validation = validate_phase_output(&output);
        if !validation.is_valid {
            return Err(PipelineError::InvalidPriorOutput {
                phase,
                message: validation.errors.join("; "),
            });
        }
        if supplied.insert(phase, output).is_some() {
            return Err(PipelineError::InvalidPriorOutput {
                phase,
                message: "phase supplied more than once".to_string(),
            });
        }
    }

    Ok(supplied)
}
