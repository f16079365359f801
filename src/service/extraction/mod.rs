//! Phase extraction service using a generative oracle
//!
//! Each phase is extracted one entity category at a time. A category is one
//! oracle request: the prompt carries a bounded window of context chunks, the
//! proposal, a summary of earlier phases and the names already extracted in
//! this phase. Responses are parsed leniently; items missing required data are
//! dropped and counted, and every surviving item gets the next sequential id.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::model::config::ExtractionConfig;
use crate::model::{
    CategoryStatus, ChunkOrigin, ChunkRef, ContextChunk, EntityCategory, Phase, PhaseOutput,
    entity_id,
};
use crate::service::llm::{CompletionOptions, GenerativeOracle};
use crate::service::parser::{ResponseParser, take_items};

pub mod architecture;
pub mod confidence;
pub mod converters;
pub mod error;
pub mod operational;
pub mod prompts;
pub mod validation;

pub use error::{ExtractionError, PartialEntityData};

use confidence::{acceptance_ratio, category_confidence, phase_confidence};
use prompts::{build_context_block, build_prior_context, truncate_chars};
use validation::validate_phase_output;

/// Text a phase is extracted from
#[derive(Debug, Clone, Copy)]
pub struct ExtractionInput<'a> {
    pub chunks: &'a [ContextChunk],
    pub proposal_text: &'a str,
    /// Leading chunks that came with the request; later ones were retrieved
    pub provided_chunks: usize,
}

#[cfg(test)]
impl<'a> ExtractionInput<'a> {
    /// Input made only of provided chunks
    pub fn new(chunks: &'a [ContextChunk], proposal_text: &'a str) -> Self {
        Self {
            chunks,
            proposal_text,
            provided_chunks: chunks.len(),
        }
    }
}

/// Prompt sections shared by every category of a phase
pub(crate) struct PhaseContext {
    pub context: String,
    pub proposal: String,
    pub prior: String,
    pub window: Vec<usize>,
    pub context_chars: usize,
}

/// Outcome of extracting one category
pub(crate) struct CategoryRun<T> {
    pub entities: Vec<T>,
    pub status: CategoryStatus,
    pub attempts: u32,
    pub rejected: usize,
    pub last_error: Option<String>,
}

impl<T> CategoryRun<T> {
    fn skipped() -> Self {
        Self {
            entities: Vec::new(),
            status: CategoryStatus::Skipped,
            attempts: 0,
            rejected: 0,
            last_error: None,
        }
    }
}

/// Result of one parsed response
struct Attempt<T> {
    entities: Vec<T>,
    rejected: usize,
}

/// Extracts the four Arcadia phases from text
pub struct PhaseExtractor {
    oracle: Arc<dyn GenerativeOracle>,
    parser: ResponseParser,
    config: ExtractionConfig,
}

impl PhaseExtractor {
    pub fn new(oracle: Arc<dyn GenerativeOracle>, config: ExtractionConfig) -> Self {
        tracing::info!(
            model = %oracle.model(),
            max_context_chunks = config.max_context_chunks,
            max_attempts = config.max_attempts,
            "Phase extractor initialized"
        );

        Self {
            oracle,
            parser: ResponseParser::new(),
            config,
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract `phase`, given the outputs of the phases before it
    pub async fn extract(
        &self,
        phase: Phase,
        input: &ExtractionInput<'_>,
        prior: &[&PhaseOutput],
        cancel: &CancellationToken,
    ) -> Result<PhaseOutput, ExtractionError> {
        let find = |p: Phase| prior.iter().copied().find(|o| o.phase == p);
        match phase {
            Phase::Operational => self.extract_operational(input, cancel).await,
            Phase::System => {
                self.extract_system(input, find(Phase::Operational), cancel)
                    .await
            }
            Phase::Logical => {
                self.extract_logical(
                    input,
                    find(Phase::Operational),
                    find(Phase::System),
                    cancel,
                )
                .await
            }
            Phase::Physical => {
                self.extract_physical(
                    input,
                    find(Phase::Operational),
                    find(Phase::System),
                    find(Phase::Logical),
                    cancel,
                )
                .await
            }
        }
    }

    /// Build the shared prompt sections for a phase
    pub(crate) fn phase_context(
        &self,
        input: &ExtractionInput<'_>,
        prior: &[&PhaseOutput],
    ) -> PhaseContext {
        let window: Vec<usize> = (0..input.chunks.len())
            .take(self.config.max_context_chunks)
            .collect();
        let context = build_context_block(input.chunks, &window, self.config.chunk_char_limit);
        let proposal = truncate_chars(input.proposal_text, self.config.proposal_char_limit);

        let context_chars = window
            .iter()
            .map(|&i| input.chunks[i].content.chars().count().min(self.config.chunk_char_limit))
            .sum::<usize>()
            + proposal.chars().count();

        PhaseContext {
            context,
            proposal,
            prior: build_prior_context(prior, self.config.summary_limit),
            window,
            context_chars,
        }
    }

    /// Names of already extracted entities, capped for the prompt
    pub(crate) fn known_names<'a, I>(&self, names: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names.into_iter().take(self.config.max_known_names).collect()
    }

    /// Run one category: call the oracle, parse, convert, retry on low quality
    ///
    /// Retries happen on oracle errors, on unparseable output and when fewer
    /// than `min_acceptance_ratio` of the parsed items could be converted. The
    /// attempt with the most accepted items is kept.
    pub(crate) async fn run_category<T, F>(
        &self,
        phase: Phase,
        category: EntityCategory,
        prompt: &str,
        refs: &[usize],
        cancel: &CancellationToken,
        convert: F,
    ) -> CategoryRun<T>
    where
        F: Fn(Value, String, &[usize]) -> Result<T, PartialEntityData>,
    {
        if cancel.is_cancelled() {
            tracing::info!(phase = %phase, category = %category, "Skipping category, run cancelled");
            return CategoryRun::skipped();
        }

        let options = CompletionOptions {
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut best: Option<Attempt<T>> = None;
        let mut last_error = None;
        let mut responded = false;
        let mut attempts = 0;

        for attempt in 0..self.config.max_attempts {
            if attempt > 0 {
                let delay = std::time::Duration::from_millis(
                    self.config.retry_base_delay_ms * (1u64 << (attempt - 1).min(16)),
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => break,
                }
            }
            attempts += 1;

            let start_time = Instant::now();
            tracing::debug!(
                phase = %phase,
                category = %category,
                attempt = attempts,
                prompt_length = prompt.len(),
                "Requesting category extraction"
            );

            let raw = match self.oracle.complete(prompt, &options).await {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::error!(
                        phase = %phase,
                        category = %category,
                        attempt = attempts,
                        elapsed_ms = start_time.elapsed().as_millis(),
                        error = %e,
                        "Oracle call failed"
                    );
                    last_error = Some(e.to_string());
                    continue;
                }
            };
            responded = true;

            let object = match self.parser.parse_object(&raw) {
                Ok(object) => object,
                Err(e) => {
                    tracing::warn!(
                        phase = %phase,
                        category = %category,
                        attempt = attempts,
                        error = %e,
                        response_length = raw.len(),
                        "Malformed oracle response"
                    );
                    continue;
                }
            };

            let outcome = convert_items(phase, category, take_items(object, category.key()), refs, &convert);
            let ratio = acceptance_ratio(outcome.entities.len(), outcome.rejected);

            tracing::info!(
                phase = %phase,
                category = %category,
                attempt = attempts,
                elapsed_ms = start_time.elapsed().as_millis(),
                accepted = outcome.entities.len(),
                rejected = outcome.rejected,
                "Category extraction completed"
            );

            let better = best
                .as_ref()
                .is_none_or(|b| outcome.entities.len() > b.entities.len());
            if better {
                best = Some(outcome);
            }

            if ratio >= self.config.min_acceptance_ratio {
                break;
            }
            tracing::warn!(
                phase = %phase,
                category = %category,
                acceptance_ratio = ratio,
                "Acceptance ratio below threshold"
            );
        }

        match best {
            Some(attempt) => CategoryRun {
                entities: attempt.entities,
                status: CategoryStatus::Completed,
                attempts,
                rejected: attempt.rejected,
                last_error,
            },
            None => CategoryRun {
                entities: Vec::new(),
                status: if responded {
                    CategoryStatus::Malformed
                } else if attempts == 0 {
                    CategoryStatus::Skipped
                } else {
                    CategoryStatus::Failed
                },
                attempts,
                rejected: 0,
                last_error,
            },
        }
    }
}

/// Convert parsed items, numbering accepted ones without gaps
fn convert_items<T, F>(
    phase: Phase,
    category: EntityCategory,
    items: Vec<Value>,
    refs: &[usize],
    convert: &F,
) -> Attempt<T>
where
    F: Fn(Value, String, &[usize]) -> Result<T, PartialEntityData>,
{
    let mut entities = Vec::with_capacity(items.len());
    let mut rejected = 0;

    for (index, item) in items.into_iter().enumerate() {
        let id = entity_id(phase, category, entities.len() + 1);
        match convert(item, id, refs) {
            Ok(entity) => entities.push(entity),
            Err(e) => {
                rejected += 1;
                tracing::warn!(
                    phase = %phase,
                    category = %category,
                    item_index = index,
                    reason = %e.reason,
                    "Rejected extracted item"
                );
            }
        }
    }

    Attempt { entities, rejected }
}

/// Collects per-category bookkeeping into phase metadata
pub(crate) struct PhaseRecorder {
    phase: Phase,
    started: Instant,
    context_chars: usize,
    expected_entities: usize,
    attempted: usize,
    failed: usize,
    skipped: bool,
    last_error: Option<String>,
    output: PhaseOutput,
}

impl PhaseRecorder {
    pub fn new(
        phase: Phase,
        context: &PhaseContext,
        input: &ExtractionInput<'_>,
        config: &ExtractionConfig,
    ) -> Self {
        let mut output = PhaseOutput::new(phase);
        output.metadata.extracted_at = Utc::now();
        output.metadata.context_window = context
            .window
            .iter()
            .map(|&index| ChunkRef {
                index,
                origin: if index < input.provided_chunks {
                    ChunkOrigin::Provided
                } else {
                    ChunkOrigin::Retrieved
                },
            })
            .collect();

        tracing::info!(
            phase = %phase,
            window = context.window.len(),
            context_chars = context.context_chars,
            "Starting phase extraction"
        );

        Self {
            phase,
            started: Instant::now(),
            context_chars: context.context_chars,
            expected_entities: config.expected_entities_per_category,
            attempted: 0,
            failed: 0,
            skipped: false,
            last_error: None,
            output,
        }
    }

    /// Record a category run and hand back its entities
    pub fn record<T>(&mut self, category: EntityCategory, run: CategoryRun<T>) -> Vec<T> {
        let key = category.key().to_string();
        let metadata = &mut self.output.metadata;

        metadata.oracle_calls += run.attempts;
        metadata.category_status.insert(key.clone(), run.status);

        match run.status {
            CategoryStatus::Skipped => {
                self.skipped = true;
                return Vec::new();
            }
            CategoryStatus::Failed => {
                self.attempted += 1;
                self.failed += 1;
                self.last_error = run.last_error;
            }
            CategoryStatus::Completed | CategoryStatus::Malformed => {
                self.attempted += 1;
            }
        }

        metadata.category_counts.insert(key.clone(), run.entities.len());
        metadata.rejected_items.insert(key.clone(), run.rejected);
        metadata.category_confidence.insert(
            key,
            category_confidence(
                run.entities.len(),
                run.rejected,
                self.context_chars,
                self.expected_entities,
            ),
        );

        run.entities
    }

    pub fn output_mut(&mut self) -> &mut PhaseOutput {
        &mut self.output
    }

    /// Finalize metadata, or fail when every attempted category failed
    pub fn finish(self) -> Result<PhaseOutput, ExtractionError> {
        let mut output = self.output;

        if self.attempted > 0 && self.failed == self.attempted {
            tracing::error!(
                phase = %self.phase,
                failed_categories = self.failed,
                "Every category of the phase failed"
            );
            return Err(ExtractionError::OracleUnavailable {
                phase: self.phase,
                message: self
                    .last_error
                    .unwrap_or_else(|| "no oracle response".to_string()),
            });
        }

        output.metadata.duration_ms = self.started.elapsed().as_millis() as u64;
        output.metadata.partial = self.skipped;
        output.metadata.confidence =
            phase_confidence(output.metadata.category_confidence.values().copied());

        let validation = validate_phase_output(&output);
        for error in &validation.errors {
            tracing::error!(phase = %self.phase, error = %error, "Phase output validation error");
        }
        output.metadata.warnings.extend(validation.errors);
        output.metadata.warnings.extend(validation.warnings);

        tracing::info!(
            phase = %self.phase,
            entities = output.entity_count(),
            confidence = output.metadata.confidence,
            oracle_calls = output.metadata.oracle_calls,
            duration_ms = output.metadata.duration_ms,
            partial = output.metadata.partial,
            "Phase extraction completed"
        );

        Ok(output)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Oracle doubles for extraction tests

    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use crate::service::llm::{CompletionOptions, GenerativeOracle, OracleError};

    /// Answers with the first scripted response whose marker the prompt contains
    pub struct ScriptedOracle {
        script: Vec<(String, String)>,
        fallback: String,
        failing_markers: Vec<String>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedOracle {
        pub fn new(fallback: &str) -> Self {
            Self {
                script: Vec::new(),
                fallback: fallback.to_string(),
                failing_markers: Vec::new(),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn respond(mut self, marker: impl Into<String>, response: impl Into<String>) -> Self {
            self.script.push((marker.into(), response.into()));
            self
        }

        /// Fail every call whose prompt contains `marker`
        pub fn fail_on(mut self, marker: impl Into<String>) -> Self {
            self.failing_markers.push(marker.into());
            self
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl GenerativeOracle for ScriptedOracle {
        async fn complete(
            &self,
            prompt: &str,
            _options: &CompletionOptions,
        ) -> Result<String, OracleError> {
            self.prompts.lock().unwrap().push(prompt.to_string());

            if self.failing_markers.iter().any(|m| prompt.contains(m.as_str())) {
                return Err(OracleError::Unavailable("scripted failure".to_string()));
            }

            Ok(self
                .script
                .iter()
                .find(|(marker, _)| prompt.contains(marker.as_str()))
                .map(|(_, response)| response.clone())
                .unwrap_or_else(|| self.fallback.clone()))
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    /// Delegates to a scripted oracle, then cancels the run
    pub struct CancellingOracle {
        pub inner: ScriptedOracle,
        pub cancel: CancellationToken,
    }

    #[async_trait]
    impl GenerativeOracle for CancellingOracle {
        async fn complete(
            &self,
            prompt: &str,
            options: &CompletionOptions,
        ) -> Result<String, OracleError> {
            let response = self.inner.complete(prompt, options).await;
            self.cancel.cancel();
            response
        }

        fn model(&self) -> &str {
            "cancelling"
        }
    }

    /// Fails every call
    pub struct UnreachableOracle;

    #[async_trait]
    impl GenerativeOracle for UnreachableOracle {
        async fn complete(
            &self,
            _prompt: &str,
            _options: &CompletionOptions,
        ) -> Result<String, OracleError> {
            Err(OracleError::Unavailable("connection refused".to_string()))
        }

        fn model(&self) -> &str {
            "unreachable"
        }
    }
}
