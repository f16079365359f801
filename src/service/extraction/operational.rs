//! Operational analysis: actors, capabilities and operational scenarios

use tokio_util::sync::CancellationToken;

use crate::model::{EntityCategory, Phase, PhaseOutput};
use crate::service::extraction::converters::{convert_actor, convert_capability, convert_scenario};
use crate::service::extraction::prompts::{CategoryPrompt, build_category_prompt};
use crate::service::extraction::{
    ExtractionError, ExtractionInput, PhaseContext, PhaseExtractor, PhaseRecorder,
};

impl PhaseExtractor {
    /// Extract the operational analysis phase
    pub async fn extract_operational(
        &self,
        input: &ExtractionInput<'_>,
        cancel: &CancellationToken,
    ) -> Result<PhaseOutput, ExtractionError> {
        let phase = Phase::Operational;
        let context = self.phase_context(input, &[]);
        let mut recorder = PhaseRecorder::new(phase, &context, input, self.config());

        let prompt = self.operational_prompt(&context, EntityCategory::Actors, &[]);
        let run = self
            .run_category(phase, EntityCategory::Actors, &prompt, &context.window, cancel, convert_actor)
            .await;
        let actors = recorder.record(EntityCategory::Actors, run);

        let known = self.known_names(actors.iter().map(|a| a.name.as_str()));
        let prompt = self.operational_prompt(&context, EntityCategory::Capabilities, &known);
        let run = self
            .run_category(
                phase,
                EntityCategory::Capabilities,
                &prompt,
                &context.window,
                cancel,
                convert_capability,
            )
            .await;
        let capabilities = recorder.record(EntityCategory::Capabilities, run);

        let known = self.known_names(
            actors
                .iter()
                .map(|a| a.name.as_str())
                .chain(capabilities.iter().map(|c| c.name.as_str())),
        );
        let prompt = self.operational_prompt(&context, EntityCategory::Scenarios, &known);
        let run = self
            .run_category(
                phase,
                EntityCategory::Scenarios,
                &prompt,
                &context.window,
                cancel,
                |value, id, refs| convert_scenario(phase, value, id, refs),
            )
            .await;
        let scenarios = recorder.record(EntityCategory::Scenarios, run);

        let output = recorder.output_mut();
        output.actors = actors;
        output.capabilities = capabilities;
        output.scenarios = scenarios;

        recorder.finish()
    }

    fn operational_prompt(
        &self,
        context: &PhaseContext,
        category: EntityCategory,
        known: &[&str],
    ) -> String {
        build_category_prompt(&CategoryPrompt {
            phase: Phase::Operational,
            category,
            context: &context.context,
            proposal: &context.proposal,
            prior_context: &context.prior,
            known_names: known,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::config::ExtractionConfig;
    use crate::model::{CategoryStatus, ContextChunk};
    use crate::service::extraction::prompts::prompt_marker;
    use crate::service::extraction::testing::ScriptedOracle;

    #[tokio::test]
    async fn test_capability_prompt_lists_actor_names() {
        let oracle = Arc::new(
            ScriptedOracle::new("{}").respond(
                prompt_marker(Phase::Operational, EntityCategory::Actors),
                r#"{"actors": [{"name": "Dispatcher", "description": "Assigns crews"}]}"#,
            ),
        );
        let extractor = PhaseExtractor::new(
            oracle.clone(),
            ExtractionConfig {
                retry_base_delay_ms: 0,
                ..ExtractionConfig::default()
            },
        );
        let chunks = vec![ContextChunk::new("Dispatchers assign crews to incidents.")];
        let input = ExtractionInput::new(&chunks, "Emergency dispatch modernization");

        let output = extractor
            .extract_operational(&input, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output.actors.len(), 1);
        assert_eq!(oracle.calls(), 3);

        let prompts = oracle.prompts.lock().unwrap();
        let capability_prompt = prompts
            .iter()
            .find(|p| p.contains(&prompt_marker(Phase::Operational, EntityCategory::Capabilities)))
            .unwrap();
        assert!(capability_prompt.contains("KNOWN ENTITIES IN THIS PHASE:\nDispatcher"));
        assert!(capability_prompt.contains("No previous analysis context available"));
        assert!(capability_prompt.contains("Emergency dispatch modernization"));
    }

    #[tokio::test]
    async fn test_failed_category_degrades_to_empty() {
        let oracle = ScriptedOracle::new("{}")
            .respond(
                prompt_marker(Phase::Operational, EntityCategory::Actors),
                r#"{"actors": [{"name": "Dispatcher"}]}"#,
            )
            .fail_on(prompt_marker(Phase::Operational, EntityCategory::Capabilities));
        let extractor = PhaseExtractor::new(
            Arc::new(oracle),
            ExtractionConfig {
                retry_base_delay_ms: 0,
                ..ExtractionConfig::default()
            },
        );
        let chunks = vec![ContextChunk::new("Dispatchers assign crews.")];
        let input = ExtractionInput::new(&chunks, "");

        let output = extractor
            .extract_operational(&input, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output.actors.len(), 1);
        assert!(output.capabilities.is_empty());
        assert_eq!(
            output.metadata.category_status["capabilities"],
            CategoryStatus::Failed
        );
        assert_eq!(output.metadata.category_confidence["capabilities"], 0.0);
        assert!(output.metadata.confidence > 0.0);
    }
}
