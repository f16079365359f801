//! System, logical and physical architecture extraction
//!
//! The three architecture phases share one flow: components, then functions,
//! then interfaces and scenarios (optionally concurrently, since both only
//! see component and function names), and for the physical phase finally
//! implementation constraints.

use tokio_util::sync::CancellationToken;

use crate::model::{Component, EntityCategory, Function, Phase, PhaseOutput};
use crate::service::extraction::converters::{
    convert_component, convert_constraint, convert_function, convert_interface, convert_scenario,
};
use crate::service::extraction::prompts::{CategoryPrompt, build_category_prompt};
use crate::service::extraction::{
    ExtractionError, ExtractionInput, PhaseContext, PhaseExtractor, PhaseRecorder,
};

impl PhaseExtractor {
    /// Extract the system analysis phase
    pub async fn extract_system(
        &self,
        input: &ExtractionInput<'_>,
        operational: Option<&PhaseOutput>,
        cancel: &CancellationToken,
    ) -> Result<PhaseOutput, ExtractionError> {
        let prior: Vec<&PhaseOutput> = operational.into_iter().collect();
        self.extract_architecture(Phase::System, input, &prior, cancel)
            .await
    }

    /// Extract the logical architecture phase
    pub async fn extract_logical(
        &self,
        input: &ExtractionInput<'_>,
        operational: Option<&PhaseOutput>,
        system: Option<&PhaseOutput>,
        cancel: &CancellationToken,
    ) -> Result<PhaseOutput, ExtractionError> {
        let prior: Vec<&PhaseOutput> = operational.into_iter().chain(system).collect();
        self.extract_architecture(Phase::Logical, input, &prior, cancel)
            .await
    }

    /// Extract the physical architecture phase
    pub async fn extract_physical(
        &self,
        input: &ExtractionInput<'_>,
        operational: Option<&PhaseOutput>,
        system: Option<&PhaseOutput>,
        logical: Option<&PhaseOutput>,
        cancel: &CancellationToken,
    ) -> Result<PhaseOutput, ExtractionError> {
        let prior: Vec<&PhaseOutput> = operational
            .into_iter()
            .chain(system)
            .chain(logical)
            .collect();
        self.extract_architecture(Phase::Physical, input, &prior, cancel)
            .await
    }

    async fn extract_architecture(
        &self,
        phase: Phase,
        input: &ExtractionInput<'_>,
        prior: &[&PhaseOutput],
        cancel: &CancellationToken,
    ) -> Result<PhaseOutput, ExtractionError> {
        let context = self.phase_context(input, prior);
        let mut recorder = PhaseRecorder::new(phase, &context, input, self.config());

        let prompt = self.architecture_prompt(phase, &context, EntityCategory::Components, &[]);
        let run = self
            .run_category(
                phase,
                EntityCategory::Components,
                &prompt,
                &context.window,
                cancel,
                |value, id, refs| convert_component(phase, value, id, refs),
            )
            .await;
        let components = recorder.record(EntityCategory::Components, run);

        let known = self.known_names(components.iter().map(|c| c.name.as_str()));
        let prompt = self.architecture_prompt(phase, &context, EntityCategory::Functions, &known);
        let run = self
            .run_category(
                phase,
                EntityCategory::Functions,
                &prompt,
                &context.window,
                cancel,
                convert_function,
            )
            .await;
        let functions = recorder.record(EntityCategory::Functions, run);

        let known = structural_names(self, &components, &functions);
        let interface_prompt =
            self.architecture_prompt(phase, &context, EntityCategory::Interfaces, &known);
        let scenario_prompt =
            self.architecture_prompt(phase, &context, EntityCategory::Scenarios, &known);

        let interfaces_run = self.run_category(
            phase,
            EntityCategory::Interfaces,
            &interface_prompt,
            &context.window,
            cancel,
            convert_interface,
        );
        let scenarios_run = self.run_category(
            phase,
            EntityCategory::Scenarios,
            &scenario_prompt,
            &context.window,
            cancel,
            |value, id, refs| convert_scenario(phase, value, id, refs),
        );

        let (interfaces_run, scenarios_run) = if self.config().parallel_late_categories {
            futures::join!(interfaces_run, scenarios_run)
        } else {
            let interfaces = interfaces_run.await;
            (interfaces, scenarios_run.await)
        };
        let interfaces = recorder.record(EntityCategory::Interfaces, interfaces_run);
        let scenarios = recorder.record(EntityCategory::Scenarios, scenarios_run);

        let constraints = if phase == Phase::Physical {
            let known = self.known_names(components.iter().map(|c| c.name.as_str()));
            let prompt =
                self.architecture_prompt(phase, &context, EntityCategory::Constraints, &known);
            let run = self
                .run_category(
                    phase,
                    EntityCategory::Constraints,
                    &prompt,
                    &context.window,
                    cancel,
                    convert_constraint,
                )
                .await;
            recorder.record(EntityCategory::Constraints, run)
        } else {
            Vec::new()
        };

        let output = recorder.output_mut();
        output.components = components;
        output.functions = functions;
        output.interfaces = interfaces;
        output.scenarios = scenarios;
        output.constraints = constraints;

        recorder.finish()
    }

    fn architecture_prompt(
        &self,
        phase: Phase,
        context: &PhaseContext,
        category: EntityCategory,
        known: &[&str],
    ) -> String {
        build_category_prompt(&CategoryPrompt {
            phase,
            category,
            context: &context.context,
            proposal: &context.proposal,
            prior_context: &context.prior,
            known_names: known,
        })
    }
}

fn structural_names<'a>(
    extractor: &PhaseExtractor,
    components: &'a [Component],
    functions: &'a [Function],
) -> Vec<&'a str> {
    extractor.known_names(
        components
            .iter()
            .map(|c| c.name.as_str())
            .chain(functions.iter().map(|f| f.name.as_str())),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::config::ExtractionConfig;
    use crate::model::{Actor, ContextChunk};
    use crate::service::extraction::prompts::prompt_marker;
    use crate::service::extraction::testing::ScriptedOracle;

    fn scripted() -> ScriptedOracle {
        ScriptedOracle::new("{}")
            .respond(
                prompt_marker(Phase::Physical, EntityCategory::Components),
                r#"{"components": [
                    {"name": "Edge Controller Unit", "component_type": "hardware", "implements_components": ["Signal Controller"]},
                    {"name": "Timing Service", "component_type": "software"}
                ]}"#,
            )
            .respond(
                prompt_marker(Phase::Physical, EntityCategory::Interfaces),
                r#"{"interfaces": [{"name": "CAN Bus", "interface_type": "bus", "provider_component": "Edge Controller Unit"}]}"#,
            )
            .respond(
                prompt_marker(Phase::Physical, EntityCategory::Scenarios),
                r#"{"scenarios": [{"name": "Cold Start", "scenario_type": "deployment"}]}"#,
            )
            .respond(
                prompt_marker(Phase::Physical, EntityCategory::Constraints),
                r#"{"constraints": [{"name": "Operating Temperature", "constraint_type": "environmental", "affected_components": ["Edge Controller Unit"]}]}"#,
            )
    }

    async fn run_physical(parallel: bool) -> (PhaseOutput, Arc<ScriptedOracle>) {
        let oracle = Arc::new(scripted());
        let extractor = PhaseExtractor::new(
            oracle.clone(),
            ExtractionConfig {
                retry_base_delay_ms: 0,
                parallel_late_categories: parallel,
                ..ExtractionConfig::default()
            },
        );
        let chunks = vec![ContextChunk::new("Controllers are deployed at the roadside cabinet.")];
        let input = ExtractionInput::new(&chunks, "");

        let mut operational = PhaseOutput::new(Phase::Operational);
        operational.actors.push(Actor {
            id: "OA-ACTOR-001".to_string(),
            name: "Maintenance Crew".to_string(),
            description: "Services roadside equipment".to_string(),
            role_definition: String::new(),
            responsibilities: vec![],
            capabilities: vec![],
            source_references: vec![],
        });

        let output = extractor
            .extract_physical(&input, Some(&operational), None, None, &CancellationToken::new())
            .await
            .unwrap();
        (output, oracle)
    }

    #[tokio::test]
    async fn test_physical_extraction_includes_constraints() {
        let (output, oracle) = run_physical(false).await;

        assert_eq!(output.phase, Phase::Physical);
        assert_eq!(output.components[0].id, "PA-COMP-001");
        assert_eq!(output.components[1].id, "PA-COMP-002");
        assert_eq!(output.interfaces[0].id, "PA-INTF-001");
        assert_eq!(output.constraints[0].id, "PA-CONST-001");
        assert_eq!(
            output.components[0].implements_components,
            vec!["Signal Controller"]
        );
        assert!(output.functions.is_empty());
        assert_eq!(oracle.calls(), 5);

        let prompts = oracle.prompts.lock().unwrap();
        assert!(prompts[0].contains("OPERATIONAL ANALYSIS CONTEXT:\n- Maintenance Crew"));
        let interface_prompt = prompts
            .iter()
            .find(|p| p.starts_with(&prompt_marker(Phase::Physical, EntityCategory::Interfaces)))
            .unwrap();
        assert!(interface_prompt.contains("Edge Controller Unit, Timing Service"));
    }

    #[tokio::test]
    async fn test_parallel_late_categories_match_sequential() {
        let (sequential, _) = run_physical(false).await;
        let (parallel, _) = run_physical(true).await;

        assert_eq!(sequential.interfaces, parallel.interfaces);
        assert_eq!(sequential.scenarios, parallel.scenarios);
        assert_eq!(sequential.constraints, parallel.constraints);
    }

    #[tokio::test]
    async fn test_system_phase_has_no_constraints_category() {
        let oracle = Arc::new(ScriptedOracle::new("{}"));
        let extractor = PhaseExtractor::new(
            oracle.clone(),
            ExtractionConfig {
                retry_base_delay_ms: 0,
                ..ExtractionConfig::default()
            },
        );
        let chunks = vec![ContextChunk::new("text")];
        let input = ExtractionInput::new(&chunks, "");

        let output = extractor
            .extract_system(&input, None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(oracle.calls(), 4);
        assert!(!output.metadata.category_status.contains_key("constraints"));
    }
}
