//! Prompts for phase extraction

use crate::model::{ContextChunk, EntityCategory, Phase, PhaseOutput};

/// Used when no earlier phase output is available
pub const NO_PRIOR_CONTEXT: &str = "No previous analysis context available";

const NO_CONTEXT_CHUNKS: &str = "No context excerpts provided";

const ACTORS_FORMAT: &str = r#"{
  "actors": [
    {
      "name": "Actor name",
      "description": "Who or what the actor is",
      "role_definition": "Role played in operations",
      "responsibilities": ["responsibility"],
      "capabilities": ["what the actor can do"]
    }
  ]
}"#;

const CAPABILITIES_FORMAT: &str = r#"{
  "capabilities": [
    {
      "name": "Capability name",
      "description": "What the capability delivers",
      "mission_statement": "Mission or goal served",
      "involved_actors": ["actor name"],
      "performance_constraints": ["constraint"]
    }
  ]
}"#;

const COMPONENTS_FORMAT: &str = r#"{
  "components": [
    {
      "name": "Component name",
      "description": "Purpose of the component",
      "component_type": "subsystem|module|service|hardware|software|hybrid",
      "responsibilities": ["responsibility"],
      "parent_component": "enclosing component name or null",
      "sub_components": ["component name"],
      "allocated_functions": ["function name"],
      "technology_platform": "implementation technology or null",
      "implements_components": ["component name from the previous phase"]
    }
  ]
}"#;

const FUNCTIONS_FORMAT: &str = r#"{
  "functions": [
    {
      "name": "Function name",
      "description": "Behaviour performed",
      "parent_function": "enclosing function name or null",
      "sub_functions": ["function name"],
      "inputs": ["input"],
      "outputs": ["output"],
      "behavioral_specifications": ["rule or state behaviour"],
      "allocated_components": ["component name"],
      "realizes_functions": ["function name from the previous phase"],
      "realizes_capabilities": ["operational capability name"]
    }
  ]
}"#;

const INTERFACES_FORMAT: &str = r#"{
  "interfaces": [
    {
      "name": "Interface name",
      "description": "What is exchanged and why",
      "interface_type": "data|control|user|external|service|api",
      "provider_component": "component name",
      "consumer_components": ["component name"],
      "data_specifications": ["data item"],
      "protocol_specifications": ["protocol"],
      "quality_attributes": {"latency": "value"},
      "refines_interfaces": ["interface name from the previous phase"]
    }
  ]
}"#;

const SCENARIOS_FORMAT: &str = r#"{
  "scenarios": [
    {
      "name": "Scenario name",
      "description": "What happens",
      "scenario_type": "functional|interface|performance|error|nominal",
      "involved_components": ["component name"],
      "involved_functions": ["function name"],
      "interaction_sequence": [
        {"step": 1, "component": "component name", "action": "what it does"}
      ],
      "data_flows": [
        {"from_component": "name", "to_component": "name", "interface": "interface name", "data": "payload"}
      ],
      "performance_characteristics": {"response_time": "value"},
      "realizes_scenarios": ["scenario name from the previous phase"]
    }
  ]
}"#;

const OPERATIONAL_SCENARIOS_FORMAT: &str = r#"{
  "scenarios": [
    {
      "name": "Scenario name",
      "description": "Operational situation",
      "scenario_type": "nominal|error|performance",
      "involved_actors": ["actor name"],
      "interaction_sequence": [
        {"step": 1, "actor": "actor name", "action": "what the actor does"}
      ]
    }
  ]
}"#;

const CONSTRAINTS_FORMAT: &str = r#"{
  "constraints": [
    {
      "name": "Constraint name",
      "description": "What is constrained",
      "constraint_type": "technology|performance|environmental|safety|security|regulatory",
      "affected_components": ["component name"],
      "specifications": {"parameter": "value"}
    }
  ]
}"#;

/// Marker line that opens every category prompt
pub fn prompt_marker(phase: Phase, category: EntityCategory) -> String {
    format!("{} - {} EXTRACTION", phase.title(), category.title())
}

fn output_format(phase: Phase, category: EntityCategory) -> &'static str {
    match category {
        EntityCategory::Actors => ACTORS_FORMAT,
        EntityCategory::Capabilities => CAPABILITIES_FORMAT,
        EntityCategory::Components => COMPONENTS_FORMAT,
        EntityCategory::Functions => FUNCTIONS_FORMAT,
        EntityCategory::Interfaces => INTERFACES_FORMAT,
        EntityCategory::Scenarios if phase == Phase::Operational => OPERATIONAL_SCENARIOS_FORMAT,
        EntityCategory::Scenarios => SCENARIOS_FORMAT,
        EntityCategory::Constraints => CONSTRAINTS_FORMAT,
    }
}

fn task(phase: Phase, category: EntityCategory) -> &'static str {
    match (phase, category) {
        (Phase::Operational, EntityCategory::Actors) => {
            "Identify the operational actors: stakeholders, users, operators and external systems that take part in operations."
        }
        (Phase::Operational, EntityCategory::Capabilities) => {
            "Identify the operational capabilities: the missions and high-level abilities the actors need, independent of any solution."
        }
        (Phase::Operational, _) => {
            "Identify operational scenarios: sequences of actor activities that achieve the capabilities."
        }
        (Phase::System, EntityCategory::Components) => {
            "Identify the system and its major external boundary elements as seen from the outside."
        }
        (Phase::System, EntityCategory::Functions) => {
            "Identify the system functions needed to realize the operational capabilities. Fill realizes_capabilities with capability names from the previous analysis."
        }
        (Phase::System, EntityCategory::Interfaces) => {
            "Identify the system interfaces: exchanges between the system and its environment."
        }
        (Phase::System, _) => {
            "Identify system scenarios (functional chains) that show how system functions deliver the capabilities."
        }
        (Phase::Logical, EntityCategory::Components) => {
            "Identify the logical components that decompose the system, independent of technology. Fill implements_components with system component names."
        }
        (Phase::Logical, EntityCategory::Functions) => {
            "Identify the logical functions and allocate them to logical components. Fill realizes_functions with the system functions they refine."
        }
        (Phase::Logical, EntityCategory::Interfaces) => {
            "Identify the interfaces between logical components. Fill refines_interfaces with the system interfaces they support."
        }
        (Phase::Logical, _) => {
            "Identify logical scenarios: interactions between logical components, including the interfaces used by each data flow."
        }
        (Phase::Physical, EntityCategory::Components) => {
            "Identify the physical components (hardware, software, nodes) and their technology. Fill implements_components with the logical components they implement."
        }
        (Phase::Physical, EntityCategory::Functions) => {
            "Identify the physical functions as implemented, with their allocation. Fill realizes_functions with the logical functions they implement."
        }
        (Phase::Physical, EntityCategory::Interfaces) => {
            "Identify the physical interfaces, buses and protocols. Fill refines_interfaces with the logical interfaces they implement."
        }
        (Phase::Physical, EntityCategory::Scenarios) => {
            "Identify physical scenarios such as deployment, nominal operation, failure and maintenance."
        }
        (Phase::Physical, _) => {
            "Identify implementation constraints: technology, performance, environmental, safety, security and regulatory limits."
        }
    }
}

/// Cut `text` to at most `limit` characters, appending "..." when shortened
pub fn truncate_chars(text: &str, limit: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(limit) {
        Some((byte_index, _)) => format!("{}...", text[..byte_index].trim_end()),
        None => text.to_string(),
    }
}

/// Render the chunks at `window` as numbered excerpts
pub fn build_context_block(chunks: &[ContextChunk], window: &[usize], chunk_limit: usize) -> String {
    if window.is_empty() {
        return NO_CONTEXT_CHUNKS.to_string();
    }

    window
        .iter()
        .filter_map(|&i| chunks.get(i).map(|c| (i, c)))
        .map(|(i, chunk)| format!("[Excerpt {}] {}", i + 1, truncate_chars(&chunk.content, chunk_limit)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Summarize earlier phases as "name: description" lines
pub fn build_prior_context(prior: &[&PhaseOutput], limit: usize) -> String {
    let sections: Vec<String> = prior
        .iter()
        .filter_map(|output| {
            let entities = output.representative_entities(limit);
            if entities.is_empty() {
                return None;
            }
            let lines = entities
                .iter()
                .map(|(name, description)| {
                    if description.is_empty() {
                        format!("- {}", name)
                    } else {
                        format!("- {}: {}", name, truncate_chars(description, 160))
                    }
                })
                .collect::<Vec<_>>()
                .join("\n");
            Some(format!("{} CONTEXT:\n{}", output.phase.title(), lines))
        })
        .collect();

    if sections.is_empty() {
        NO_PRIOR_CONTEXT.to_string()
    } else {
        sections.join("\n\n")
    }
}

/// Inputs for a single category prompt
pub struct CategoryPrompt<'a> {
    pub phase: Phase,
    pub category: EntityCategory,
    pub context: &'a str,
    pub proposal: &'a str,
    pub prior_context: &'a str,
    pub known_names: &'a [&'a str],
}

/// Build the extraction prompt for one category
pub fn build_category_prompt(request: &CategoryPrompt<'_>) -> String {
    let known = if request.known_names.is_empty() {
        "None yet".to_string()
    } else {
        request.known_names.join(", ")
    };

    let proposal = if request.proposal.is_empty() {
        "No proposal provided"
    } else {
        request.proposal
    };

    format!(
        r#"{marker}

TASK:
{task}

REQUIREMENTS CONTEXT:
{context}

PROPOSAL:
{proposal}

PREVIOUS ANALYSIS CONTEXT:
{prior}

KNOWN ENTITIES IN THIS PHASE:
{known}

Reuse the exact names of known entities when you reference them. Only include
elements supported by the context or proposal. If none apply, return an empty list.

Respond with JSON in exactly this format:
{format}
"#,
        marker = prompt_marker(request.phase, request.category),
        task = task(request.phase, request.category),
        context = request.context,
        proposal = proposal,
        prior = request.prior_context,
        known = known,
        format = output_format(request.phase, request.category),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Actor;

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        assert_eq!(truncate_chars("ééééé", 2), "éé...");
    }

    #[test]
    fn test_context_block_numbers_excerpts() {
        let chunks = vec![
            ContextChunk::new("first chunk"),
            ContextChunk::new("second chunk that is long"),
        ];
        let block = build_context_block(&chunks, &[0, 1], 6);
        assert!(block.contains("[Excerpt 1] first..."));
        assert!(block.contains("[Excerpt 2] second..."));
        assert_eq!(build_context_block(&chunks, &[], 6), NO_CONTEXT_CHUNKS);
    }

    #[test]
    fn test_prior_context_fallback_and_summary() {
        assert_eq!(build_prior_context(&[], 5), NO_PRIOR_CONTEXT);

        let mut operational = PhaseOutput::new(Phase::Operational);
        assert_eq!(build_prior_context(&[&operational], 5), NO_PRIOR_CONTEXT);

        operational.actors.push(Actor {
            id: "OA-ACTOR-001".to_string(),
            name: "Pedestrian".to_string(),
            description: "Person crossing the road".to_string(),
            role_definition: String::new(),
            responsibilities: vec![],
            capabilities: vec![],
            source_references: vec![],
        });
        let context = build_prior_context(&[&operational], 5);
        assert!(context.starts_with("OPERATIONAL ANALYSIS CONTEXT:"));
        assert!(context.contains("- Pedestrian: Person crossing the road"));
    }

    #[test]
    fn test_category_prompt_contains_marker_and_format() {
        let prompt = build_category_prompt(&CategoryPrompt {
            phase: Phase::Logical,
            category: EntityCategory::Interfaces,
            context: "ctx",
            proposal: "",
            prior_context: NO_PRIOR_CONTEXT,
            known_names: &["Controller", "Detector"],
        });

        assert!(prompt.starts_with("LOGICAL ARCHITECTURE - INTERFACE EXTRACTION"));
        assert!(prompt.contains("\"interfaces\""));
        assert!(prompt.contains("Controller, Detector"));
        assert!(prompt.contains("No proposal provided"));
    }
}
