//! Phase outputs, traceability records and the assembled analysis result

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::model::entities::{
    Actor, Capability, Component, Function, ImplementationConstraint, Interface, Scenario,
};
use crate::model::phase::{EntityCategory, Phase};

/// Outcome of extracting one entity category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CategoryStatus {
    /// A well-formed response was accepted
    Completed,
    /// The oracle answered but nothing parseable came back
    Malformed,
    /// Every oracle call for the category errored or timed out
    Failed,
    /// Not attempted because the run was cancelled
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChunkOrigin {
    Provided,
    Retrieved,
}

/// A context chunk that was part of a phase's prompt window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChunkRef {
    pub index: usize,
    pub origin: ChunkOrigin,
}

/// Bookkeeping attached to a phase output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ExtractionMetadata {
    pub extracted_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Mean of the category confidences, in [0, 1]
    pub confidence: f64,
    pub category_confidence: BTreeMap<String, f64>,
    pub category_counts: BTreeMap<String, usize>,
    /// Items dropped because required fields were missing
    pub rejected_items: BTreeMap<String, usize>,
    pub category_status: BTreeMap<String, CategoryStatus>,
    pub oracle_calls: u32,
    pub context_window: Vec<ChunkRef>,
    pub warnings: Vec<String>,
    /// Set when cancellation stopped the phase before every category ran
    pub partial: bool,
}

/// Entities extracted for one phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PhaseOutput {
    pub phase: Phase,
    #[serde(default)]
    pub actors: Vec<Actor>,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub functions: Vec<Function>,
    #[serde(default)]
    pub interfaces: Vec<Interface>,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
    #[serde(default)]
    pub constraints: Vec<ImplementationConstraint>,
    #[serde(default)]
    pub metadata: ExtractionMetadata,
}

/// Kind of architecture entity, used for link compatibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Actor,
    Capability,
    Component,
    Function,
    Interface,
    Scenario,
    Constraint,
}

/// Flattened, borrowed view of an entity for similarity matching
#[derive(Debug, Clone)]
pub struct TraceNode<'a> {
    pub phase: Phase,
    pub kind: EntityKind,
    pub id: &'a str,
    pub name: &'a str,
    pub text: String,
}

impl PhaseOutput {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            actors: Vec::new(),
            capabilities: Vec::new(),
            components: Vec::new(),
            functions: Vec::new(),
            interfaces: Vec::new(),
            scenarios: Vec::new(),
            constraints: Vec::new(),
            metadata: ExtractionMetadata::default(),
        }
    }

    pub fn entity_count(&self) -> usize {
        self.actors.len()
            + self.capabilities.len()
            + self.components.len()
            + self.functions.len()
            + self.interfaces.len()
            + self.scenarios.len()
            + self.constraints.len()
    }

    /// Number of entities held in `category`
    pub fn category_count(&self, category: EntityCategory) -> usize {
        match category {
            EntityCategory::Actors => self.actors.len(),
            EntityCategory::Capabilities => self.capabilities.len(),
            EntityCategory::Components => self.components.len(),
            EntityCategory::Functions => self.functions.len(),
            EntityCategory::Interfaces => self.interfaces.len(),
            EntityCategory::Scenarios => self.scenarios.len(),
            EntityCategory::Constraints => self.constraints.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entity_count() == 0
    }

    /// All entities of the phase as trace nodes, in category order
    pub fn nodes(&self) -> Vec<TraceNode<'_>> {
        let phase = self.phase;
        let mut nodes = Vec::with_capacity(self.entity_count());

        nodes.extend(self.actors.iter().map(|a| TraceNode {
            phase,
            kind: EntityKind::Actor,
            id: &a.id,
            name: &a.name,
            text: join_text(&a.description, &a.role_definition),
        }));
        nodes.extend(self.capabilities.iter().map(|c| TraceNode {
            phase,
            kind: EntityKind::Capability,
            id: &c.id,
            name: &c.name,
            text: join_text(&c.description, &c.mission_statement),
        }));
        nodes.extend(self.components.iter().map(|c| TraceNode {
            phase,
            kind: EntityKind::Component,
            id: &c.id,
            name: &c.name,
            text: join_text(&c.description, &c.responsibilities.join(" ")),
        }));
        nodes.extend(self.functions.iter().map(|f| TraceNode {
            phase,
            kind: EntityKind::Function,
            id: &f.id,
            name: &f.name,
            text: f.description.clone(),
        }));
        nodes.extend(self.interfaces.iter().map(|i| TraceNode {
            phase,
            kind: EntityKind::Interface,
            id: &i.id,
            name: &i.name,
            text: join_text(&i.description, &i.data_specifications.join(" ")),
        }));
        nodes.extend(self.scenarios.iter().map(|s| TraceNode {
            phase,
            kind: EntityKind::Scenario,
            id: &s.id,
            name: &s.name,
            text: s.description.clone(),
        }));
        nodes.extend(self.constraints.iter().map(|c| TraceNode {
            phase,
            kind: EntityKind::Constraint,
            id: &c.id,
            name: &c.name,
            text: c.description.clone(),
        }));

        nodes
    }

    /// Up to `limit` representative `(name, description)` pairs for prompt context
    pub fn representative_entities(&self, limit: usize) -> Vec<(&str, &str)> {
        let pairs: Vec<(&str, &str)> = if self.phase == Phase::Operational {
            self.actors
                .iter()
                .map(|a| (a.name.as_str(), a.description.as_str()))
                .chain(
                    self.capabilities
                        .iter()
                        .map(|c| (c.name.as_str(), c.description.as_str())),
                )
                .collect()
        } else {
            self.components
                .iter()
                .map(|c| (c.name.as_str(), c.description.as_str()))
                .chain(
                    self.functions
                        .iter()
                        .map(|f| (f.name.as_str(), f.description.as_str())),
                )
                .collect()
        };

        pairs.into_iter().take(limit).collect()
    }
}

fn join_text(primary: &str, secondary: &str) -> String {
    match (primary.is_empty(), secondary.is_empty()) {
        (_, true) => primary.to_string(),
        (true, false) => secondary.to_string(),
        (false, false) => format!("{} {}", primary, secondary),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    Refines,
    Realizes,
    Allocates,
    Supports,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LinkOrigin {
    /// Inferred from name and description similarity
    Similarity,
    /// Resolved from a name the oracle declared on the entity
    Declared,
}

/// Directed relation from an earlier-phase entity to a later-phase one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TraceabilityLink {
    pub source_id: String,
    pub target_id: String,
    pub source_phase: Phase,
    pub target_phase: Phase,
    pub link_type: LinkType,
    pub confidence: f64,
    pub origin: LinkOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GapSeverity {
    Critical,
    Major,
    Minor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GapType {
    UnrealizedCapability,
    MissingRealization,
    MissingInterface,
    UntracedEntity,
    UnrealizedEntity,
    DanglingReference,
}

/// Detected traceability defect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Gap {
    pub id: String,
    pub severity: GapSeverity,
    pub gap_type: GapType,
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    pub description: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyCheckType {
    /// Entity volumes agree between operational and system phases
    ModelCoherence,
    /// Interfaces have sensible providers and consumers
    InterfaceCompatibility,
}

/// Ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Warning,
    Failed,
}

/// Architecture-level consistency finding across one or more phases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConsistencyCheck {
    pub id: String,
    pub check_type: ConsistencyCheckType,
    pub phases_involved: Vec<Phase>,
    pub status: CheckStatus,
    pub description: String,
    #[serde(default)]
    pub issues_found: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Run-level bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RunMetadata {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub requested_phases: Vec<Phase>,
    pub completed_phases: Vec<Phase>,
    /// Phases taken from the request instead of being extracted
    pub supplied_phases: Vec<Phase>,
    pub source_documents: Vec<String>,
    pub phase_duration_ms: BTreeMap<String, u64>,
    pub phase_confidence: BTreeMap<String, f64>,
    pub total_entities: usize,
    pub service_version: String,
}

/// Complete result of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StructuredResult {
    pub run: RunMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operational: Option<PhaseOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<PhaseOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical: Option<PhaseOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical: Option<PhaseOutput>,
    pub traceability_links: Vec<TraceabilityLink>,
    pub gaps: Vec<Gap>,
    pub quality_metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub consistency_checks: Vec<ConsistencyCheck>,
    /// Entity ids whose change would ripple widely, keyed by category
    #[serde(default)]
    pub impact_analysis: BTreeMap<String, Vec<String>>,
    /// Set when the run was cancelled before every planned phase completed
    pub partial: bool,
}

impl StructuredResult {
    pub fn phase(&self, phase: Phase) -> Option<&PhaseOutput> {
        match phase {
            Phase::Operational => self.operational.as_ref(),
            Phase::System => self.system.as_ref(),
            Phase::Logical => self.logical.as_ref(),
            Phase::Physical => self.physical.as_ref(),
        }
    }

    pub fn phase_slot(&mut self, phase: Phase) -> &mut Option<PhaseOutput> {
        match phase {
            Phase::Operational => &mut self.operational,
            Phase::System => &mut self.system,
            Phase::Logical => &mut self.logical,
            Phase::Physical => &mut self.physical,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entities::{ComponentType, Function};

    fn component(id: &str, name: &str) -> Component {
        Component {
            id: id.to_string(),
            name: name.to_string(),
            description: format!("{} description", name),
            component_type: ComponentType::Subsystem,
            responsibilities: vec![],
            parent_component: None,
            sub_components: vec![],
            allocated_functions: vec![],
            technology_platform: None,
            implements_components: vec![],
            source_references: vec![0],
        }
    }

    #[test]
    fn test_nodes_cover_every_entity() {
        let mut output = PhaseOutput::new(Phase::Logical);
        output.components.push(component("LA-COMP-001", "Signal Controller"));
        output.functions.push(Function {
            id: "LA-FUNC-001".to_string(),
            name: "Switch Lights".to_string(),
            description: "Changes light state".to_string(),
            parent_function: None,
            sub_functions: vec![],
            inputs: vec![],
            outputs: vec![],
            behavioral_specifications: vec![],
            allocated_components: vec![],
            realizes_functions: vec![],
            realizes_capabilities: vec![],
            source_references: vec![],
        });

        let nodes = output.nodes();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].kind, EntityKind::Component);
        assert_eq!(nodes[1].id, "LA-FUNC-001");
        assert!(nodes.iter().all(|n| n.phase == Phase::Logical));
    }

    #[test]
    fn test_representative_entities_respects_limit() {
        let mut output = PhaseOutput::new(Phase::System);
        for i in 1..=8 {
            output
                .components
                .push(component(&format!("SA-COMP-{:03}", i), &format!("Unit {}", i)));
        }

        let reps = output.representative_entities(5);
        assert_eq!(reps.len(), 5);
        assert_eq!(reps[0].0, "Unit 1");
    }

    #[test]
    fn test_prior_output_deserializes_without_metadata() {
        let json = r#"{"phase": "operational", "actors": [{"id": "OA-ACTOR-001", "name": "Driver", "description": "Road user"}]}"#;
        let output: PhaseOutput = serde_json::from_str(json).unwrap();
        assert_eq!(output.phase, Phase::Operational);
        assert_eq!(output.actors.len(), 1);
        assert!(output.components.is_empty());
        assert_eq!(output.metadata.confidence, 0.0);
    }
}
