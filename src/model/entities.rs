//! Architecture entities produced by phase extraction
//!
//! Every entity carries a phase-prefixed identifier, a name, a description and
//! the indices of the context chunks that were in the prompt window when it was
//! extracted. Cross-references between entities are names, resolved later by
//! the traceability engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Stakeholder or external party taking part in operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub role_definition: String,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub source_references: Vec<usize>,
}

/// High-level ability delivered to stakeholders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Capability {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub mission_statement: String,
    #[serde(default)]
    pub involved_actors: Vec<String>,
    #[serde(default)]
    pub performance_constraints: Vec<String>,
    #[serde(default)]
    pub source_references: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    Subsystem,
    Module,
    Service,
    Hardware,
    Software,
    Hybrid,
}

impl ComponentType {
    /// Parse a free-form type label, returning `None` when it is not recognised
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        match label.as_str() {
            "subsystem" | "system" | "logical" => Some(ComponentType::Subsystem),
            "module" | "library" => Some(ComponentType::Module),
            "service" | "microservice" => Some(ComponentType::Service),
            "hardware" | "device" | "node" => Some(ComponentType::Hardware),
            "software" | "application" => Some(ComponentType::Software),
            "hybrid" | "mixed" => Some(ComponentType::Hybrid),
            _ => None,
        }
    }
}

/// Structural building block of a system, logical or physical architecture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Component {
    pub id: String,
    pub name: String,
    pub description: String,
    pub component_type: ComponentType,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_component: Option<String>,
    #[serde(default)]
    pub sub_components: Vec<String>,
    #[serde(default)]
    pub allocated_functions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technology_platform: Option<String>,
    /// Names of components in the preceding phase this component implements
    #[serde(default)]
    pub implements_components: Vec<String>,
    #[serde(default)]
    pub source_references: Vec<usize>,
}

/// Behavioural unit with inputs and outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Function {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_function: Option<String>,
    #[serde(default)]
    pub sub_functions: Vec<String>,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub behavioral_specifications: Vec<String>,
    #[serde(default)]
    pub allocated_components: Vec<String>,
    /// Names of functions in the preceding phase this function refines
    #[serde(default)]
    pub realizes_functions: Vec<String>,
    /// Names of operational capabilities this function realizes
    #[serde(default)]
    pub realizes_capabilities: Vec<String>,
    #[serde(default)]
    pub source_references: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceType {
    Data,
    Control,
    User,
    External,
    Service,
    Api,
}

impl InterfaceType {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "data" | "data_interface" | "physical" | "bus" => Some(InterfaceType::Data),
            "control" | "command" => Some(InterfaceType::Control),
            "user" | "ui" | "hmi" | "user_interface" => Some(InterfaceType::User),
            "external" => Some(InterfaceType::External),
            "service" | "network" | "protocol" => Some(InterfaceType::Service),
            "api" | "rest" | "rpc" => Some(InterfaceType::Api),
            _ => None,
        }
    }
}

/// Contract between a provider and its consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Interface {
    pub id: String,
    pub name: String,
    pub description: String,
    pub interface_type: InterfaceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_component: Option<String>,
    #[serde(default)]
    pub consumer_components: Vec<String>,
    #[serde(default)]
    pub data_specifications: Vec<String>,
    #[serde(default)]
    pub protocol_specifications: Vec<String>,
    #[serde(default)]
    pub quality_attributes: BTreeMap<String, String>,
    /// Names of interfaces in the preceding phase this interface supports
    #[serde(default)]
    pub refines_interfaces: Vec<String>,
    #[serde(default)]
    pub source_references: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioType {
    Functional,
    Interface,
    Performance,
    Error,
    Nominal,
}

impl ScenarioType {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "functional" | "behavioral" => Some(ScenarioType::Functional),
            "interface" | "interaction" => Some(ScenarioType::Interface),
            "performance" | "load" => Some(ScenarioType::Performance),
            "error" | "failure" | "degraded" | "exception" => Some(ScenarioType::Error),
            "nominal" | "operational" | "deployment" | "maintenance" => {
                Some(ScenarioType::Nominal)
            }
            _ => None,
        }
    }
}

/// One ordered step of a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InteractionStep {
    pub ordinal: u32,
    pub performer: String,
    pub action: String,
}

/// Data exchanged between two participants of a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DataFlow {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(default)]
    pub payload: String,
}

/// Ordered interaction between architecture elements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Scenario {
    pub id: String,
    pub name: String,
    pub description: String,
    pub scenario_type: ScenarioType,
    /// Components (or actors, in operational analysis) taking part
    #[serde(default)]
    pub involved_components: Vec<String>,
    #[serde(default)]
    pub involved_functions: Vec<String>,
    #[serde(default)]
    pub steps: Vec<InteractionStep>,
    #[serde(default)]
    pub data_flows: Vec<DataFlow>,
    #[serde(default)]
    pub performance_characteristics: BTreeMap<String, String>,
    /// Names of scenarios in the preceding phase this scenario realizes
    #[serde(default)]
    pub realizes_scenarios: Vec<String>,
    #[serde(default)]
    pub source_references: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintType {
    Technology,
    Performance,
    Environmental,
    Safety,
    Security,
    Regulatory,
}

impl ConstraintType {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "technology" | "technical" | "platform" => Some(ConstraintType::Technology),
            "performance" | "timing" => Some(ConstraintType::Performance),
            "environmental" | "environment" => Some(ConstraintType::Environmental),
            "safety" => Some(ConstraintType::Safety),
            "security" => Some(ConstraintType::Security),
            "regulatory" | "compliance" | "legal" => Some(ConstraintType::Regulatory),
            _ => None,
        }
    }
}

/// Implementation constraint affecting physical components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ImplementationConstraint {
    pub id: String,
    pub name: String,
    pub description: String,
    pub constraint_type: ConstraintType,
    #[serde(default)]
    pub affected_components: Vec<String>,
    #[serde(default)]
    pub specifications: BTreeMap<String, String>,
    #[serde(default)]
    pub source_references: Vec<usize>,
}
