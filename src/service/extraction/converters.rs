//! Converters from extracted LLM models to domain entities

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::model::extracted::{
    ExtractedActor, ExtractedCapability, ExtractedComponent, ExtractedConstraint,
    ExtractedFunction, ExtractedInterface, ExtractedScenario,
};
use crate::model::{
    Actor, Capability, Component, ComponentType, ConstraintType, DataFlow, EntityCategory,
    Function, ImplementationConstraint, Interface, InteractionStep, InterfaceType, Phase,
    Scenario, ScenarioType,
};
use crate::service::extraction::error::PartialEntityData;

fn decode<T: DeserializeOwned>(category: EntityCategory, value: Value) -> Result<T, PartialEntityData> {
    if !value.is_object() {
        return Err(PartialEntityData::new(category, "item is not a JSON object"));
    }
    serde_json::from_value(value).map_err(|e| PartialEntityData::new(category, e.to_string()))
}

fn require_name(category: EntityCategory, name: Option<String>) -> Result<String, PartialEntityData> {
    name.ok_or_else(|| PartialEntityData::new(category, "missing name"))
}

/// Convert an extracted actor
pub fn convert_actor(value: Value, id: String, refs: &[usize]) -> Result<Actor, PartialEntityData> {
    let extracted: ExtractedActor = decode(EntityCategory::Actors, value)?;
    Ok(Actor {
        id,
        name: require_name(EntityCategory::Actors, extracted.name)?,
        description: extracted.description,
        role_definition: extracted.role_definition,
        responsibilities: extracted.responsibilities,
        capabilities: extracted.capabilities,
        source_references: refs.to_vec(),
    })
}

/// Convert an extracted operational capability
pub fn convert_capability(
    value: Value,
    id: String,
    refs: &[usize],
) -> Result<Capability, PartialEntityData> {
    let extracted: ExtractedCapability = decode(EntityCategory::Capabilities, value)?;
    Ok(Capability {
        id,
        name: require_name(EntityCategory::Capabilities, extracted.name)?,
        description: extracted.description,
        mission_statement: extracted.mission_statement,
        involved_actors: extracted.involved_actors,
        performance_constraints: extracted.performance_constraints,
        source_references: refs.to_vec(),
    })
}

/// Convert an extracted component; unknown types fall back to the phase default
pub fn convert_component(
    phase: Phase,
    value: Value,
    id: String,
    refs: &[usize],
) -> Result<Component, PartialEntityData> {
    let extracted: ExtractedComponent = decode(EntityCategory::Components, value)?;
    let default_type = match phase {
        Phase::Physical => ComponentType::Software,
        _ => ComponentType::Subsystem,
    };

    Ok(Component {
        id,
        name: require_name(EntityCategory::Components, extracted.name)?,
        description: extracted.description,
        component_type: ComponentType::parse(&extracted.component_type).unwrap_or(default_type),
        responsibilities: extracted.responsibilities,
        parent_component: extracted.parent_component,
        sub_components: extracted.sub_components,
        allocated_functions: extracted.allocated_functions,
        technology_platform: extracted.technology_platform,
        implements_components: extracted.implements_components,
        source_references: refs.to_vec(),
    })
}

/// Convert an extracted function
pub fn convert_function(value: Value, id: String, refs: &[usize]) -> Result<Function, PartialEntityData> {
    let extracted: ExtractedFunction = decode(EntityCategory::Functions, value)?;
    Ok(Function {
        id,
        name: require_name(EntityCategory::Functions, extracted.name)?,
        description: extracted.description,
        parent_function: extracted.parent_function,
        sub_functions: extracted.sub_functions,
        inputs: extracted.inputs,
        outputs: extracted.outputs,
        behavioral_specifications: extracted.behavioral_specifications,
        allocated_components: extracted.allocated_components,
        realizes_functions: extracted.realizes_functions,
        realizes_capabilities: extracted.realizes_capabilities,
        source_references: refs.to_vec(),
    })
}

/// Convert an extracted interface
pub fn convert_interface(
    value: Value,
    id: String,
    refs: &[usize],
) -> Result<Interface, PartialEntityData> {
    let extracted: ExtractedInterface = decode(EntityCategory::Interfaces, value)?;
    Ok(Interface {
        id,
        name: require_name(EntityCategory::Interfaces, extracted.name)?,
        description: extracted.description,
        interface_type: InterfaceType::parse(&extracted.interface_type)
            .unwrap_or(InterfaceType::Data),
        provider_component: extracted.provider_component,
        consumer_components: extracted.consumer_components,
        data_specifications: extracted.data_specifications,
        protocol_specifications: extracted.protocol_specifications,
        quality_attributes: extracted.quality_attributes,
        refines_interfaces: extracted.refines_interfaces,
        source_references: refs.to_vec(),
    })
}

/// Convert an extracted scenario
///
/// Steps keep their declared ordinals when present and are ordered by them;
/// steps without one take their position in the list.
pub fn convert_scenario(
    phase: Phase,
    value: Value,
    id: String,
    refs: &[usize],
) -> Result<Scenario, PartialEntityData> {
    let extracted: ExtractedScenario = decode(EntityCategory::Scenarios, value)?;
    let default_type = match phase {
        Phase::Operational => ScenarioType::Nominal,
        _ => ScenarioType::Functional,
    };

    let mut steps: Vec<InteractionStep> = extracted
        .steps
        .into_iter()
        .enumerate()
        .map(|(i, step)| InteractionStep {
            ordinal: step.ordinal.unwrap_or(i as u32 + 1),
            performer: step.performer,
            action: step.action,
        })
        .collect();
    steps.sort_by_key(|s| s.ordinal);

    let data_flows = extracted
        .data_flows
        .into_iter()
        .map(|flow| DataFlow {
            source: flow.source,
            target: flow.target,
            interface: flow.interface,
            payload: flow.payload,
        })
        .collect();

    Ok(Scenario {
        id,
        name: require_name(EntityCategory::Scenarios, extracted.name)?,
        description: extracted.description,
        scenario_type: ScenarioType::parse(&extracted.scenario_type).unwrap_or(default_type),
        involved_components: extracted.involved_components,
        involved_functions: extracted.involved_functions,
        steps,
        data_flows,
        performance_characteristics: extracted.performance_characteristics,
        realizes_scenarios: extracted.realizes_scenarios,
        source_references: refs.to_vec(),
    })
}

/// Convert an extracted physical implementation constraint
pub fn convert_constraint(
    value: Value,
    id: String,
    refs: &[usize],
) -> Result<ImplementationConstraint, PartialEntityData> {
    let extracted: ExtractedConstraint = decode(EntityCategory::Constraints, value)?;
    Ok(ImplementationConstraint {
        id,
        name: require_name(EntityCategory::Constraints, extracted.name)?,
        description: extracted.description,
        constraint_type: ConstraintType::parse(&extracted.constraint_type)
            .unwrap_or(ConstraintType::Technology),
        affected_components: extracted.affected_components,
        specifications: extracted.specifications,
        source_references: refs.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_component_type_fallback_depends_on_phase() {
        let logical = convert_component(
            Phase::Logical,
            json!({"name": "Router", "component_type": "quantum"}),
            "LA-COMP-001".to_string(),
            &[0, 1],
        )
        .unwrap();
        assert_eq!(logical.component_type, ComponentType::Subsystem);
        assert_eq!(logical.source_references, vec![0, 1]);

        let physical = convert_component(
            Phase::Physical,
            json!({"name": "Router", "component_type": "Hardware"}),
            "PA-COMP-001".to_string(),
            &[],
        )
        .unwrap();
        assert_eq!(physical.component_type, ComponentType::Hardware);
    }

    #[test]
    fn test_missing_name_rejected() {
        let err = convert_function(
            json!({"description": "does things"}),
            "SA-FUNC-001".to_string(),
            &[],
        )
        .unwrap_err();
        assert_eq!(err.category, EntityCategory::Functions);
        assert!(err.reason.contains("name"));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(convert_actor(json!("Driver"), "OA-ACTOR-001".to_string(), &[]).is_err());
    }

    #[test]
    fn test_scenario_steps_ordered() {
        let scenario = convert_scenario(
            Phase::Logical,
            json!({
                "name": "Crossing Request",
                "scenario_type": "failure",
                "interaction_sequence": [
                    {"step": 3, "component": "Controller", "action": "grant crossing"},
                    {"step": 1, "component": "Button", "action": "press"},
                    {"step": 2, "component": "Controller", "action": "queue request"}
                ]
            }),
            "LA-SCEN-001".to_string(),
            &[],
        )
        .unwrap();

        assert_eq!(scenario.scenario_type, ScenarioType::Error);
        let ordinals: Vec<u32> = scenario.steps.iter().map(|s| s.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
        assert_eq!(scenario.steps[0].performer, "Button");
    }
}
