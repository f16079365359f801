//! Validation of phase outputs
//!
//! Applied to every freshly extracted phase and to prior outputs supplied by
//! callers, which may have been edited by hand.

use std::collections::HashSet;

use crate::model::{EntityCategory, EntityKind, PhaseOutput, TraceNode};

/// Result of phase output validation
#[derive(Debug)]
pub struct PhaseValidationResult {
    /// Whether the output passed validation
    pub is_valid: bool,
    /// Defects that make the output unusable for traceability
    pub errors: Vec<String>,
    /// Quality issues worth surfacing
    pub warnings: Vec<String>,
}

impl PhaseValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}

/// Validate identifiers, names and descriptions of a phase output
///
/// Errors:
/// 1. Duplicate entity ids
/// 2. Ids not carrying the phase prefix
/// 3. Empty names
/// 4. Phase or category confidence outside [0, 1]
/// 5. Entities in a category the phase does not extract
///
/// Warnings:
/// 1. Empty descriptions
/// 2. Names repeated within a category
pub fn validate_phase_output(output: &PhaseOutput) -> PhaseValidationResult {
    let mut result = PhaseValidationResult::valid();
    let prefix = format!("{}-", output.phase.prefix());

    let nodes = output.nodes();
    let mut seen_ids: HashSet<&str> = HashSet::new();
    let mut seen_names: HashSet<(EntityKind, String)> = HashSet::new();

    for node in &nodes {
        if !seen_ids.insert(node.id) {
            result.add_error(format!("Duplicate entity id '{}'", node.id));
        }

        if !node.id.starts_with(&prefix) {
            result.add_error(format!(
                "Entity id '{}' does not carry the {} prefix",
                node.id, prefix
            ));
        }

        if node.name.trim().is_empty() {
            result.add_error(format!("Entity '{}' has an empty name", node.id));
            continue;
        }

        if !seen_names.insert((node.kind, node.name.trim().to_lowercase())) {
            result.add_warning(format!(
                "Name '{}' appears more than once among {:?} entities",
                node.name,
                node.kind
            ));
        }

        if description_is_empty(node) {
            result.add_warning(format!("Entity '{}' ({}) has no description", node.id, node.name));
        }
    }

    for category in EntityCategory::ALL {
        let count = output.category_count(category);
        if count > 0 && !output.phase.categories().contains(&category) {
            result.add_error(format!(
                "The {} phase does not hold {} ({} found)",
                output.phase, category, count
            ));
        }
    }

    let confidence = output.metadata.confidence;
    if !(0.0..=1.0).contains(&confidence) {
        result.add_error(format!("Phase confidence {} is outside [0, 1]", confidence));
    }

    for (category, value) in &output.metadata.category_confidence {
        if !(0.0..=1.0).contains(value) {
            result.add_error(format!(
                "Confidence {} of category '{}' is outside [0, 1]",
                value, category
            ));
        }
    }

    result
}

fn description_is_empty(node: &TraceNode<'_>) -> bool {
    node.text.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Actor, Phase};

    fn actor(id: &str, name: &str, description: &str) -> Actor {
        Actor {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            role_definition: String::new(),
            responsibilities: vec![],
            capabilities: vec![],
            source_references: vec![],
        }
    }

    #[test]
    fn test_valid_output() {
        let mut output = PhaseOutput::new(Phase::Operational);
        output.actors.push(actor("OA-ACTOR-001", "Driver", "Drives vehicles"));
        output.actors.push(actor("OA-ACTOR-002", "Pedestrian", "Walks"));

        let result = validate_phase_output(&output);
        assert!(result.is_valid);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_duplicate_and_foreign_ids() {
        let mut output = PhaseOutput::new(Phase::Operational);
        output.actors.push(actor("OA-ACTOR-001", "Driver", "Drives"));
        output.actors.push(actor("OA-ACTOR-001", "Cyclist", "Rides"));
        output.actors.push(actor("SA-ACTOR-001", "Operator", "Operates"));

        let result = validate_phase_output(&output);
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_empty_description_and_repeated_name_warn() {
        let mut output = PhaseOutput::new(Phase::Operational);
        output.actors.push(actor("OA-ACTOR-001", "Driver", ""));
        output.actors.push(actor("OA-ACTOR-002", "driver", "Second driver"));

        let result = validate_phase_output(&output);
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn test_empty_name_is_error() {
        let mut output = PhaseOutput::new(Phase::Operational);
        output.actors.push(actor("OA-ACTOR-001", "  ", "Someone"));

        let result = validate_phase_output(&output);
        assert!(!result.is_valid);
    }

    #[test]
    fn test_confidence_out_of_range_is_error() {
        let mut output = PhaseOutput::new(Phase::Operational);
        output.actors.push(actor("OA-ACTOR-001", "Driver", "Drives"));
        output.metadata.confidence = 7.5;
        output
            .metadata
            .category_confidence
            .insert("actors".to_string(), -0.2);

        let result = validate_phase_output(&output);
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_nan_confidence_is_error() {
        let mut output = PhaseOutput::new(Phase::Operational);
        output.metadata.confidence = f64::NAN;

        assert!(!validate_phase_output(&output).is_valid);
    }

    #[test]
    fn test_foreign_category_is_error() {
        let mut output = PhaseOutput::new(Phase::System);
        output.actors.push(actor("SA-ACTOR-001", "Driver", "Drives"));

        let result = validate_phase_output(&output);
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("does not hold actors"));
    }
}
