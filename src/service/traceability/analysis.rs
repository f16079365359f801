//! Architecture consistency checks and change-impact analysis

use std::collections::BTreeMap;

use crate::model::{
    CheckStatus, ConsistencyCheck, ConsistencyCheckType, Interface, Phase, PhaseOutput,
};

/// A later phase holding fewer than this share of the earlier phase's
/// realizable entities is reported as incoherent
const COHERENCE_RATIO: f64 = 0.5;

/// Capabilities involving more actors than this are high impact
const HIGH_IMPACT_ACTORS: usize = 2;

/// Functions allocated to more components than this are critical
const CRITICAL_ALLOCATIONS: usize = 1;

pub const HIGH_IMPACT_CAPABILITIES: &str = "high_impact_operational_capabilities";
pub const CRITICAL_SYSTEM_FUNCTIONS: &str = "critical_system_functions";

/// Check builder; ids are assigned in emission order
#[derive(Default)]
struct CheckCollector {
    checks: Vec<ConsistencyCheck>,
}

impl CheckCollector {
    fn push(
        &mut self,
        check_type: ConsistencyCheckType,
        phases_involved: Vec<Phase>,
        description: String,
        issues: Vec<(CheckStatus, String, &str)>,
    ) {
        let status = issues
            .iter()
            .map(|(status, _, _)| *status)
            .max()
            .unwrap_or(CheckStatus::Passed);

        let mut recommendations: Vec<String> = Vec::new();
        for (_, _, recommendation) in &issues {
            if !recommendations.iter().any(|r| r == recommendation) {
                recommendations.push(recommendation.to_string());
            }
        }

        self.checks.push(ConsistencyCheck {
            id: format!("CONSIST-{:03}", self.checks.len() + 1),
            check_type,
            phases_involved,
            status,
            description,
            issues_found: issues.into_iter().map(|(_, issue, _)| issue).collect(),
            recommendations,
        });
    }
}

/// Consistency checks over the phases present in `outputs`
pub fn check_consistency(outputs: &BTreeMap<Phase, PhaseOutput>) -> Vec<ConsistencyCheck> {
    let mut collector = CheckCollector::default();

    for earlier in Phase::ALL {
        let Some(later) = Phase::ALL.into_iter().find(|p| p.previous() == Some(earlier)) else {
            continue;
        };
        if let (Some(from), Some(to)) = (outputs.get(&earlier), outputs.get(&later)) {
            model_coherence(from, to, &mut collector);
        }
    }

    for (phase, output) in outputs {
        if *phase != Phase::Operational && !output.interfaces.is_empty() {
            interface_compatibility(output, &mut collector);
        }
    }

    let checks = collector.checks;
    tracing::debug!(
        checks = checks.len(),
        failed = checks.iter().filter(|c| c.status == CheckStatus::Failed).count(),
        "Consistency checks complete"
    );
    checks
}

fn model_coherence(from: &PhaseOutput, to: &PhaseOutput, collector: &mut CheckCollector) {
    let (expected, actual, issue, recommendation) = if from.phase == Phase::Operational {
        (
            from.capabilities.len(),
            to.functions.len(),
            "System functions significantly fewer than operational capabilities",
            "Review system function coverage of the operational capabilities",
        )
    } else {
        (
            from.components.len(),
            to.components.len(),
            "Components significantly fewer than in the preceding phase",
            "Review the decomposition of the preceding phase's components",
        )
    };

    let mut issues = Vec::new();
    if (actual as f64) < expected as f64 * COHERENCE_RATIO {
        issues.push((
            CheckStatus::Warning,
            format!("{} ({} vs {})", issue, actual, expected),
            recommendation,
        ));
    }

    collector.push(
        ConsistencyCheckType::ModelCoherence,
        vec![from.phase, to.phase],
        format!("Model coherence across {} and {} phases", from.phase, to.phase),
        issues,
    );
}

fn interface_compatibility(output: &PhaseOutput, collector: &mut CheckCollector) {
    let issues = output
        .interfaces
        .iter()
        .filter_map(interface_issue)
        .collect();

    collector.push(
        ConsistencyCheckType::InterfaceCompatibility,
        vec![output.phase],
        format!("Interface compatibility within {} phase", output.phase),
        issues,
    );
}

fn interface_issue(interface: &Interface) -> Option<(CheckStatus, String, &'static str)> {
    match &interface.provider_component {
        Some(provider)
            if interface
                .consumer_components
                .iter()
                .any(|c| c.trim().eq_ignore_ascii_case(provider.trim())) =>
        {
            Some((
                CheckStatus::Failed,
                format!(
                    "Interface '{}' is consumed by its own provider '{}'",
                    interface.name, provider
                ),
                "Separate the provider and consumer of self-consumed interfaces",
            ))
        }
        None if interface.consumer_components.is_empty() => Some((
            CheckStatus::Warning,
            format!("Interface '{}' has neither provider nor consumers", interface.name),
            "Assign a provider and at least one consumer to every interface",
        )),
        _ => None,
    }
}

/// Entities whose change would propagate widely, keyed by analysis
pub fn impact_analysis(outputs: &BTreeMap<Phase, PhaseOutput>) -> BTreeMap<String, Vec<String>> {
    let mut impact = BTreeMap::new();

    if let Some(operational) = outputs.get(&Phase::Operational) {
        let capabilities = operational
            .capabilities
            .iter()
            .filter(|c| c.involved_actors.len() > HIGH_IMPACT_ACTORS)
            .map(|c| c.id.clone())
            .collect();
        impact.insert(HIGH_IMPACT_CAPABILITIES.to_string(), capabilities);
    }

    if let Some(system) = outputs.get(&Phase::System) {
        let functions = system
            .functions
            .iter()
            .filter(|f| f.allocated_components.len() > CRITICAL_ALLOCATIONS)
            .map(|f| f.id.clone())
            .collect();
        impact.insert(CRITICAL_SYSTEM_FUNCTIONS.to_string(), functions);
    }

    impact
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::traceability::fixtures::*;

    #[test]
    fn test_coherent_traffic_phases_pass() {
        let checks = check_consistency(&traffic_phases());

        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].id, "CONSIST-001");
        assert_eq!(checks[0].check_type, ConsistencyCheckType::ModelCoherence);
        assert_eq!(checks[0].phases_involved, vec![Phase::Operational, Phase::System]);
        assert_eq!(checks[0].status, CheckStatus::Passed);
        assert!(checks[0].issues_found.is_empty());
    }

    #[test]
    fn test_too_few_system_functions_warn() {
        let mut outputs = traffic_phases();
        let operational = outputs.get_mut(&Phase::Operational).unwrap();
        for (i, name) in ["Incident Response", "Pedestrian Safety", "Transit Priority"]
            .iter()
            .enumerate()
        {
            operational.capabilities.push(capability(
                &format!("OA-CAP-{:03}", i + 2),
                name,
                "Serve road users",
            ));
        }

        let checks = check_consistency(&outputs);
        assert_eq!(checks[0].status, CheckStatus::Warning);
        assert_eq!(checks[0].issues_found.len(), 1);
        assert!(checks[0].issues_found[0].contains("(1 vs 4)"));
        assert_eq!(checks[0].recommendations.len(), 1);
    }

    #[test]
    fn test_interface_problems_are_reported() {
        let mut system = PhaseOutput::new(Phase::System);
        let mut looped = interface("SA-INTF-001", "Lamp Command", Some("Signal Controller"));
        looped.consumer_components = vec!["signal controller".to_string()];
        system.interfaces.push(looped);
        system
            .interfaces
            .push(interface("SA-INTF-002", "Diagnostics Port", None));
        let mut fine = interface("SA-INTF-003", "Detector Feed", Some("Loop Detector"));
        fine.consumer_components = vec!["Signal Controller".to_string()];
        system.interfaces.push(fine);

        let checks = check_consistency(&BTreeMap::from([(Phase::System, system)]));

        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].check_type, ConsistencyCheckType::InterfaceCompatibility);
        assert_eq!(checks[0].status, CheckStatus::Failed);
        assert_eq!(checks[0].issues_found.len(), 2);
        assert_eq!(checks[0].recommendations.len(), 2);
    }

    #[test]
    fn test_impact_analysis() {
        let mut outputs = traffic_phases();
        let operational = outputs.get_mut(&Phase::Operational).unwrap();
        let mut shared = capability("OA-CAP-002", "Incident Clearance", "Clear blocked lanes");
        shared.involved_actors = vec![
            "Traffic Operator".to_string(),
            "Police".to_string(),
            "Tow Service".to_string(),
        ];
        operational.capabilities.push(shared);

        let system = outputs.get_mut(&Phase::System).unwrap();
        let mut spread = function("SA-FUNC-002", "Detect Vehicles", "Counts vehicles");
        spread.allocated_components =
            vec!["Loop Detector".to_string(), "Video Camera".to_string()];
        system.functions.push(spread);

        let impact = impact_analysis(&outputs);
        assert_eq!(impact[HIGH_IMPACT_CAPABILITIES], vec!["OA-CAP-002"]);
        assert_eq!(impact[CRITICAL_SYSTEM_FUNCTIONS], vec!["SA-FUNC-002"]);
    }

    #[test]
    fn test_impact_analysis_only_covers_present_phases() {
        let impact = impact_analysis(&BTreeMap::from([(
            Phase::Logical,
            PhaseOutput::new(Phase::Logical),
        )]));
        assert!(impact.is_empty());
    }
}
