//! Gap detection over phase outputs and their traceability links
//!
//! Severity:
//! - critical: operational capability not realized by any later phase
//! - major: logical component without a physical realization, or a parent
//!   reference that does not resolve
//! - minor: scenario without interface backing, entities without a link to
//!   the adjacent phase, and any other dangling reference

use std::collections::{BTreeMap, HashSet};

use crate::model::{
    EntityKind, Gap, GapSeverity, GapType, Phase, PhaseOutput, Scenario, TraceNode,
    TraceabilityLink,
};
use crate::service::traceability::similarity::name_similarity;
use crate::service::traceability::{TraceabilityEngine, declared_references, link_type_for};

/// Collects gaps and numbers them once detection is complete
#[derive(Default)]
struct GapCollector {
    gaps: Vec<Gap>,
}

impl GapCollector {
    fn push(
        &mut self,
        severity: GapSeverity,
        gap_type: GapType,
        phase: Phase,
        entity_id: Option<&str>,
        description: String,
        recommendation: &str,
    ) {
        self.gaps.push(Gap {
            id: String::new(),
            severity,
            gap_type,
            phase,
            entity_id: entity_id.map(str::to_string),
            description,
            recommendation: recommendation.to_string(),
        });
    }

    /// Gaps ordered by severity, numbered `GAP-001`, `GAP-002`, ...
    fn finish(mut self) -> Vec<Gap> {
        self.gaps.sort_by_key(|g| g.severity);
        for (i, gap) in self.gaps.iter_mut().enumerate() {
            gap.id = format!("GAP-{:03}", i + 1);
        }
        self.gaps
    }
}

fn next_phase(phase: Phase) -> Option<Phase> {
    Phase::ALL.into_iter().find(|p| p.previous() == Some(phase))
}

/// Detect gaps for the given outputs and links
pub fn detect_gaps(
    engine: &TraceabilityEngine,
    outputs: &BTreeMap<Phase, PhaseOutput>,
    nodes: &BTreeMap<Phase, Vec<TraceNode<'_>>>,
    links: &[TraceabilityLink],
) -> Vec<Gap> {
    let mut collector = GapCollector::default();

    // (source id, target phase) and (target id, source phase) of cross-phase links
    let forward: HashSet<(&str, Phase)> = links
        .iter()
        .filter(|l| l.source_phase != l.target_phase)
        .map(|l| (l.source_id.as_str(), l.target_phase))
        .collect();
    let backward: HashSet<(&str, Phase)> = links
        .iter()
        .filter(|l| l.source_phase != l.target_phase)
        .map(|l| (l.target_id.as_str(), l.source_phase))
        .collect();

    unrealized_capabilities(outputs, &forward, &mut collector);
    unrealized_logical_components(outputs, &forward, &mut collector);

    for (phase, output) in outputs {
        let Some(phase_nodes) = nodes.get(phase) else {
            continue;
        };
        dangling_references(engine, output, phase_nodes, &mut collector);
        declared_dangling_references(engine, output, nodes, &mut collector);
        if *phase != Phase::Operational {
            for scenario in &output.scenarios {
                if !has_interface_backing(engine, scenario, phase_nodes, output) {
                    collector.push(
                        GapSeverity::Minor,
                        GapType::MissingInterface,
                        *phase,
                        Some(scenario.id.as_str()),
                        format!(
                            "Scenario '{}' is not backed by any interface of the {} phase",
                            scenario.name, phase
                        ),
                        "Define the interfaces exchanged by the scenario participants",
                    );
                }
            }
        }
        adjacency_gaps(*phase, nodes, phase_nodes, &forward, &backward, &mut collector);
    }

    let gaps = collector.finish();
    tracing::debug!(
        critical = gaps.iter().filter(|g| g.severity == GapSeverity::Critical).count(),
        total = gaps.len(),
        "Gap detection complete"
    );
    gaps
}

fn unrealized_capabilities(
    outputs: &BTreeMap<Phase, PhaseOutput>,
    forward: &HashSet<(&str, Phase)>,
    collector: &mut GapCollector,
) {
    let Some(operational) = outputs.get(&Phase::Operational) else {
        return;
    };
    let later: Vec<Phase> = outputs
        .keys()
        .copied()
        .filter(|p| *p > Phase::Operational)
        .collect();
    if later.is_empty() {
        return;
    }

    for capability in &operational.capabilities {
        let realized = later
            .iter()
            .any(|p| forward.contains(&(capability.id.as_str(), *p)));
        if !realized {
            collector.push(
                GapSeverity::Critical,
                GapType::UnrealizedCapability,
                Phase::Operational,
                Some(capability.id.as_str()),
                format!(
                    "Operational capability '{}' is not realized by any later phase",
                    capability.name
                ),
                "Add system functions or components that realize this capability",
            );
        }
    }
}

fn unrealized_logical_components(
    outputs: &BTreeMap<Phase, PhaseOutput>,
    forward: &HashSet<(&str, Phase)>,
    collector: &mut GapCollector,
) {
    let (Some(logical), true) = (
        outputs.get(&Phase::Logical),
        outputs.contains_key(&Phase::Physical),
    ) else {
        return;
    };

    for component in &logical.components {
        if !forward.contains(&(component.id.as_str(), Phase::Physical)) {
            collector.push(
                GapSeverity::Major,
                GapType::MissingRealization,
                Phase::Logical,
                Some(component.id.as_str()),
                format!(
                    "Logical component '{}' has no physical realization",
                    component.name
                ),
                "Allocate the component to a physical component",
            );
        }
    }
}

/// Entities without a link to the adjacent phase on either side
///
/// An entity is only reported when the adjacent phase holds a kind it could
/// link with; otherwise no extraction result could ever close the gap.
fn adjacency_gaps(
    phase: Phase,
    nodes: &BTreeMap<Phase, Vec<TraceNode<'_>>>,
    phase_nodes: &[TraceNode<'_>],
    forward: &HashSet<(&str, Phase)>,
    backward: &HashSet<(&str, Phase)>,
    collector: &mut GapCollector,
) {
    let traceable = phase_nodes.iter().filter(|n| n.kind != EntityKind::Constraint);

    if let Some(previous) = phase.previous()
        && let Some(previous_nodes) = nodes.get(&previous)
    {
        let previous_kinds = kinds_of(previous_nodes);
        for node in traceable.clone() {
            let linkable = previous_kinds
                .iter()
                .any(|&kind| link_type_for(kind, node.kind).is_some());
            if linkable && !backward.contains(&(node.id, previous)) {
                collector.push(
                    GapSeverity::Minor,
                    GapType::UntracedEntity,
                    phase,
                    Some(node.id),
                    format!(
                        "'{}' has no trace back to the {} phase",
                        node.name, previous
                    ),
                    "Link the entity to the element it refines in the preceding phase",
                );
            }
        }
    }

    if let Some(next) = next_phase(phase)
        && let Some(next_nodes) = nodes.get(&next)
    {
        let next_kinds = kinds_of(next_nodes);
        for node in traceable {
            // reported with their own severity
            let separately_reported = node.kind == EntityKind::Capability
                || (phase == Phase::Logical && node.kind == EntityKind::Component);
            let linkable = next_kinds
                .iter()
                .any(|&kind| link_type_for(node.kind, kind).is_some());
            if separately_reported || !linkable {
                continue;
            }
            if !forward.contains(&(node.id, next)) {
                collector.push(
                    GapSeverity::Minor,
                    GapType::UnrealizedEntity,
                    phase,
                    Some(node.id),
                    format!("'{}' is not realized in the {} phase", node.name, next),
                    "Refine the entity in the following phase or remove it",
                );
            }
        }
    }
}

fn kinds_of(nodes: &[TraceNode<'_>]) -> HashSet<EntityKind> {
    nodes.iter().map(|n| n.kind).collect()
}

fn has_interface_backing(
    engine: &TraceabilityEngine,
    scenario: &Scenario,
    phase_nodes: &[TraceNode<'_>],
    output: &PhaseOutput,
) -> bool {
    let flow_backed = scenario
        .data_flows
        .iter()
        .filter_map(|f| f.interface.as_deref())
        .any(|name| {
            engine
                .resolve(name, phase_nodes, &[EntityKind::Interface])
                .is_some()
        });
    if flow_backed {
        return true;
    }

    output.interfaces.iter().any(|interface| {
        let endpoints: Vec<&str> = interface
            .provider_component
            .as_deref()
            .into_iter()
            .chain(interface.consumer_components.iter().map(String::as_str))
            .collect();
        scenario.involved_components.iter().any(|participant| {
            endpoints.iter().any(|endpoint| {
                name_similarity(participant, endpoint)
                    >= engine.config().thresholds.declared_reference
            })
        })
    })
}

struct Reference<'a> {
    entity_id: &'a str,
    entity_name: &'a str,
    field: &'static str,
    names: Vec<&'a str>,
    kinds: &'static [EntityKind],
    severity: GapSeverity,
}

fn strs(names: &[String]) -> Vec<&str> {
    names.iter().map(String::as_str).collect()
}

fn same_phase_references(output: &PhaseOutput) -> Vec<Reference<'_>> {
    const COMPONENTS: &[EntityKind] = &[EntityKind::Component];
    const FUNCTIONS: &[EntityKind] = &[EntityKind::Function];
    const ACTORS: &[EntityKind] = &[EntityKind::Actor];

    let mut refs = Vec::new();

    for capability in &output.capabilities {
        refs.push(Reference {
            entity_id: &capability.id,
            entity_name: &capability.name,
            field: "involved_actors",
            names: strs(&capability.involved_actors),
            kinds: ACTORS,
            severity: GapSeverity::Minor,
        });
    }
    for c in &output.components {
        refs.push(Reference {
            entity_id: &c.id,
            entity_name: &c.name,
            field: "parent_component",
            names: c.parent_component.as_deref().into_iter().collect(),
            kinds: COMPONENTS,
            severity: GapSeverity::Major,
        });
        refs.push(Reference {
            entity_id: &c.id,
            entity_name: &c.name,
            field: "sub_components",
            names: strs(&c.sub_components),
            kinds: COMPONENTS,
            severity: GapSeverity::Minor,
        });
        refs.push(Reference {
            entity_id: &c.id,
            entity_name: &c.name,
            field: "allocated_functions",
            names: strs(&c.allocated_functions),
            kinds: FUNCTIONS,
            severity: GapSeverity::Minor,
        });
    }
    for f in &output.functions {
        refs.push(Reference {
            entity_id: &f.id,
            entity_name: &f.name,
            field: "parent_function",
            names: f.parent_function.as_deref().into_iter().collect(),
            kinds: FUNCTIONS,
            severity: GapSeverity::Major,
        });
        refs.push(Reference {
            entity_id: &f.id,
            entity_name: &f.name,
            field: "sub_functions",
            names: strs(&f.sub_functions),
            kinds: FUNCTIONS,
            severity: GapSeverity::Minor,
        });
        refs.push(Reference {
            entity_id: &f.id,
            entity_name: &f.name,
            field: "allocated_components",
            names: strs(&f.allocated_components),
            kinds: COMPONENTS,
            severity: GapSeverity::Minor,
        });
    }
    for i in &output.interfaces {
        refs.push(Reference {
            entity_id: &i.id,
            entity_name: &i.name,
            field: "provider_component",
            names: i.provider_component.as_deref().into_iter().collect(),
            kinds: COMPONENTS,
            severity: GapSeverity::Minor,
        });
        refs.push(Reference {
            entity_id: &i.id,
            entity_name: &i.name,
            field: "consumer_components",
            names: strs(&i.consumer_components),
            kinds: COMPONENTS,
            severity: GapSeverity::Minor,
        });
    }
    for c in &output.constraints {
        refs.push(Reference {
            entity_id: &c.id,
            entity_name: &c.name,
            field: "affected_components",
            names: strs(&c.affected_components),
            kinds: COMPONENTS,
            severity: GapSeverity::Minor,
        });
    }

    refs.retain(|r| !r.names.is_empty());
    refs
}

fn dangling_references(
    engine: &TraceabilityEngine,
    output: &PhaseOutput,
    phase_nodes: &[TraceNode<'_>],
    collector: &mut GapCollector,
) {
    for reference in same_phase_references(output) {
        for name in reference.names {
            if name.trim().is_empty() {
                continue;
            }
            if engine.resolve(name, phase_nodes, reference.kinds).is_none() {
                collector.push(
                    reference.severity,
                    GapType::DanglingReference,
                    output.phase,
                    Some(reference.entity_id),
                    format!(
                        "'{}' references unknown entity '{}' in {}",
                        reference.entity_name, name, reference.field
                    ),
                    "Add the referenced entity or correct the reference",
                );
            }
        }
    }
}

/// Declared cross-phase names that do not resolve in a phase that is present
fn declared_dangling_references(
    engine: &TraceabilityEngine,
    output: &PhaseOutput,
    nodes: &BTreeMap<Phase, Vec<TraceNode<'_>>>,
    collector: &mut GapCollector,
) {
    for reference in declared_references(output) {
        let Some(candidates) = nodes.get(&reference.target_phase) else {
            continue;
        };
        for name in reference.names {
            if engine.resolve(name, candidates, &[reference.kind]).is_none() {
                collector.push(
                    GapSeverity::Minor,
                    GapType::DanglingReference,
                    output.phase,
                    Some(reference.entity_id),
                    format!(
                        "'{}' references unknown {} entity '{}'",
                        reference.entity_id, reference.target_phase, name
                    ),
                    "Correct the reference or extract the missing entity",
                );
            }
        }
    }
}
