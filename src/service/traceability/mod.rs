//! Cross-phase traceability: links, gaps and quality metrics
//!
//! Links always point from the earlier phase to the later one (or, for
//! allocations, from a component to a function of the same phase). They come
//! from two sources: lexical similarity between compatible entity kinds, and
//! names the oracle declared on an entity (`implements_components`,
//! `realizes_functions`, ...). Every link that clears its threshold is kept,
//! so raising a threshold can only remove links.

use std::collections::{BTreeMap, HashMap};

use crate::model::config::TraceabilityConfig;
use crate::model::{
    ConsistencyCheck, EntityKind, Gap, LinkOrigin, LinkType, Phase, PhaseOutput, TraceNode,
    TraceabilityLink,
};

pub mod analysis;
pub mod gaps;
pub mod metrics;
pub mod similarity;

use similarity::{entity_similarity, name_similarity};

/// Phase pairs that are linked, in evaluation order
pub const PHASE_PAIRS: [(Phase, Phase); 4] = [
    (Phase::Operational, Phase::System),
    (Phase::System, Phase::Logical),
    (Phase::Logical, Phase::Physical),
    (Phase::Operational, Phase::Physical),
];

/// Metric-friendly name of a phase pair
pub fn pair_key(from: Phase, to: Phase) -> String {
    format!("{}_to_{}", from, to)
}

/// Link type for a compatible pair of entity kinds
pub fn link_type_for(source: EntityKind, target: EntityKind) -> Option<LinkType> {
    use EntityKind::*;
    match (source, target) {
        (Actor, Component | Function) => Some(LinkType::Realizes),
        (Capability, Component | Function | Scenario) => Some(LinkType::Realizes),
        (Scenario, Scenario) => Some(LinkType::Realizes),
        (Interface, Interface) => Some(LinkType::Supports),
        (Component, Function) | (Function, Component) => Some(LinkType::Allocates),
        (Component, Component) | (Function, Function) => Some(LinkType::Refines),
        _ => None,
    }
}

/// Links, gaps, metrics and architecture checks for one set of phase outputs
#[derive(Debug, Clone, Default)]
pub struct TraceabilityReport {
    pub links: Vec<TraceabilityLink>,
    pub gaps: Vec<Gap>,
    pub metrics: BTreeMap<String, f64>,
    pub consistency_checks: Vec<ConsistencyCheck>,
    pub impact_analysis: BTreeMap<String, Vec<String>>,
}

/// Insertion-ordered link collection keeping the best link per (source, target)
#[derive(Default)]
struct LinkSet {
    links: Vec<TraceabilityLink>,
    index: HashMap<(String, String), usize>,
}

impl LinkSet {
    fn add(&mut self, link: TraceabilityLink) {
        let key = (link.source_id.clone(), link.target_id.clone());
        match self.index.get(&key) {
            Some(&i) => {
                if link.confidence > self.links[i].confidence {
                    self.links[i] = link;
                }
            }
            None => {
                self.index.insert(key, self.links.len());
                self.links.push(link);
            }
        }
    }

    fn into_links(self) -> Vec<TraceabilityLink> {
        self.links
    }
}

/// Computes traceability between extracted phases
pub struct TraceabilityEngine {
    config: TraceabilityConfig,
}

impl TraceabilityEngine {
    pub fn new(config: TraceabilityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TraceabilityConfig {
        &self.config
    }

    /// Minimum similarity for links between `from` and `to`
    pub fn threshold(&self, from: Phase, to: Phase) -> f64 {
        let t = &self.config.thresholds;
        match (from, to) {
            (Phase::Operational, Phase::System) => t.operational_to_system,
            (Phase::System, Phase::Logical) => t.system_to_logical,
            (Phase::Logical, Phase::Physical) => t.logical_to_physical,
            (Phase::Operational, Phase::Physical) => t.operational_to_physical,
            _ => t.declared_reference,
        }
    }

    /// Best candidate of the given kinds whose name matches `name`
    pub(crate) fn resolve<'n, 'a>(
        &self,
        name: &str,
        candidates: &'n [TraceNode<'a>],
        kinds: &[EntityKind],
    ) -> Option<(&'n TraceNode<'a>, f64)> {
        let mut best: Option<(&TraceNode<'a>, f64)> = None;
        for candidate in candidates.iter().filter(|c| kinds.contains(&c.kind)) {
            let score = if name.trim().eq_ignore_ascii_case(candidate.id) {
                1.0
            } else {
                name_similarity(name, candidate.name)
            };
            if score >= self.config.thresholds.declared_reference
                && best.is_none_or(|(_, s)| score > s)
            {
                best = Some((candidate, score));
            }
        }
        best
    }

    /// Compute links, gaps and metrics for the given phase outputs
    pub fn compute(&self, outputs: &BTreeMap<Phase, PhaseOutput>) -> TraceabilityReport {
        let nodes: BTreeMap<Phase, Vec<TraceNode<'_>>> = outputs
            .iter()
            .map(|(phase, output)| (*phase, output.nodes()))
            .collect();

        let mut links = LinkSet::default();
        self.similarity_links(&nodes, &mut links);
        self.declared_links(outputs, &nodes, &mut links);
        self.allocation_links(outputs, &nodes, &mut links);
        let links = links.into_links();

        let gaps = gaps::detect_gaps(self, outputs, &nodes, &links);
        let metrics = metrics::compute_metrics(&self.config, &nodes, &links);
        let consistency_checks = analysis::check_consistency(outputs);
        let impact_analysis = analysis::impact_analysis(outputs);

        tracing::info!(
            phases = outputs.len(),
            links = links.len(),
            gaps = gaps.len(),
            completeness = metrics.get("completeness_score").copied().unwrap_or(0.0),
            "Traceability computed"
        );

        TraceabilityReport {
            links,
            gaps,
            metrics,
            consistency_checks,
            impact_analysis,
        }
    }

    fn similarity_links(&self, nodes: &BTreeMap<Phase, Vec<TraceNode<'_>>>, links: &mut LinkSet) {
        for (from, to) in PHASE_PAIRS {
            let (Some(sources), Some(targets)) = (nodes.get(&from), nodes.get(&to)) else {
                continue;
            };
            let threshold = self.threshold(from, to);
            let before = links.links.len();

            for source in sources {
                for target in targets {
                    let Some(link_type) = link_type_for(source.kind, target.kind) else {
                        continue;
                    };
                    let confidence = entity_similarity(source, target, &self.config);
                    if confidence >= threshold {
                        links.add(TraceabilityLink {
                            source_id: source.id.to_string(),
                            target_id: target.id.to_string(),
                            source_phase: from,
                            target_phase: to,
                            link_type,
                            confidence,
                            origin: LinkOrigin::Similarity,
                        });
                    }
                }
            }

            tracing::debug!(
                pair = %pair_key(from, to),
                threshold = threshold,
                new_links = links.links.len() - before,
                "Similarity links computed"
            );
        }
    }

    fn declared_links(
        &self,
        outputs: &BTreeMap<Phase, PhaseOutput>,
        nodes: &BTreeMap<Phase, Vec<TraceNode<'_>>>,
        links: &mut LinkSet,
    ) {
        for (phase, output) in outputs {
            for reference in declared_references(output) {
                let Some(candidates) = nodes.get(&reference.target_phase) else {
                    continue;
                };
                for name in reference.names {
                    if let Some((source, confidence)) =
                        self.resolve(name, candidates, &[reference.kind])
                    {
                        links.add(TraceabilityLink {
                            source_id: source.id.to_string(),
                            target_id: reference.entity_id.to_string(),
                            source_phase: reference.target_phase,
                            target_phase: *phase,
                            link_type: reference.link_type,
                            confidence,
                            origin: LinkOrigin::Declared,
                        });
                    }
                }
            }
        }
    }

    fn allocation_links(
        &self,
        outputs: &BTreeMap<Phase, PhaseOutput>,
        nodes: &BTreeMap<Phase, Vec<TraceNode<'_>>>,
        links: &mut LinkSet,
    ) {
        for (phase, output) in outputs {
            let Some(candidates) = nodes.get(phase) else {
                continue;
            };
            let mut add = |component_id: &str, function_id: &str, confidence: f64| {
                links.add(TraceabilityLink {
                    source_id: component_id.to_string(),
                    target_id: function_id.to_string(),
                    source_phase: *phase,
                    target_phase: *phase,
                    link_type: LinkType::Allocates,
                    confidence,
                    origin: LinkOrigin::Declared,
                });
            };

            for component in &output.components {
                for name in &component.allocated_functions {
                    if let Some((function, score)) =
                        self.resolve(name, candidates, &[EntityKind::Function])
                    {
                        add(&component.id, function.id, score);
                    }
                }
            }
            for function in &output.functions {
                for name in &function.allocated_components {
                    if let Some((component, score)) =
                        self.resolve(name, candidates, &[EntityKind::Component])
                    {
                        add(component.id, &function.id, score);
                    }
                }
            }
        }
    }
}

/// A set of names declared on one entity that point into an earlier phase
pub(crate) struct DeclaredReference<'a> {
    pub entity_id: &'a str,
    pub names: &'a [String],
    pub target_phase: Phase,
    pub kind: EntityKind,
    pub link_type: LinkType,
}

/// Cross-phase references declared on the entities of `output`
pub(crate) fn declared_references(output: &PhaseOutput) -> Vec<DeclaredReference<'_>> {
    let mut refs = Vec::new();
    let Some(previous) = output.phase.previous() else {
        return refs;
    };

    for c in &output.components {
        refs.push(DeclaredReference {
            entity_id: &c.id,
            names: &c.implements_components,
            target_phase: previous,
            kind: EntityKind::Component,
            link_type: LinkType::Refines,
        });
    }
    for f in &output.functions {
        refs.push(DeclaredReference {
            entity_id: &f.id,
            names: &f.realizes_functions,
            target_phase: previous,
            kind: EntityKind::Function,
            link_type: LinkType::Refines,
        });
        refs.push(DeclaredReference {
            entity_id: &f.id,
            names: &f.realizes_capabilities,
            target_phase: Phase::Operational,
            kind: EntityKind::Capability,
            link_type: LinkType::Realizes,
        });
    }
    for i in &output.interfaces {
        refs.push(DeclaredReference {
            entity_id: &i.id,
            names: &i.refines_interfaces,
            target_phase: previous,
            kind: EntityKind::Interface,
            link_type: LinkType::Supports,
        });
    }
    for s in &output.scenarios {
        refs.push(DeclaredReference {
            entity_id: &s.id,
            names: &s.realizes_scenarios,
            target_phase: previous,
            kind: EntityKind::Scenario,
            link_type: LinkType::Realizes,
        });
    }

    refs.retain(|r| !r.names.is_empty());
    refs
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Small hand-built phase outputs for traceability tests

    use super::*;
    use crate::model::{
        Actor, Capability, Component, ComponentType, Function, Interface, InterfaceType,
        Scenario, ScenarioType,
    };

    pub fn actor(id: &str, name: &str, description: &str) -> Actor {
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

    pub fn capability(id: &str, name: &str, description: &str) -> Capability {
        Capability {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            mission_statement: String::new(),
            involved_actors: vec![],
            performance_constraints: vec![],
            source_references: vec![],
        }
    }

    pub fn component(id: &str, name: &str, description: &str) -> Component {
        Component {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            component_type: ComponentType::Subsystem,
            responsibilities: vec![],
            parent_component: None,
            sub_components: vec![],
            allocated_functions: vec![],
            technology_platform: None,
            implements_components: vec![],
            source_references: vec![],
        }
    }

    pub fn function(id: &str, name: &str, description: &str) -> Function {
        Function {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            parent_function: None,
            sub_functions: vec![],
            inputs: vec![],
            outputs: vec![],
            behavioral_specifications: vec![],
            allocated_components: vec![],
            realizes_functions: vec![],
            realizes_capabilities: vec![],
            source_references: vec![],
        }
    }

    pub fn interface(id: &str, name: &str, provider: Option<&str>) -> Interface {
        Interface {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            interface_type: InterfaceType::Data,
            provider_component: provider.map(str::to_string),
            consumer_components: vec![],
            data_specifications: vec![],
            protocol_specifications: vec![],
            quality_attributes: BTreeMap::new(),
            refines_interfaces: vec![],
            source_references: vec![],
        }
    }

    pub fn scenario(id: &str, name: &str, involved: &[&str]) -> Scenario {
        Scenario {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            scenario_type: ScenarioType::Functional,
            involved_components: involved.iter().map(|s| s.to_string()).collect(),
            involved_functions: vec![],
            steps: vec![],
            data_flows: vec![],
            performance_characteristics: BTreeMap::new(),
            realizes_scenarios: vec![],
            source_references: vec![],
        }
    }

    /// Traffic-light operational and system phases that trace cleanly
    pub fn traffic_phases() -> BTreeMap<Phase, PhaseOutput> {
        let mut operational = PhaseOutput::new(Phase::Operational);
        operational
            .actors
            .push(actor("OA-ACTOR-001", "Traffic Operator", "Supervises traffic signals"));
        operational.capabilities.push(capability(
            "OA-CAP-001",
            "Traffic Flow Control",
            "Keep traffic moving safely through the intersection",
        ));

        let mut system = PhaseOutput::new(Phase::System);
        system.components.push(component(
            "SA-COMP-001",
            "Traffic Signal System",
            "Controls the intersection signals",
        ));
        system.functions.push(function(
            "SA-FUNC-001",
            "Traffic Flow Control Function",
            "Sequences signal phases to keep traffic moving",
        ));

        BTreeMap::from([(Phase::Operational, operational), (Phase::System, system)])
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_similar_names_link_across_phases() {
        let engine = TraceabilityEngine::new(TraceabilityConfig::default());
        let report = engine.compute(&traffic_phases());

        let link = report
            .links
            .iter()
            .find(|l| l.source_id == "OA-CAP-001" && l.target_id == "SA-FUNC-001")
            .expect("capability should trace to the system function");
        assert_eq!(link.link_type, LinkType::Realizes);
        assert_eq!(link.origin, LinkOrigin::Similarity);
        assert!(link.confidence >= 0.5 && link.confidence <= 1.0);
        assert!(report.links.iter().all(|l| l.source_phase <= l.target_phase));
    }

    #[test]
    fn test_links_monotone_in_threshold() {
        let outputs = traffic_phases();
        let mut previous: Option<Vec<(String, String)>> = None;

        for threshold in [0.0, 0.2, 0.4, 0.6, 0.8, 1.0] {
            let engine =
                TraceabilityEngine::new(TraceabilityConfig::default().with_link_threshold(threshold));
            let pairs: Vec<(String, String)> = engine
                .compute(&outputs)
                .links
                .into_iter()
                .map(|l| (l.source_id, l.target_id))
                .collect();

            if let Some(prev) = &previous {
                assert!(
                    pairs.iter().all(|p| prev.contains(p)),
                    "links at {} are not a subset of the lower threshold",
                    threshold
                );
            }
            previous = Some(pairs);
        }
    }

    #[test]
    fn test_zero_threshold_links_every_compatible_pair() {
        let engine = TraceabilityEngine::new(TraceabilityConfig::default().with_link_threshold(0.0));
        let report = engine.compute(&traffic_phases());
        // actor and capability each link to the component and the function
        let cross: Vec<_> = report
            .links
            .iter()
            .filter(|l| l.source_phase != l.target_phase)
            .collect();
        assert_eq!(cross.len(), 4);
    }

    #[test]
    fn test_declared_reference_creates_link() {
        let mut outputs = traffic_phases();
        let mut logical = PhaseOutput::new(Phase::Logical);
        let mut controller = component("LA-COMP-001", "Phase Sequencer", "Orders phases");
        controller.implements_components = vec!["Traffic Signal System".to_string()];
        logical.components.push(controller);
        outputs.insert(Phase::Logical, logical);

        let engine = TraceabilityEngine::new(TraceabilityConfig::default());
        let report = engine.compute(&outputs);

        let link = report
            .links
            .iter()
            .find(|l| l.source_id == "SA-COMP-001" && l.target_id == "LA-COMP-001")
            .unwrap();
        assert_eq!(link.link_type, LinkType::Refines);
        assert_eq!(link.origin, LinkOrigin::Declared);
        assert_eq!(link.confidence, 1.0);
    }

    #[test]
    fn test_allocation_links_within_phase() {
        let mut system = PhaseOutput::new(Phase::System);
        let mut controller = component("SA-COMP-001", "Controller", "Controls");
        controller.allocated_functions = vec!["Switch Lights".to_string()];
        system.components.push(controller);
        system
            .functions
            .push(function("SA-FUNC-001", "Switch Lights", "Changes lamp state"));

        let engine = TraceabilityEngine::new(TraceabilityConfig::default());
        let report = engine.compute(&BTreeMap::from([(Phase::System, system)]));

        assert_eq!(report.links.len(), 1);
        assert_eq!(report.links[0].link_type, LinkType::Allocates);
        assert_eq!(report.links[0].source_phase, Phase::System);
        assert_eq!(report.links[0].target_phase, Phase::System);
    }

    #[test]
    fn test_duplicate_pairs_keep_highest_confidence() {
        let mut set = LinkSet::default();
        let link = |confidence: f64, origin: LinkOrigin| TraceabilityLink {
            source_id: "SA-COMP-001".to_string(),
            target_id: "LA-COMP-001".to_string(),
            source_phase: Phase::System,
            target_phase: Phase::Logical,
            link_type: LinkType::Refines,
            confidence,
            origin,
        };
        set.add(link(0.6, LinkOrigin::Similarity));
        set.add(link(0.9, LinkOrigin::Declared));
        set.add(link(0.7, LinkOrigin::Similarity));

        let links = set.into_links();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].confidence, 0.9);
        assert_eq!(links[0].origin, LinkOrigin::Declared);
    }
}
