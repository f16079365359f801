//! Aggregate traceability quality metrics

use std::collections::{BTreeMap, HashSet};

use crate::model::config::TraceabilityConfig;
use crate::model::{EntityKind, Phase, TraceNode, TraceabilityLink};
use crate::service::traceability::{PHASE_PAIRS, pair_key};

fn coverage_weight(config: &TraceabilityConfig, from: Phase, to: Phase) -> f64 {
    let w = &config.coverage_weights;
    match (from, to) {
        (Phase::Operational, Phase::System) => w.operational_to_system,
        (Phase::System, Phase::Logical) => w.system_to_logical,
        (Phase::Logical, Phase::Physical) => w.logical_to_physical,
        (Phase::Operational, Phase::Physical) => w.operational_to_physical,
        _ => 0.0,
    }
}

/// Compute coverage per phase pair, link density, completeness and mean
/// link confidence
///
/// Pairs whose earlier phase has no traceable entity are not measured and do
/// not contribute to the completeness score.
pub fn compute_metrics(
    config: &TraceabilityConfig,
    nodes: &BTreeMap<Phase, Vec<TraceNode<'_>>>,
    links: &[TraceabilityLink],
) -> BTreeMap<String, f64> {
    let mut metrics = BTreeMap::new();

    let forward: HashSet<(&str, Phase)> = links
        .iter()
        .filter(|l| l.source_phase != l.target_phase)
        .map(|l| (l.source_id.as_str(), l.target_phase))
        .collect();

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for (from, to) in PHASE_PAIRS {
        let (Some(sources), true) = (nodes.get(&from), nodes.contains_key(&to)) else {
            continue;
        };
        let traceable: Vec<&TraceNode<'_>> = sources
            .iter()
            .filter(|n| n.kind != EntityKind::Constraint)
            .collect();
        if traceable.is_empty() {
            continue;
        }

        let covered = traceable
            .iter()
            .filter(|n| forward.contains(&(n.id, to)))
            .count();
        let coverage = covered as f64 / traceable.len() as f64;
        metrics.insert(format!("coverage.{}", pair_key(from, to)), coverage);

        let weight = coverage_weight(config, from, to);
        weighted_sum += weight * coverage;
        weight_total += weight;
    }

    let completeness = if weight_total > 0.0 {
        weighted_sum / weight_total
    } else {
        0.0
    };
    metrics.insert("completeness_score".to_string(), completeness);

    let total_entities: usize = nodes.values().map(Vec::len).sum();
    let density = if total_entities > 0 {
        links.len() as f64 / total_entities as f64
    } else {
        0.0
    };
    metrics.insert("traceability_density".to_string(), density);

    let average_confidence = if links.is_empty() {
        0.0
    } else {
        links.iter().map(|l| l.confidence).sum::<f64>() / links.len() as f64
    };
    metrics.insert("average_link_confidence".to_string(), average_confidence);

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PhaseOutput;
    use crate::service::traceability::TraceabilityEngine;
    use crate::service::traceability::fixtures::*;

    #[test]
    fn test_full_coverage_of_traffic_phases() {
        let engine = TraceabilityEngine::new(TraceabilityConfig::default());
        let report = engine.compute(&traffic_phases());

        assert!(report.metrics["coverage.operational_to_system"] > 0.0);
        assert!(!report.metrics.contains_key("coverage.system_to_logical"));
        // only one pair measured, so completeness equals its coverage
        assert_eq!(
            report.metrics["completeness_score"],
            report.metrics["coverage.operational_to_system"]
        );
        assert!(report.metrics["average_link_confidence"] > 0.5);
    }

    #[test]
    fn test_zero_threshold_gives_full_coverage() {
        let engine =
            TraceabilityEngine::new(TraceabilityConfig::default().with_link_threshold(0.0));
        let report = engine.compute(&traffic_phases());

        assert_eq!(report.metrics["coverage.operational_to_system"], 1.0);
        assert_eq!(report.metrics["completeness_score"], 1.0);
        // 4 links over 4 entities
        assert_eq!(report.metrics["traceability_density"], 1.0);
    }

    #[test]
    fn test_empty_outputs_yield_zero_metrics() {
        let config = TraceabilityConfig::default();
        let outputs = BTreeMap::from([
            (Phase::Operational, PhaseOutput::new(Phase::Operational)),
            (Phase::System, PhaseOutput::new(Phase::System)),
        ]);
        let nodes: BTreeMap<Phase, Vec<TraceNode<'_>>> =
            outputs.iter().map(|(p, o)| (*p, o.nodes())).collect();

        let metrics = compute_metrics(&config, &nodes, &[]);
        assert_eq!(metrics["completeness_score"], 0.0);
        assert_eq!(metrics["traceability_density"], 0.0);
        assert_eq!(metrics["average_link_confidence"], 0.0);
        assert!(!metrics.contains_key("coverage.operational_to_system"));
    }
}
