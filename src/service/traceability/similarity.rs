//! Lexical similarity between entity names and descriptions

use std::collections::HashSet;

use crate::model::TraceNode;
use crate::model::config::TraceabilityConfig;

const NAME_STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
];

const TEXT_STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "up", "about", "into", "through", "during", "before", "after", "above", "below",
    "is", "are", "was", "were", "be", "have", "has", "had", "do", "does", "did", "will",
    "would", "could", "should", "may", "might", "must", "can", "this", "that", "these", "those",
];

/// Architecture vocabulary kept even when short
const DOMAIN_TERMS: &[&str] = &[
    "system", "component", "function", "capability", "actor", "interface", "requirement",
    "specification", "architecture", "design", "model", "operational", "logical", "physical",
    "performance", "security", "data", "process", "workflow", "scenario", "constraint",
    "validation",
];

/// Weight applied to word-overlap matches of names
const NAME_OVERLAP_BOOST: f64 = 1.2;

/// Groups of words treated as interchangeable in entity names
const SYNONYM_GROUPS: &[&[&str]] = &[
    &["monitor", "observe", "watch", "track", "surveillance"],
    &["process", "handle", "manage", "execute", "perform"],
    &["user", "operator", "actor", "stakeholder", "participant"],
    &["system", "platform", "infrastructure", "framework"],
    &["security", "protection", "safety", "defense"],
    &["data", "information", "content", "payload"],
    &["interface", "connection", "link", "communication"],
    &["control", "command", "manage", "govern", "regulate"],
    &["analyze", "evaluate", "assess", "examine", "review"],
    &["network", "communication", "connectivity", "transmission"],
];

const SYNONYM_SCORE: f64 = 0.8;

/// Score for words sharing a three-letter prefix or suffix
const ROOT_SCORE: f64 = 0.4;

/// Weight of the character-overlap fallback
const CHARACTER_WEIGHT: f64 = 0.6;

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Similarity of two names in [0, 1]
///
/// Exact match scores 1.0, containment 0.7 to 0.9 depending on the length
/// ratio, otherwise the boosted word overlap without stop words. Names with no
/// word in common fall back to synonym matching, then to character overlap.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    if a == b {
        return 1.0;
    }

    if a.contains(&b) || b.contains(&a) {
        let shorter = a.len().min(b.len()) as f64;
        let longer = a.len().max(b.len()) as f64;
        return 0.7 + (shorter / longer) * 0.2;
    }

    let words_a: HashSet<&str> = a
        .split_whitespace()
        .filter(|w| !NAME_STOP_WORDS.contains(w))
        .collect();
    let words_b: HashSet<&str> = b
        .split_whitespace()
        .filter(|w| !NAME_STOP_WORDS.contains(w))
        .collect();

    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }

    if !words_a.is_disjoint(&words_b) {
        return (jaccard(&words_a, &words_b) * NAME_OVERLAP_BOOST).min(1.0);
    }

    let synonyms = synonym_similarity(&words_a, &words_b);
    if synonyms > 0.0 {
        return synonyms;
    }

    character_similarity(&a, &b) * CHARACTER_WEIGHT
}

fn are_synonyms(a: &str, b: &str) -> bool {
    SYNONYM_GROUPS
        .iter()
        .any(|group| group.contains(&a) && group.contains(&b))
}

fn share_root(a: &str, b: &str) -> bool {
    if a.len() <= 3 || b.len() <= 3 {
        return false;
    }
    fn prefix(w: &str) -> Option<&str> {
        w.get(..3)
    }
    fn suffix(w: &str) -> Option<&str> {
        w.get(w.len() - 3..)
    }
    (prefix(a).is_some() && prefix(a) == prefix(b))
        || (suffix(a).is_some() && suffix(a) == suffix(b))
}

/// Mean pairwise word score over synonyms and shared roots
fn synonym_similarity(words_a: &HashSet<&str>, words_b: &HashSet<&str>) -> f64 {
    let mut score = 0.0;
    for a in words_a {
        for b in words_b {
            if are_synonyms(a, b) {
                score += SYNONYM_SCORE;
            } else if share_root(a, b) {
                score += ROOT_SCORE;
            }
        }
    }
    score / (words_a.len() * words_b.len()) as f64
}

/// Character-set overlap scaled by the length ratio
fn character_similarity(a: &str, b: &str) -> f64 {
    let chars_a: HashSet<char> = a.chars().filter(|c| !c.is_whitespace()).collect();
    let chars_b: HashSet<char> = b.chars().filter(|c| !c.is_whitespace()).collect();
    let union = chars_a.union(&chars_b).count();
    if union == 0 {
        return 0.0;
    }
    let overlap = chars_a.intersection(&chars_b).count() as f64 / union as f64;

    let len_a = a.chars().count() as f64;
    let len_b = b.chars().count() as f64;
    overlap * len_a.min(len_b) / len_a.max(len_b)
}

/// Significant terms of a free-text description
fn key_terms(text: &str) -> HashSet<String> {
    let normalized = normalize(text);
    let terms: HashSet<&str> = normalized
        .split_whitespace()
        .filter(|w| !TEXT_STOP_WORDS.contains(w))
        .collect();

    let weighted: HashSet<String> = terms
        .iter()
        .copied()
        .filter(|t| t.len() >= 3 && (DOMAIN_TERMS.contains(t) || t.len() >= 5))
        .map(|t| t.to_string())
        .collect();

    if weighted.is_empty() {
        terms.into_iter().map(str::to_string).collect()
    } else {
        weighted
    }
}

/// Key-term overlap of two descriptions in [0, 1]
pub fn description_similarity(a: &str, b: &str) -> f64 {
    let terms_a = key_terms(a);
    let terms_b = key_terms(b);
    let a: HashSet<&str> = terms_a.iter().map(String::as_str).collect();
    let b: HashSet<&str> = terms_b.iter().map(String::as_str).collect();
    jaccard(&a, &b)
}

/// Combined similarity of two entities
///
/// A strong name match is never diluted by unrelated descriptions.
pub fn entity_similarity(a: &TraceNode<'_>, b: &TraceNode<'_>, config: &TraceabilityConfig) -> f64 {
    let name = name_similarity(a.name, b.name);
    let description = description_similarity(&a.text, &b.text);
    let total_weight = config.name_weight + config.description_weight;
    let weighted =
        (config.name_weight * name + config.description_weight * description) / total_weight;

    name.max(weighted).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityKind, Phase};

    #[test]
    fn test_exact_and_case_insensitive() {
        assert_eq!(name_similarity("Traffic Controller", "traffic  controller"), 1.0);
        assert_eq!(name_similarity("", "Controller"), 0.0);
    }

    #[test]
    fn test_substring_range() {
        let score = name_similarity("Traffic Flow Control", "Traffic Flow Control Function");
        assert!(score > 0.7 && score < 0.9, "score was {}", score);
    }

    #[test]
    fn test_word_overlap_ignores_stop_words() {
        // {signal, timing} vs {signal, controller}: 1/3 * 1.2
        let score = name_similarity("Timing of the Signal", "Signal Controller");
        assert!((score - 0.4).abs() < 1e-9, "score was {}", score);
        assert_eq!(name_similarity("of the", "Signal Controller"), 0.0);
    }

    #[test]
    fn test_synonym_fallback() {
        // monitor/watch are synonyms, the other three pairs score nothing
        let score = name_similarity("Queue Monitor", "Watch Lane");
        assert!((score - 0.2).abs() < 1e-9, "score was {}", score);

        let score = name_similarity("Operator", "User");
        assert!((score - 0.8).abs() < 1e-9, "score was {}", score);
    }

    #[test]
    fn test_shared_root_counts_half_a_synonym() {
        // "signaling" and "signals" share a prefix, "unit" and "console" nothing
        let score = name_similarity("Signaling Unit", "Signals Console");
        assert!((score - 0.1).abs() < 1e-9, "score was {}", score);
    }

    #[test]
    fn test_character_fallback_stays_below_default_threshold() {
        let score = name_similarity("Pedestrian Button", "Vehicle Detector");
        assert!(score > 0.0 && score < 0.5, "score was {}", score);
        assert_eq!(name_similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn test_description_similarity_uses_key_terms() {
        let score = description_similarity(
            "Coordinates the signal timing across intersections",
            "The controller coordinates signal timing",
        );
        assert!(score > 0.4, "score was {}", score);
        assert_eq!(description_similarity("", "anything"), 0.0);
    }

    #[test]
    fn test_entity_similarity_prefers_name_match() {
        let config = TraceabilityConfig::default();
        let a = TraceNode {
            phase: Phase::System,
            kind: EntityKind::Component,
            id: "SA-COMP-001",
            name: "Signal Controller",
            text: "Controls lamps".to_string(),
        };
        let b = TraceNode {
            phase: Phase::Logical,
            kind: EntityKind::Component,
            id: "LA-COMP-001",
            name: "Signal Controller",
            text: "Unrelated words entirely".to_string(),
        };
        assert_eq!(entity_similarity(&a, &b, &config), 1.0);
    }
}
