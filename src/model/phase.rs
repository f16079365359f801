//! Arcadia phases and the entity categories each phase extracts

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Arcadia engineering phase, ordered from problem space to implementation
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Operational,
    System,
    Logical,
    Physical,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::Operational,
        Phase::System,
        Phase::Logical,
        Phase::Physical,
    ];

    /// Identifier prefix for entities extracted in this phase
    pub fn prefix(self) -> &'static str {
        match self {
            Phase::Operational => "OA",
            Phase::System => "SA",
            Phase::Logical => "LA",
            Phase::Physical => "PA",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Operational => "operational",
            Phase::System => "system",
            Phase::Logical => "logical",
            Phase::Physical => "physical",
        }
    }

    /// Human readable title used in prompts
    pub fn title(self) -> &'static str {
        match self {
            Phase::Operational => "OPERATIONAL ANALYSIS",
            Phase::System => "SYSTEM ANALYSIS",
            Phase::Logical => "LOGICAL ARCHITECTURE",
            Phase::Physical => "PHYSICAL ARCHITECTURE",
        }
    }

    /// Phase immediately before this one
    pub fn previous(self) -> Option<Phase> {
        match self {
            Phase::Operational => None,
            Phase::System => Some(Phase::Operational),
            Phase::Logical => Some(Phase::System),
            Phase::Physical => Some(Phase::Logical),
        }
    }

    /// All phases strictly before this one, in order
    pub fn prerequisites(self) -> impl Iterator<Item = Phase> {
        Phase::ALL.into_iter().filter(move |p| *p < self)
    }

    /// Entity categories extracted in this phase, in extraction order
    pub fn categories(self) -> &'static [EntityCategory] {
        match self {
            Phase::Operational => &[
                EntityCategory::Actors,
                EntityCategory::Capabilities,
                EntityCategory::Scenarios,
            ],
            Phase::System | Phase::Logical => &[
                EntityCategory::Components,
                EntityCategory::Functions,
                EntityCategory::Interfaces,
                EntityCategory::Scenarios,
            ],
            Phase::Physical => &[
                EntityCategory::Components,
                EntityCategory::Functions,
                EntityCategory::Interfaces,
                EntityCategory::Scenarios,
                EntityCategory::Constraints,
            ],
        }
    }

    /// Vocabulary used to steer retrieval towards material relevant to this phase
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Phase::Operational => &[
                "stakeholder",
                "actor",
                "operational",
                "capability",
                "mission",
                "goal",
                "use case",
            ],
            Phase::System => &[
                "function",
                "requirement",
                "interface",
                "system",
                "constraint",
                "mode",
                "service",
            ],
            Phase::Logical => &[
                "component",
                "logical",
                "behavior",
                "interaction",
                "scenario",
                "exchange",
                "protocol",
            ],
            Phase::Physical => &[
                "physical",
                "implementation",
                "deployment",
                "node",
                "configuration",
                "hardware",
                "software",
            ],
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A group of entities extracted with one oracle request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    Actors,
    Capabilities,
    Components,
    Functions,
    Interfaces,
    Scenarios,
    Constraints,
}

impl EntityCategory {
    pub const ALL: [EntityCategory; 7] = [
        EntityCategory::Actors,
        EntityCategory::Capabilities,
        EntityCategory::Components,
        EntityCategory::Functions,
        EntityCategory::Interfaces,
        EntityCategory::Scenarios,
        EntityCategory::Constraints,
    ];

    /// JSON key the oracle is asked to place the item list under
    pub fn key(self) -> &'static str {
        match self {
            EntityCategory::Actors => "actors",
            EntityCategory::Capabilities => "capabilities",
            EntityCategory::Components => "components",
            EntityCategory::Functions => "functions",
            EntityCategory::Interfaces => "interfaces",
            EntityCategory::Scenarios => "scenarios",
            EntityCategory::Constraints => "constraints",
        }
    }

    /// Middle segment of generated identifiers
    pub fn code(self) -> &'static str {
        match self {
            EntityCategory::Actors => "ACTOR",
            EntityCategory::Capabilities => "CAP",
            EntityCategory::Components => "COMP",
            EntityCategory::Functions => "FUNC",
            EntityCategory::Interfaces => "INTF",
            EntityCategory::Scenarios => "SCEN",
            EntityCategory::Constraints => "CONST",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            EntityCategory::Actors => "ACTOR",
            EntityCategory::Capabilities => "CAPABILITY",
            EntityCategory::Components => "COMPONENT",
            EntityCategory::Functions => "FUNCTION",
            EntityCategory::Interfaces => "INTERFACE",
            EntityCategory::Scenarios => "SCENARIO",
            EntityCategory::Constraints => "CONSTRAINT",
        }
    }
}

impl fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Build the identifier for the `sequence`-th accepted entity (1-based)
pub fn entity_id(phase: Phase, category: EntityCategory, sequence: usize) -> String {
    format!("{}-{}-{:03}", phase.prefix(), category.code(), sequence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_format() {
        assert_eq!(
            entity_id(Phase::Logical, EntityCategory::Components, 1),
            "LA-COMP-001"
        );
        assert_eq!(
            entity_id(Phase::Operational, EntityCategory::Actors, 12),
            "OA-ACTOR-012"
        );
        assert_eq!(
            entity_id(Phase::Physical, EntityCategory::Constraints, 1000),
            "PA-CONST-1000"
        );
    }

    #[test]
    fn test_phase_ordering_and_prerequisites() {
        assert!(Phase::Operational < Phase::System);
        assert!(Phase::Logical < Phase::Physical);
        assert_eq!(
            Phase::Logical.prerequisites().collect::<Vec<_>>(),
            vec![Phase::Operational, Phase::System]
        );
        assert_eq!(Phase::Operational.prerequisites().count(), 0);
        assert_eq!(Phase::Physical.previous(), Some(Phase::Logical));
    }

    #[test]
    fn test_every_category_belongs_to_some_phase() {
        for category in EntityCategory::ALL {
            assert!(Phase::ALL.iter().any(|p| p.categories().contains(&category)));
        }
        assert!(!Phase::Operational.categories().contains(&EntityCategory::Components));
        assert!(Phase::Physical.categories().contains(&EntityCategory::Constraints));
    }
}
