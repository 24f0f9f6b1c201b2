//! Trauma definitions and the catalog that owns them.

use std::collections::BTreeMap;
use std::fmt;

use blightward_core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Broad family a trauma belongs to. Trauma checks draw from one family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TraumaCategory {
    /// Damage to reasoning and perception.
    Cognitive,
    /// Grief, guilt, fear.
    Emotional,
    /// Loss of meaning or grip on reality.
    Existential,
    /// Damage to trust and relationships.
    Social,
    /// Marks left by the Blight.
    Corruption,
    /// Lasting bodily harm.
    Physical,
}

impl TraumaCategory {
    /// Every category, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Cognitive,
        Self::Emotional,
        Self::Existential,
        Self::Social,
        Self::Corruption,
        Self::Physical,
    ];
}

impl fmt::Display for TraumaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// When holding a trauma forces a character out of play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetirementRule {
    /// Never forces retirement on its own.
    #[default]
    Never,
    /// Forces retirement as soon as it is acquired.
    Immediate,
    /// Forces retirement once stacked this many times.
    AtStack {
        /// Stack count at which retirement becomes mandatory.
        stacks: u32,
    },
}

/// What an effect modifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraumaEffectType {
    /// Extra stress from a class of sources.
    StressModifier,
    /// Flat penalty to a skill.
    SkillPenalty,
    /// Flat penalty to an attribute.
    AttributePenalty,
    /// Percentage cut to rest recovery.
    RestPenalty,
    /// Extra corruption from a class of sources.
    CorruptionModifier,
    /// A behavioral compulsion the player must roleplay or resist.
    Behavior,
}

/// One mechanical effect of a trauma.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraumaEffect {
    /// What kind of modification.
    pub effect_type: TraumaEffectType,
    /// The skill, attribute or source the effect applies to.
    pub target: String,
    /// Magnitude; units depend on `effect_type`.
    pub value: i32,
    /// When the effect applies, if not always.
    #[serde(default)]
    pub condition: Option<String>,
    /// Player-facing description.
    pub description: String,
}

/// A catalog entry describing one trauma.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraumaDefinition {
    /// Stable identifier, matched case-insensitively.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Family used by trauma checks.
    pub category: TraumaCategory,
    /// Player-facing description.
    pub description: String,
    /// Whether repeat acquisition stacks.
    #[serde(default)]
    pub stackable: bool,
    /// Retirement behavior.
    #[serde(default)]
    pub retirement: RetirementRule,
    /// Mechanical effects.
    #[serde(default)]
    pub effects: Vec<TraumaEffect>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    traumas: Vec<TraumaDefinition>,
}

/// Lookup table of trauma definitions keyed by lower-cased id.
#[derive(Debug, Clone, Default)]
pub struct TraumaCatalog {
    definitions: BTreeMap<String, TraumaDefinition>,
}

/// Normalizes a trauma id for lookup.
#[must_use]
pub fn normalize_id(id: &str) -> String {
    id.trim().to_lowercase()
}

impl TraumaCatalog {
    /// Builds a catalog from definitions.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Configuration` if two definitions share an id or
    /// an id is blank.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = TraumaDefinition>,
    ) -> Result<Self, DomainError> {
        let mut map = BTreeMap::new();
        for mut definition in definitions {
            let key = normalize_id(&definition.id);
            if key.is_empty() {
                return Err(DomainError::Configuration(
                    "trauma definition with empty id".to_owned(),
                ));
            }
            definition.id.clone_from(&key);
            if map.insert(key.clone(), definition).is_some() {
                return Err(DomainError::Configuration(format!(
                    "duplicate trauma id: {key}"
                )));
            }
        }
        Ok(Self { definitions: map })
    }

    /// Parses a catalog from YAML of the form `traumas: [...]`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Configuration` if the YAML is malformed or
    /// contains duplicate ids.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, DomainError> {
        let file: CatalogFile = serde_yaml::from_str(yaml)
            .map_err(|e| DomainError::Configuration(format!("trauma catalog: {e}")))?;
        Self::from_definitions(file.traumas)
    }

    /// Looks up a definition by id, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` when no definition has that id.
    pub fn get(&self, id: &str) -> Result<&TraumaDefinition, DomainError> {
        self.definitions
            .get(&normalize_id(id))
            .ok_or_else(|| DomainError::not_found("trauma definition", id))
    }

    /// Definitions in a category, ordered by id.
    #[must_use]
    pub fn in_category(&self, category: TraumaCategory) -> Vec<&TraumaDefinition> {
        self.definitions
            .values()
            .filter(|d| d.category == category)
            .collect()
    }

    /// All definitions, ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &TraumaDefinition> {
        self.definitions.values()
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the catalog has no definitions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Lists every completeness problem in the catalog.
    #[must_use]
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for category in TraumaCategory::ALL {
            if self.in_category(category).is_empty() {
                problems.push(format!("no traumas in category {category}"));
            }
        }
        for definition in self.definitions.values() {
            if definition.name.trim().is_empty() {
                problems.push(format!("trauma {} has no name", definition.id));
            }
            if let RetirementRule::AtStack { stacks } = definition.retirement {
                if !definition.stackable {
                    problems.push(format!(
                        "trauma {} has a stack retirement rule but is not stackable",
                        definition.id
                    ));
                }
                if stacks < 2 {
                    problems.push(format!(
                        "trauma {} retires at {stacks} stacks; use immediate instead",
                        definition.id
                    ));
                }
            }
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r"
traumas:
  - id: Paranoia
    name: Paranoia
    category: Cognitive
    description: Everyone is watching.
    stackable: true
    retirement:
      kind: at_stack
      stacks: 5
    effects:
      - effect_type: SkillPenalty
        target: persuasion
        value: 1
        description: Distrust bleeds into every conversation.
  - id: reality_unmoored
    name: Reality Unmoored
    category: Existential
    description: Nothing is real.
    retirement:
      kind: immediate
";

    #[test]
    fn test_from_yaml_parses_retirement_rules() {
        let catalog = TraumaCatalog::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.get("paranoia").unwrap().retirement,
            RetirementRule::AtStack { stacks: 5 }
        );
        assert_eq!(
            catalog.get("reality_unmoored").unwrap().retirement,
            RetirementRule::Immediate
        );
    }

    #[test]
    fn test_get_is_case_insensitive() {
        let catalog = TraumaCatalog::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(catalog.get("PARANOIA").unwrap().id, "paranoia");
    }

    #[test]
    fn test_get_unknown_id_is_not_found() {
        let catalog = TraumaCatalog::from_yaml_str(SAMPLE).unwrap();
        match catalog.get("nope").unwrap_err() {
            DomainError::NotFound { kind, id } => {
                assert_eq!(kind, "trauma definition");
                assert_eq!(id, "nope");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let yaml = r"
traumas:
  - { id: a, name: A, category: Social, description: x }
  - { id: A, name: A2, category: Social, description: y }
";
        match TraumaCatalog::from_yaml_str(yaml).unwrap_err() {
            DomainError::Configuration(msg) => assert_eq!(msg, "duplicate trauma id: a"),
            other => panic!("expected Configuration, got {other:?}"),
        }
    }

    #[test]
    fn test_problems_report_empty_categories() {
        let catalog = TraumaCatalog::from_yaml_str(SAMPLE).unwrap();
        let problems = catalog.problems();
        assert!(problems.contains(&"no traumas in category Emotional".to_owned()));
        assert!(!problems.iter().any(|p| p.contains("Cognitive")));
    }

    #[test]
    fn test_problems_flag_stack_rule_on_non_stackable() {
        let yaml = r"
traumas:
  - id: odd
    name: Odd
    category: Social
    description: x
    retirement: { kind: at_stack, stacks: 3 }
";
        let catalog = TraumaCatalog::from_yaml_str(yaml).unwrap();
        assert!(
            catalog
                .problems()
                .contains(&"trauma odd has a stack retirement rule but is not stackable".to_owned())
        );
    }

    #[test]
    fn test_in_category_ordered_by_id() {
        let yaml = r"
traumas:
  - { id: zeta, name: Z, category: Social, description: x }
  - { id: alpha, name: A, category: Social, description: y }
";
        let catalog = TraumaCatalog::from_yaml_str(yaml).unwrap();
        let ids: Vec<&str> = catalog
            .in_category(TraumaCategory::Social)
            .iter()
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(ids, vec!["alpha", "zeta"]);
    }
}
