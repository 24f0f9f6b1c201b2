//! The CPS panic table.
//!
//! Rolled when a character's Cognitive Paradox Syndrome reaches a
//! panic-eligible stage. Entries describe what must happen; applying the
//! statuses and forced actions is the combat layer's job.

use blightward_core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Named panic outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PanicEffect {
    /// Locked in place, unable to act.
    Frozen,
    /// Screams, alerting everything nearby.
    Scream,
    /// Runs from the source of fear.
    Flee,
    /// Curls up on the ground.
    Fetal,
    /// Passes out.
    Blackout,
    /// Refuses to acknowledge what is happening.
    Denial,
    /// Lashes out at whoever is closest.
    Violence,
    /// Shuts down completely.
    Catatonia,
    /// Acts without intent.
    Dissociation,
    /// Holds it together this time.
    Composure,
}

/// Status the combat layer must apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusEffect {
    /// Loses the next action.
    Stunned,
    /// Knocked down.
    Prone,
    /// Out cold.
    Unconscious,
}

/// Action the combat layer must take on the character's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForcedAction {
    /// Move away from whatever caused the panic.
    FleeFromSource,
    /// Attack the nearest creature, friend or foe.
    AttackNearest,
    /// Pick an action at random.
    RandomAction,
}

/// One row of the panic table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanicEntry {
    /// Die face that selects this row.
    pub roll: u32,
    /// Outcome.
    pub effect: PanicEffect,
    /// Display name.
    pub name: String,
    /// Player-facing description.
    pub description: String,
    /// How many turns the effect lasts; 0 for instant.
    #[serde(default)]
    pub duration_turns: u32,
    /// Statuses to apply.
    #[serde(default)]
    pub statuses: Vec<StatusEffect>,
    /// Action forced on the character, if any.
    #[serde(default)]
    pub forced_action: Option<ForcedAction>,
}

#[derive(Debug, Deserialize)]
struct PanicTableFile {
    entries: Vec<PanicEntry>,
}

/// Panic table keyed by die face.
#[derive(Debug, Clone, Default)]
pub struct PanicTable {
    entries: Vec<PanicEntry>,
}

impl PanicTable {
    /// Builds a table, ordering entries by roll.
    #[must_use]
    pub fn new(mut entries: Vec<PanicEntry>) -> Self {
        entries.sort_by_key(|e| e.roll);
        Self { entries }
    }

    /// Parses a table from YAML of the form `entries: [...]`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Configuration` if the YAML is malformed.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, DomainError> {
        let file: PanicTableFile = serde_yaml::from_str(yaml)
            .map_err(|e| DomainError::Configuration(format!("panic table: {e}")))?;
        Ok(Self::new(file.entries))
    }

    /// Sides on the die that rolls against this table.
    #[must_use]
    pub fn die_sides(&self) -> u32 {
        u32::try_from(self.entries.len()).unwrap_or(u32::MAX)
    }

    /// Entry for a die face.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` when no row has that face.
    pub fn entry_for(&self, roll: u32) -> Result<&PanicEntry, DomainError> {
        self.entries
            .iter()
            .find(|e| e.roll == roll)
            .ok_or_else(|| DomainError::not_found("panic table entry", roll))
    }

    /// All rows in roll order.
    #[must_use]
    pub fn entries(&self) -> &[PanicEntry] {
        &self.entries
    }

    /// Lists every completeness problem: the faces must run 1..=n with no
    /// gaps or repeats.
    #[must_use]
    pub fn problems(&self) -> Vec<String> {
        if self.entries.is_empty() {
            return vec!["panic table is empty".to_owned()];
        }
        let mut problems = Vec::new();
        for (expected, entry) in (1..).zip(&self.entries) {
            if entry.roll != expected {
                problems.push(format!(
                    "panic table row {expected} has roll {}",
                    entry.roll
                ));
            }
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r"
entries:
  - roll: 2
    effect: Violence
    name: Paradox Fury
    description: Lash out.
    duration_turns: 1
    forced_action: AttackNearest
  - roll: 1
    effect: Frozen
    name: Logic Lock
    description: Locked.
    duration_turns: 1
    statuses: [Stunned]
";

    #[test]
    fn test_entries_sorted_by_roll() {
        let table = PanicTable::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(table.entries()[0].effect, PanicEffect::Frozen);
        assert_eq!(table.die_sides(), 2);
        assert!(table.problems().is_empty());
    }

    #[test]
    fn test_entry_for_returns_forced_action() {
        let table = PanicTable::from_yaml_str(SAMPLE).unwrap();
        let entry = table.entry_for(2).unwrap();
        assert_eq!(entry.forced_action, Some(ForcedAction::AttackNearest));
    }

    #[test]
    fn test_entry_for_missing_face_is_not_found() {
        let table = PanicTable::from_yaml_str(SAMPLE).unwrap();
        assert!(matches!(
            table.entry_for(7),
            Err(DomainError::NotFound { .. })
        ));
    }

    #[test]
    fn test_problems_detect_gap() {
        let table = PanicTable::new(vec![PanicEntry {
            roll: 2,
            effect: PanicEffect::Scream,
            name: "Involuntary Scream".to_owned(),
            description: String::new(),
            duration_turns: 0,
            statuses: Vec::new(),
            forced_action: None,
        }]);
        assert_eq!(table.problems(), vec!["panic table row 1 has roll 2"]);
    }
}
