//! Cognitive Paradox Syndrome.
//!
//! CPS has no value of its own. Its stage is read off the character's
//! stress through a fixed table, so it can never drift from stress.

use blightward_content::panic::{PanicEntry, PanicTable};
use blightward_core::dice::DiceSource;
use blightward_core::error::{DomainError, Rejection};
use serde::{Deserialize, Serialize};

use super::character::Character;
use super::meter::{TierBand, TierTable};

/// CPS stages, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CpsStage {
    /// Stress 0–19.
    None,
    /// Stress 20–39.
    WeightOfKnowing,
    /// Stress 40–59.
    GlimmerMadness,
    /// Stress 60–79.
    RuinMadness,
    /// Stress 80–100.
    HollowShell,
}

/// Effects of a CPS stage.
#[derive(Debug)]
pub struct CpsEffects {
    /// Disadvantage dice on logic checks.
    pub logic_disadvantage: i32,
    /// The panic table is rolled at turn end.
    pub panic_eligible: bool,
    /// The stage can still be treated.
    pub recoverable: bool,
}

static CPS_STAGES: TierTable<CpsStage, CpsEffects> = TierTable::new(&[
    TierBand {
        tier: CpsStage::None,
        floor: 0,
        effects: CpsEffects {
            logic_disadvantage: 0,
            panic_eligible: false,
            recoverable: true,
        },
    },
    TierBand {
        tier: CpsStage::WeightOfKnowing,
        floor: 20,
        effects: CpsEffects {
            logic_disadvantage: 0,
            panic_eligible: false,
            recoverable: true,
        },
    },
    TierBand {
        tier: CpsStage::GlimmerMadness,
        floor: 40,
        effects: CpsEffects {
            logic_disadvantage: 1,
            panic_eligible: false,
            recoverable: true,
        },
    },
    TierBand {
        tier: CpsStage::RuinMadness,
        floor: 60,
        effects: CpsEffects {
            logic_disadvantage: 2,
            panic_eligible: true,
            recoverable: false,
        },
    },
    TierBand {
        tier: CpsStage::HollowShell,
        floor: 80,
        effects: CpsEffects {
            logic_disadvantage: 3,
            panic_eligible: true,
            recoverable: false,
        },
    },
]);

/// CPS stage for a stress value.
#[must_use]
pub fn stage_for(stress: i32) -> CpsStage {
    CPS_STAGES.tier_for(stress)
}

/// Effects for a stress value.
#[must_use]
pub fn effects_for(stress: i32) -> &'static CpsEffects {
    CPS_STAGES.effects_for(stress)
}

/// How urgently a stage needs treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Urgency {
    /// Nothing to treat.
    None,
    /// Treat at the next opportunity.
    Low,
    /// Treat before the next expedition.
    High,
    /// Beyond treatment.
    Critical,
}

/// Treatment guidance for a CPS stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryProtocol {
    /// Stage the protocol is for.
    pub stage: CpsStage,
    /// Protocol name.
    pub name: &'static str,
    /// Steps to follow.
    pub steps: &'static [&'static str],
    /// Whether treatment can succeed.
    pub recovery_possible: bool,
    /// How urgent treatment is.
    pub urgency: Urgency,
}

/// Treatment guidance for `stage`.
#[must_use]
pub fn recovery_protocol(stage: CpsStage) -> RecoveryProtocol {
    let (name, steps, recovery_possible, urgency): (
        &'static str,
        &'static [&'static str],
        bool,
        Urgency,
    ) = match stage {
        CpsStage::None => (
            "Standard Mental Health",
            &["No action needed."],
            true,
            Urgency::None,
        ),
        CpsStage::WeightOfKnowing => (
            "Cognitive Hygiene",
            &[
                "Rest 12 to 24 hours away from paradox sources.",
                "Avoid forbidden texts until stress falls below 20.",
            ],
            true,
            Urgency::Low,
        ),
        CpsStage::GlimmerMadness => (
            "Silent Room Protocol",
            &[
                "Isolate for at least 48 hours.",
                "No exposure to paradox or Blight during isolation.",
                "Supervised return to the party.",
            ],
            true,
            Urgency::High,
        ),
        CpsStage::RuinMadness => (
            "Terminal Protocol",
            &[
                "Recovery is no longer possible.",
                "Keep the character away from allies during panic.",
            ],
            false,
            Urgency::Critical,
        ),
        CpsStage::HollowShell => (
            "None",
            &["The character is lost."],
            false,
            Urgency::Critical,
        ),
    };
    RecoveryProtocol {
        stage,
        name,
        steps,
        recovery_possible,
        urgency,
    }
}

/// Read-only CPS view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CpsState {
    /// Current stage.
    pub stage: CpsStage,
    /// Stress the stage was read from.
    pub stress: i32,
    /// Disadvantage dice on logic checks.
    pub logic_disadvantage: i32,
    /// The panic table is active.
    pub panic_eligible: bool,
    /// The stage can still be treated.
    pub recoverable: bool,
}

/// Change in CPS stage between two stress values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CpsStageChange {
    /// Stage before.
    pub previous: CpsStage,
    /// Stage after.
    pub new: CpsStage,
    /// Whether the stage moved.
    pub changed: bool,
    /// Whether the stage got better.
    pub improved: bool,
    /// Entered HollowShell on this change.
    pub entered_hollow_shell: bool,
    /// Entered RuinMadness on this change.
    pub entered_ruin_madness: bool,
    /// Crossed into a panic-eligible stage on this change.
    pub became_critical: bool,
}

/// Result of a panic-table roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PanicRoll {
    /// The table was rolled.
    Rolled {
        /// Die face.
        roll: u32,
        /// Selected row.
        entry: PanicEntry,
    },
    /// The character is not panic-eligible.
    Rejected(Rejection),
}

/// CPS operations.
#[derive(Debug, Clone, Copy)]
pub struct CpsTracker<'a> {
    panic_table: &'a PanicTable,
}

impl<'a> CpsTracker<'a> {
    /// A tracker rolling against `panic_table`.
    #[must_use]
    pub fn new(panic_table: &'a PanicTable) -> Self {
        Self { panic_table }
    }

    /// Current CPS view.
    #[must_use]
    pub fn state(&self, character: &Character) -> CpsState {
        let stress = character.stress.value();
        let effects = effects_for(stress);
        CpsState {
            stage: stage_for(stress),
            stress,
            logic_disadvantage: effects.logic_disadvantage,
            panic_eligible: effects.panic_eligible,
            recoverable: effects.recoverable,
        }
    }

    /// Compares the stages for two stress values.
    #[must_use]
    pub fn check_stage_change(&self, previous_stress: i32, new_stress: i32) -> CpsStageChange {
        let previous = stage_for(previous_stress);
        let new = stage_for(new_stress);
        let changed = previous != new;
        CpsStageChange {
            previous,
            new,
            changed,
            improved: new < previous,
            entered_hollow_shell: changed && new == CpsStage::HollowShell,
            entered_ruin_madness: changed && new == CpsStage::RuinMadness,
            became_critical: !effects_for(previous_stress).panic_eligible
                && effects_for(new_stress).panic_eligible,
        }
    }

    /// Rolls the panic table. Refused unless the character is panic-eligible.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the die lands on a face the table
    /// does not cover.
    pub fn roll_panic_table(
        &self,
        character: &Character,
        dice: &mut dyn DiceSource,
    ) -> Result<PanicRoll, DomainError> {
        let state = self.state(character);
        if !state.panic_eligible {
            return Ok(PanicRoll::Rejected(Rejection::invalid_state(format!(
                "The panic table only applies from Ruin Madness; current stage is {:?}.",
                state.stage
            ))));
        }

        let roll = dice.roll_die(self.panic_table.die_sides());
        let entry = self.panic_table.entry_for(roll)?.clone();
        tracing::info!(
            character_id = %character.id,
            roll,
            effect = ?entry.effect,
            "panic table rolled"
        );
        Ok(PanicRoll::Rolled { roll, entry })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::meter::Meter;
    use blightward_content::RulesContent;
    use blightward_content::panic::{ForcedAction, PanicEffect};
    use blightward_test_support::SequenceDice;
    use uuid::Uuid;

    fn character_with_stress(stress: i32) -> Character {
        let mut character = Character::new(Uuid::new_v4(), "Tester", 3);
        character.stress = Meter::new(stress);
        character
    }

    #[test]
    fn test_stage_mapping() {
        assert_eq!(stage_for(0), CpsStage::None);
        assert_eq!(stage_for(20), CpsStage::WeightOfKnowing);
        assert_eq!(stage_for(59), CpsStage::GlimmerMadness);
        assert_eq!(stage_for(60), CpsStage::RuinMadness);
        assert_eq!(stage_for(100), CpsStage::HollowShell);
    }

    #[test]
    fn test_state_is_derived_from_stress() {
        let content = RulesContent::load_default().unwrap();
        let tracker = CpsTracker::new(&content.panic_table);
        let state = tracker.state(&character_with_stress(65));
        assert_eq!(state.stage, CpsStage::RuinMadness);
        assert_eq!(state.logic_disadvantage, 2);
        assert!(state.panic_eligible);
        assert!(!state.recoverable);
    }

    #[test]
    fn test_check_stage_change_flags_critical_entry() {
        let content = RulesContent::load_default().unwrap();
        let tracker = CpsTracker::new(&content.panic_table);

        let change = tracker.check_stage_change(55, 62);
        assert!(change.changed);
        assert!(change.entered_ruin_madness);
        assert!(change.became_critical);
        assert!(!change.improved);

        let deeper = tracker.check_stage_change(70, 85);
        assert!(deeper.entered_hollow_shell);
        assert!(!deeper.became_critical);

        let better = tracker.check_stage_change(45, 10);
        assert!(better.improved);
    }

    #[test]
    fn test_recovery_protocols() {
        assert_eq!(recovery_protocol(CpsStage::WeightOfKnowing).name, "Cognitive Hygiene");
        assert_eq!(
            recovery_protocol(CpsStage::GlimmerMadness).name,
            "Silent Room Protocol"
        );
        let terminal = recovery_protocol(CpsStage::RuinMadness);
        assert_eq!(terminal.name, "Terminal Protocol");
        assert!(!terminal.recovery_possible);
        assert_eq!(recovery_protocol(CpsStage::HollowShell).urgency, Urgency::Critical);
    }

    #[test]
    fn test_panic_roll_rejected_below_ruin_madness() {
        let content = RulesContent::load_default().unwrap();
        let tracker = CpsTracker::new(&content.panic_table);
        let mut dice = SequenceDice::new(vec![]);

        match tracker
            .roll_panic_table(&character_with_stress(59), &mut dice)
            .unwrap()
        {
            PanicRoll::Rejected(rejection) => assert!(rejection.reason.contains("GlimmerMadness")),
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_panic_roll_selects_entry() {
        let content = RulesContent::load_default().unwrap();
        let tracker = CpsTracker::new(&content.panic_table);
        let mut dice = SequenceDice::new(vec![3]);

        match tracker
            .roll_panic_table(&character_with_stress(72), &mut dice)
            .unwrap()
        {
            PanicRoll::Rolled { roll, entry } => {
                assert_eq!(roll, 3);
                assert_eq!(entry.effect, PanicEffect::Flee);
                assert_eq!(entry.forced_action, Some(ForcedAction::FleeFromSource));
            }
            other => panic!("expected Rolled, got {other:?}"),
        }
    }
}
