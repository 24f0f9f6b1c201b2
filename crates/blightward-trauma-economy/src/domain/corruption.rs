//! Corruption: the Blight's near-permanent hold on a character.
//!
//! Corruption cuts maximum HP and AP, shrinks resolve pools, locks faction
//! standing at 50, and at 100 forces a terminal-error survival check.
//! Removal is rare and always explicit.

use blightward_content::config::CorruptionRules;
use blightward_core::dice::DiceSource;
use blightward_core::error::{DomainError, Rejection, ensure_non_negative, ensure_not_blank};
use serde::{Deserialize, Serialize};

use super::character::Character;
use super::meter::{METER_MAX, MeterKind, ResourceKind, ThresholdCrossing, TierBand, TierTable};

/// Corruption at which faction standing locks.
pub const FACTION_LOCK_THRESHOLD: i32 = 50;

/// Highest resolve-dice penalty corruption can impose.
pub const MAX_RESOLVE_PENALTY: i32 = 5;

/// Corruption stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CorruptionStage {
    /// 0–19.
    Uncorrupted,
    /// 20–39.
    Tainted,
    /// 40–59.
    Infected,
    /// 60–79.
    Blighted,
    /// 80–99.
    Corrupted,
    /// Exactly 100.
    Consumed,
}

/// Effects of a corruption stage.
#[derive(Debug)]
pub struct CorruptionEffects {
    /// Bonus to tech checks.
    pub tech_bonus: i32,
    /// Penalty to social checks (non-positive).
    pub social_penalty: i32,
}

static CORRUPTION_STAGES: TierTable<CorruptionStage, CorruptionEffects> = TierTable::new(&[
    TierBand {
        tier: CorruptionStage::Uncorrupted,
        floor: 0,
        effects: CorruptionEffects {
            tech_bonus: 0,
            social_penalty: 0,
        },
    },
    TierBand {
        tier: CorruptionStage::Tainted,
        floor: 20,
        effects: CorruptionEffects {
            tech_bonus: 1,
            social_penalty: -1,
        },
    },
    TierBand {
        tier: CorruptionStage::Infected,
        floor: 40,
        effects: CorruptionEffects {
            tech_bonus: 2,
            social_penalty: -2,
        },
    },
    TierBand {
        tier: CorruptionStage::Blighted,
        floor: 60,
        effects: CorruptionEffects {
            tech_bonus: 2,
            social_penalty: -2,
        },
    },
    TierBand {
        tier: CorruptionStage::Corrupted,
        floor: 80,
        effects: CorruptionEffects {
            tech_bonus: 2,
            social_penalty: -2,
        },
    },
    TierBand {
        tier: CorruptionStage::Consumed,
        floor: 100,
        effects: CorruptionEffects {
            tech_bonus: 0,
            social_penalty: 0,
        },
    },
]);

/// Meter kind for Corruption.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Corruption;

impl MeterKind for Corruption {
    type Tier = CorruptionStage;
    type Effects = CorruptionEffects;
    const RESOURCE: ResourceKind = ResourceKind::Corruption;

    fn table() -> &'static TierTable<CorruptionStage, CorruptionEffects> {
        &CORRUPTION_STAGES
    }
}

/// Where corruption came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorruptionSource {
    /// Using a heretical ability.
    HereticalAbility,
    /// Standing in Blight-touched ground.
    BlightExposure,
    /// Reading what should not be read.
    ForbiddenKnowledge,
    /// Carrying or wielding a corrupted artifact.
    CorruptedArtifact,
    /// Taken on from another character.
    BlightTransfer,
    /// Ambient contamination.
    Environmental,
    /// Backlash from a coherence cascade.
    CoherenceCascade,
}

/// Max HP percentage lost: 5% per full 10 corruption.
#[must_use]
pub fn hp_penalty_percent(corruption: i32) -> i32 {
    (corruption / 10) * 5
}

/// Max AP percentage lost: 5% per full 10 corruption.
#[must_use]
pub fn ap_penalty_percent(corruption: i32) -> i32 {
    (corruption / 10) * 5
}

/// Dice removed from resolve pools: one per full 20, capped.
#[must_use]
pub fn resolve_penalty(corruption: i32) -> i32 {
    (corruption / 20).min(MAX_RESOLVE_PENALTY)
}

/// WILL after the corruption resolve penalty, never below one die.
#[must_use]
pub fn resolve_pool(will: u32, corruption: i32) -> u32 {
    let penalty = u32::try_from(resolve_penalty(corruption)).unwrap_or(0);
    will.saturating_sub(penalty).max(1)
}

/// Read-only view of a character's corruption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorruptionState {
    /// Current value.
    pub value: i32,
    /// Current stage.
    pub stage: CorruptionStage,
    /// Max HP percentage lost.
    pub hp_penalty_percent: i32,
    /// Max AP percentage lost.
    pub ap_penalty_percent: i32,
    /// Dice removed from resolve pools.
    pub resolve_penalty: i32,
    /// Bonus to tech checks.
    pub tech_bonus: i32,
    /// Penalty to social checks.
    pub social_penalty: i32,
    /// Faction standing is locked.
    pub faction_locked: bool,
    /// A terminal-error check is owed.
    pub terminal_error_eligible: bool,
    /// Whether the character has been lost to the Blight.
    pub forlorn: bool,
}

/// Outcome of gaining corruption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorruptionGain {
    /// Where the corruption came from.
    pub source: CorruptionSource,
    /// Meter movement.
    pub crossing: ThresholdCrossing<CorruptionStage>,
    /// A milestone reached for the first time ever, if any.
    pub milestone_reached: Option<i32>,
    /// Faction standing locked on this call.
    pub faction_lock_gained: bool,
    /// Corruption is at 100; the caller owes a terminal-error check.
    pub terminal_error_triggered: bool,
}

/// Outcome of removing corruption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CorruptionRemoval {
    /// Corruption was removed.
    Removed {
        /// Why it was removed.
        reason: String,
        /// Meter movement.
        crossing: ThresholdCrossing<CorruptionStage>,
    },
    /// Nothing was removed.
    Rejected(Rejection),
}

/// Outcome of moving corruption between characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CorruptionTransfer {
    /// Corruption moved.
    Transferred {
        /// Source meter movement.
        source: ThresholdCrossing<CorruptionStage>,
        /// Target gain.
        target: CorruptionGain,
    },
    /// Nothing moved.
    Rejected(Rejection),
}

/// Outcome of a terminal-error survival check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TerminalErrorCheck {
    /// The character held on; corruption dropped to 99.
    Survived {
        /// Dice rolled.
        pool_size: u32,
        /// Net successes.
        successes: u32,
        /// Successes required.
        dc: u32,
        /// Meter movement.
        crossing: ThresholdCrossing<CorruptionStage>,
    },
    /// The character is lost to the Blight.
    Forlorn {
        /// Dice rolled.
        pool_size: u32,
        /// Net successes.
        successes: u32,
        /// Successes required.
        dc: u32,
    },
    /// Corruption is not at 100.
    Rejected(Rejection),
}

/// Corruption operations.
#[derive(Debug, Clone, Copy)]
pub struct CorruptionTracker<'a> {
    rules: &'a CorruptionRules,
}

impl<'a> CorruptionTracker<'a> {
    /// A tracker using `rules`.
    #[must_use]
    pub fn new(rules: &'a CorruptionRules) -> Self {
        Self { rules }
    }

    /// Current corruption view.
    #[must_use]
    pub fn state(&self, character: &Character) -> CorruptionState {
        let meter = &character.corruption;
        let value = meter.value();
        let effects = meter.effects();
        CorruptionState {
            value,
            stage: meter.tier(),
            hp_penalty_percent: hp_penalty_percent(value),
            ap_penalty_percent: ap_penalty_percent(value),
            resolve_penalty: resolve_penalty(value),
            tech_bonus: effects.tech_bonus,
            social_penalty: effects.social_penalty,
            faction_locked: value >= FACTION_LOCK_THRESHOLD,
            terminal_error_eligible: meter.is_extreme(),
            forlorn: character.forlorn,
        }
    }

    /// Adds corruption.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if `amount` is negative.
    pub fn add_corruption(
        &self,
        character: &mut Character,
        amount: i32,
        source: CorruptionSource,
    ) -> Result<CorruptionGain, DomainError> {
        ensure_non_negative(amount, "corruption amount")?;
        let crossing = character.corruption.gain(amount);

        // Lowest milestone first; one per call.
        let milestone_reached = self
            .rules
            .milestones
            .iter()
            .copied()
            .filter(|&m| crossing.previous_value < m && crossing.new_value >= m)
            .find(|&m| character.one_shots.fire_once(ResourceKind::Corruption, m));

        let faction_lock_gained = crossing.previous_value < FACTION_LOCK_THRESHOLD
            && crossing.new_value >= FACTION_LOCK_THRESHOLD;

        tracing::debug!(
            character_id = %character.id,
            ?source,
            applied = crossing.applied,
            corruption = crossing.new_value,
            ?milestone_reached,
            "corruption added"
        );

        Ok(CorruptionGain {
            source,
            terminal_error_triggered: crossing.extreme,
            crossing,
            milestone_reached,
            faction_lock_gained,
        })
    }

    /// Removes corruption. Refused when there is none, or when more is
    /// requested than the character carries.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if `amount` is negative or
    /// `reason` is blank.
    pub fn remove_corruption(
        &self,
        character: &mut Character,
        amount: i32,
        reason: &str,
    ) -> Result<CorruptionRemoval, DomainError> {
        ensure_non_negative(amount, "corruption amount")?;
        ensure_not_blank(reason, "removal reason")?;

        let current = character.corruption.value();
        if current == 0 {
            return Ok(CorruptionRemoval::Rejected(Rejection::no_op(
                "There is no corruption to remove.",
            )));
        }
        if amount > current {
            return Ok(CorruptionRemoval::Rejected(Rejection::no_op(format!(
                "Cannot remove {amount} corruption; only {current} remains."
            ))));
        }

        let crossing = character.corruption.lose(amount);
        tracing::info!(
            character_id = %character.id,
            removed = amount,
            corruption = crossing.new_value,
            reason,
            "corruption removed"
        );
        Ok(CorruptionRemoval::Removed {
            reason: reason.to_owned(),
            crossing,
        })
    }

    /// Moves corruption from one character to another.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if `amount` is not positive or
    /// both characters are the same.
    pub fn transfer_corruption(
        &self,
        source: &mut Character,
        target: &mut Character,
        amount: i32,
    ) -> Result<CorruptionTransfer, DomainError> {
        if amount <= 0 {
            return Err(DomainError::invalid_argument(format!(
                "transfer amount must be positive, got {amount}"
            )));
        }
        if source.id == target.id {
            return Err(DomainError::invalid_argument(
                "cannot transfer corruption to the same character",
            ));
        }

        let available = source.corruption.value();
        if available < amount {
            return Ok(CorruptionTransfer::Rejected(Rejection::no_op(format!(
                "{} carries only {available} corruption; cannot transfer {amount}.",
                source.name
            ))));
        }

        let source_crossing = source.corruption.lose(amount);
        let target_gain = self.add_corruption(target, amount, CorruptionSource::BlightTransfer)?;
        Ok(CorruptionTransfer::Transferred {
            source: source_crossing,
            target: target_gain,
        })
    }

    /// Rolls to survive a terminal error. Only legal at 100 corruption.
    pub fn perform_terminal_error_check(
        &self,
        character: &mut Character,
        dice: &mut dyn DiceSource,
    ) -> TerminalErrorCheck {
        let current = character.corruption.value();
        if current != METER_MAX {
            return TerminalErrorCheck::Rejected(Rejection::invalid_state(format!(
                "A terminal error check requires corruption 100; current corruption is {current}."
            )));
        }

        let pool_size = resolve_pool(character.will, current);
        let dc = self.rules.terminal_check_dc;
        let successes = dice.roll_pool(pool_size, dc);

        if successes >= dc {
            let crossing = character.corruption.reset_to(METER_MAX - 1);
            tracing::info!(character_id = %character.id, successes, dc, "terminal error survived");
            TerminalErrorCheck::Survived {
                pool_size,
                successes,
                dc,
                crossing,
            }
        } else {
            character.forlorn = true;
            tracing::info!(character_id = %character.id, successes, dc, "character became forlorn");
            TerminalErrorCheck::Forlorn {
                pool_size,
                successes,
                dc,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::meter::Meter;
    use blightward_test_support::{MockDice, SequenceDice};
    use uuid::Uuid;

    fn character_with_corruption(corruption: i32, will: u32) -> Character {
        let mut character = Character::new(Uuid::new_v4(), "Tester", will);
        character.corruption = Meter::new(corruption);
        character
    }

    #[test]
    fn test_derived_penalties() {
        assert_eq!(hp_penalty_percent(35), 15);
        assert_eq!(ap_penalty_percent(100), 50);
        assert_eq!(resolve_penalty(59), 2);
        assert_eq!(resolve_penalty(100), 5);
        assert_eq!(resolve_pool(3, 100), 1);
        assert_eq!(resolve_pool(6, 40), 4);
    }

    #[test]
    fn test_state_reports_stage_effects() {
        let rules = CorruptionRules::default();
        let tracker = CorruptionTracker::new(&rules);
        let state = tracker.state(&character_with_corruption(55, 3));
        assert_eq!(state.stage, CorruptionStage::Infected);
        assert_eq!(state.tech_bonus, 2);
        assert_eq!(state.social_penalty, -2);
        assert!(state.faction_locked);
        assert!(!state.terminal_error_eligible);
    }

    #[test]
    fn test_add_corruption_at_90_clamps_and_flags_terminal() {
        let rules = CorruptionRules::default();
        let tracker = CorruptionTracker::new(&rules);
        let mut character = character_with_corruption(90, 3);

        let gain = tracker
            .add_corruption(&mut character, 15, CorruptionSource::HereticalAbility)
            .unwrap();

        assert_eq!(character.corruption.value(), 100);
        assert_eq!(gain.crossing.amount_gained(), 10);
        assert!(gain.terminal_error_triggered);
        assert_eq!(gain.crossing.new_tier, CorruptionStage::Consumed);
    }

    #[test]
    fn test_milestone_fires_once_ever() {
        let rules = CorruptionRules::default();
        let tracker = CorruptionTracker::new(&rules);
        let mut character = character_with_corruption(20, 3);

        let first = tracker
            .add_corruption(&mut character, 10, CorruptionSource::BlightExposure)
            .unwrap();
        assert_eq!(first.milestone_reached, Some(25));

        character.corruption = Meter::new(20);
        let again = tracker
            .add_corruption(&mut character, 10, CorruptionSource::BlightExposure)
            .unwrap();
        assert_eq!(again.milestone_reached, None);
    }

    #[test]
    fn test_one_milestone_per_call_lowest_first() {
        let rules = CorruptionRules::default();
        let tracker = CorruptionTracker::new(&rules);
        let mut character = character_with_corruption(0, 3);

        let gain = tracker
            .add_corruption(&mut character, 80, CorruptionSource::ForbiddenKnowledge)
            .unwrap();
        assert_eq!(gain.milestone_reached, Some(25));
        assert!(gain.faction_lock_gained);
        assert!(!character.one_shots.has_fired(ResourceKind::Corruption, 50));
    }

    #[test]
    fn test_remove_corruption_refuses_more_than_present() {
        let rules = CorruptionRules::default();
        let tracker = CorruptionTracker::new(&rules);
        let mut character = character_with_corruption(10, 3);

        match tracker
            .remove_corruption(&mut character, 20, "Purification rite")
            .unwrap()
        {
            CorruptionRemoval::Rejected(rejection) => {
                assert_eq!(
                    rejection.reason,
                    "Cannot remove 20 corruption; only 10 remains."
                );
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
        assert_eq!(character.corruption.value(), 10);
    }

    #[test]
    fn test_remove_corruption_when_clean_is_no_op() {
        let rules = CorruptionRules::default();
        let tracker = CorruptionTracker::new(&rules);
        let mut character = character_with_corruption(0, 3);
        assert!(matches!(
            tracker.remove_corruption(&mut character, 0, "Rite").unwrap(),
            CorruptionRemoval::Rejected(_)
        ));
    }

    #[test]
    fn test_remove_corruption_lowers_value() {
        let rules = CorruptionRules::default();
        let tracker = CorruptionTracker::new(&rules);
        let mut character = character_with_corruption(42, 3);
        let removal = tracker
            .remove_corruption(&mut character, 12, "Purification rite")
            .unwrap();
        assert!(matches!(removal, CorruptionRemoval::Removed { .. }));
        assert_eq!(character.corruption.value(), 30);
    }

    #[test]
    fn test_transfer_moves_corruption() {
        let rules = CorruptionRules::default();
        let tracker = CorruptionTracker::new(&rules);
        let mut priest = character_with_corruption(10, 3);
        let mut patient = character_with_corruption(40, 3);

        let transfer = tracker
            .transfer_corruption(&mut patient, &mut priest, 15)
            .unwrap();

        match transfer {
            CorruptionTransfer::Transferred { source, target } => {
                assert_eq!(source.new_value, 25);
                assert_eq!(target.crossing.new_value, 25);
                assert_eq!(target.source, CorruptionSource::BlightTransfer);
            }
            CorruptionTransfer::Rejected(r) => panic!("unexpected rejection: {r}"),
        }
    }

    #[test]
    fn test_transfer_to_self_is_invalid_argument() {
        let rules = CorruptionRules::default();
        let tracker = CorruptionTracker::new(&rules);
        let mut a = character_with_corruption(40, 3);
        let mut b = a.clone();
        assert!(matches!(
            tracker.transfer_corruption(&mut a, &mut b, 5),
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_transfer_non_positive_is_invalid_argument() {
        let rules = CorruptionRules::default();
        let tracker = CorruptionTracker::new(&rules);
        let mut a = character_with_corruption(40, 3);
        let mut b = character_with_corruption(0, 3);
        assert!(matches!(
            tracker.transfer_corruption(&mut a, &mut b, 0),
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_transfer_insufficient_source_is_rejected() {
        let rules = CorruptionRules::default();
        let tracker = CorruptionTracker::new(&rules);
        let mut a = character_with_corruption(4, 3);
        let mut b = character_with_corruption(0, 3);
        assert!(matches!(
            tracker.transfer_corruption(&mut a, &mut b, 5).unwrap(),
            CorruptionTransfer::Rejected(_)
        ));
        assert_eq!(a.corruption.value(), 4);
        assert_eq!(b.corruption.value(), 0);
    }

    #[test]
    fn test_terminal_check_below_100_is_rejected() {
        let rules = CorruptionRules::default();
        let tracker = CorruptionTracker::new(&rules);
        let mut character = character_with_corruption(99, 3);
        match tracker.perform_terminal_error_check(&mut character, &mut MockDice) {
            TerminalErrorCheck::Rejected(rejection) => {
                assert_eq!(
                    rejection.kind,
                    blightward_core::error::RejectionKind::InvalidState
                );
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_terminal_check_success_sets_99() {
        let rules = CorruptionRules::default();
        let tracker = CorruptionTracker::new(&rules);
        let mut character = character_with_corruption(100, 8);
        let mut dice = SequenceDice::new(vec![3]);

        match tracker.perform_terminal_error_check(&mut character, &mut dice) {
            TerminalErrorCheck::Survived { pool_size, .. } => assert_eq!(pool_size, 3),
            other => panic!("expected Survived, got {other:?}"),
        }
        assert_eq!(character.corruption.value(), 99);
        assert!(!character.forlorn);
    }

    #[test]
    fn test_terminal_check_failure_marks_forlorn() {
        let rules = CorruptionRules::default();
        let tracker = CorruptionTracker::new(&rules);
        let mut character = character_with_corruption(100, 8);
        let mut dice = SequenceDice::new(vec![2]);

        assert!(matches!(
            tracker.perform_terminal_error_check(&mut character, &mut dice),
            TerminalErrorCheck::Forlorn { .. }
        ));
        assert_eq!(character.corruption.value(), 100);
        assert!(character.forlorn);
    }

    #[test]
    fn test_terminal_check_retriggers_after_survival() {
        let rules = CorruptionRules::default();
        let tracker = CorruptionTracker::new(&rules);
        let mut character = character_with_corruption(100, 8);
        let mut dice = SequenceDice::new(vec![3]);
        tracker.perform_terminal_error_check(&mut character, &mut dice);

        let gain = tracker
            .add_corruption(&mut character, 1, CorruptionSource::Environmental)
            .unwrap();
        assert!(gain.terminal_error_triggered);
        assert!(gain.crossing.threshold_crossed);
    }
}
