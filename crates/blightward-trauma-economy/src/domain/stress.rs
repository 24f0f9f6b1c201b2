//! Stress: psychological strain on a 0–100 meter.
//!
//! Stress erodes defense, imposes skill disadvantage once the character is
//! breaking, and demands a trauma check when it reaches 100.

use blightward_content::config::StressRules;
use blightward_core::dice::DiceSource;
use blightward_core::error::{DomainError, ensure_non_negative, ensure_not_blank};
use serde::{Deserialize, Serialize};

use super::character::Character;
use super::meter::{METER_MIN, MeterKind, ResourceKind, ThresholdCrossing, TierBand, TierTable};

/// Stress tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StressTier {
    /// 0–19.
    Calm,
    /// 20–39.
    Uneasy,
    /// 40–59.
    Anxious,
    /// 60–79.
    Panicked,
    /// 80–99.
    Breaking,
    /// Exactly 100.
    Trauma,
}

/// Effects of a stress tier.
#[derive(Debug)]
pub struct StressEffects {
    /// Skill checks are rolled at disadvantage.
    pub skill_disadvantage: bool,
}

static STRESS_TIERS: TierTable<StressTier, StressEffects> = TierTable::new(&[
    TierBand {
        tier: StressTier::Calm,
        floor: 0,
        effects: StressEffects {
            skill_disadvantage: false,
        },
    },
    TierBand {
        tier: StressTier::Uneasy,
        floor: 20,
        effects: StressEffects {
            skill_disadvantage: false,
        },
    },
    TierBand {
        tier: StressTier::Anxious,
        floor: 40,
        effects: StressEffects {
            skill_disadvantage: false,
        },
    },
    TierBand {
        tier: StressTier::Panicked,
        floor: 60,
        effects: StressEffects {
            skill_disadvantage: false,
        },
    },
    TierBand {
        tier: StressTier::Breaking,
        floor: 80,
        effects: StressEffects {
            skill_disadvantage: true,
        },
    },
    TierBand {
        tier: StressTier::Trauma,
        floor: 100,
        effects: StressEffects {
            skill_disadvantage: true,
        },
    },
]);

/// Meter kind for Stress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stress;

impl MeterKind for Stress {
    type Tier = StressTier;
    type Effects = StressEffects;
    const RESOURCE: ResourceKind = ResourceKind::Stress;

    fn table() -> &'static TierTable<StressTier, StressEffects> {
        &STRESS_TIERS
    }
}

/// Where stress came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StressSource {
    /// Fighting and being hurt.
    Combat,
    /// Dark places and long marches.
    Exploration,
    /// Story events.
    Narrative,
    /// Casting heretical abilities.
    Heretical,
    /// Hostile surroundings at turn end.
    Environmental,
    /// Backlash from corruption.
    Corruption,
    /// The price of holding Apotheosis.
    Apotheosis,
}

/// Kinds of rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestType {
    /// A breather between fights.
    Short,
    /// A full night's rest.
    Long,
    /// Rest in a true sanctuary; clears all stress.
    Sanctuary,
    /// Recovery granted by reaching a story milestone.
    Milestone,
}

impl RestType {
    /// Long and sanctuary rests reset combat resources.
    #[must_use]
    pub fn resets_resources(self) -> bool {
        matches!(self, Self::Long | Self::Sanctuary)
    }
}

/// Defense penalty for a stress value: one point per full 20.
#[must_use]
pub fn defense_penalty(stress: i32) -> i32 {
    stress / 20
}

/// Percentage of incoming stress negated by a resistance roll.
#[must_use]
pub fn reduction_percent(successes: u32) -> i32 {
    match successes {
        0 => 0,
        1 => 50,
        2 | 3 => 75,
        _ => 100,
    }
}

/// Read-only view of a character's stress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StressState {
    /// Current value.
    pub value: i32,
    /// Current tier.
    pub tier: StressTier,
    /// Penalty to defense.
    pub defense_penalty: i32,
    /// Whether skill checks are at disadvantage.
    pub skill_disadvantage: bool,
    /// Whether a breaking-point trauma check is owed.
    pub requires_trauma_check: bool,
}

/// Outcome of a resistance roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResistanceCheck {
    /// Dice rolled.
    pub pool_size: u32,
    /// Difficulty supplied by the caller.
    pub dc: u32,
    /// Net successes.
    pub successes: u32,
    /// Percentage of stress negated.
    pub reduction_percent: i32,
    /// Stress before the roll.
    pub base_amount: i32,
    /// Stress after the roll.
    pub final_amount: i32,
}

/// Outcome of applying stress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StressApplication {
    /// Where the stress came from.
    pub source: StressSource,
    /// Resistance roll, when a DC was supplied.
    pub resistance: Option<ResistanceCheck>,
    /// Meter movement.
    pub crossing: ThresholdCrossing<StressTier>,
    /// Stress is at 100; the caller owes a breaking-point trauma check.
    pub trauma_check_triggered: bool,
}

/// Outcome of recovering stress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StressRecovery {
    /// What drove the recovery.
    pub source: String,
    /// Meter movement.
    pub crossing: ThresholdCrossing<StressTier>,
}

/// Stress operations over one character.
#[derive(Debug, Clone, Copy)]
pub struct StressTracker<'a> {
    rules: &'a StressRules,
}

impl<'a> StressTracker<'a> {
    /// A tracker using `rules`.
    #[must_use]
    pub fn new(rules: &'a StressRules) -> Self {
        Self { rules }
    }

    /// Current stress view.
    #[must_use]
    pub fn state(&self, character: &Character) -> StressState {
        let meter = &character.stress;
        StressState {
            value: meter.value(),
            tier: meter.tier(),
            defense_penalty: defense_penalty(meter.value()),
            skill_disadvantage: meter.effects().skill_disadvantage,
            requires_trauma_check: meter.is_extreme(),
        }
    }

    /// Rolls WILL against `dc` and reduces `base_amount` by the resulting
    /// percentage.
    pub fn resistance_check(
        &self,
        will: u32,
        base_amount: i32,
        dc: u32,
        dice: &mut dyn DiceSource,
    ) -> ResistanceCheck {
        let successes = dice.roll_pool(will, dc);
        let pct = reduction_percent(successes);
        let negated = i64::from(base_amount) * i64::from(pct) / 100;
        let final_amount =
            i32::try_from(i64::from(base_amount) - negated).unwrap_or(base_amount);
        ResistanceCheck {
            pool_size: will,
            dc,
            successes,
            reduction_percent: pct,
            base_amount,
            final_amount,
        }
    }

    /// Applies stress, first rolling resistance when `resist_dc > 0`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if `amount` is negative.
    pub fn apply_stress(
        &self,
        character: &mut Character,
        amount: i32,
        source: StressSource,
        resist_dc: u32,
        dice: &mut dyn DiceSource,
    ) -> Result<StressApplication, DomainError> {
        ensure_non_negative(amount, "stress amount")?;

        let resistance = (resist_dc > 0 && amount > 0)
            .then(|| self.resistance_check(character.will, amount, resist_dc, dice));
        let final_amount = resistance.as_ref().map_or(amount, |r| r.final_amount);
        Ok(commit(character, final_amount, source, resistance))
    }

    /// Applies stress that cannot be resisted.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if `amount` is negative.
    pub fn apply_unresisted(
        &self,
        character: &mut Character,
        amount: i32,
        source: StressSource,
    ) -> Result<StressApplication, DomainError> {
        ensure_non_negative(amount, "stress amount")?;
        Ok(commit(character, amount, source, None))
    }

    /// Recovers stress according to the rest taken.
    pub fn recover_for_rest(&self, character: &mut Character, rest: RestType) -> StressRecovery {
        let will = i32::try_from(character.will).unwrap_or(i32::MAX);
        let crossing = match rest {
            RestType::Short => character
                .stress
                .lose(will.saturating_mul(self.rules.short_rest_will_multiplier)),
            RestType::Long => character
                .stress
                .lose(will.saturating_mul(self.rules.long_rest_will_multiplier)),
            RestType::Sanctuary => character.stress.reset_to(METER_MIN),
            RestType::Milestone => character.stress.lose(self.rules.milestone_recovery),
        };
        StressRecovery {
            source: format!("{rest:?} rest"),
            crossing,
        }
    }

    /// Recovers a custom amount of stress.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if `amount` is negative or
    /// `source` is blank.
    pub fn recover(
        &self,
        character: &mut Character,
        amount: i32,
        source: &str,
    ) -> Result<StressRecovery, DomainError> {
        ensure_non_negative(amount, "recovery amount")?;
        ensure_not_blank(source, "recovery source")?;
        Ok(StressRecovery {
            source: source.to_owned(),
            crossing: character.stress.lose(amount),
        })
    }

    /// Resets stress after a breaking-point trauma check.
    pub fn reset_after_trauma_check(
        &self,
        character: &mut Character,
        passed: bool,
    ) -> ThresholdCrossing<StressTier> {
        let target = if passed {
            self.rules.reset_after_passed_check
        } else {
            self.rules.reset_after_failed_check
        };
        character.stress.reset_to(target)
    }
}

fn commit(
    character: &mut Character,
    amount: i32,
    source: StressSource,
    resistance: Option<ResistanceCheck>,
) -> StressApplication {
    let crossing = character.stress.gain(amount);
    tracing::debug!(
        character_id = %character.id,
        ?source,
        requested = amount,
        applied = crossing.applied,
        stress = crossing.new_value,
        "stress applied"
    );
    StressApplication {
        source,
        resistance,
        trauma_check_triggered: crossing.extreme,
        crossing,
    }
}
