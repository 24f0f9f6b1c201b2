//! Coherence: the mystic's combat resource.
//!
//! Low coherence risks a cascade on every cast. The top tier is Apotheosis,
//! which amplifies spells but drains stress each turn it is held.

use blightward_content::config::ResourceRules;
use blightward_core::dice::DiceSource;
use blightward_core::error::{DomainError, Rejection, ensure_non_negative};
use serde::{Deserialize, Serialize};

use super::character::Character;
use super::meter::{
    METER_MAX, Meter, MeterKind, OneShotLedger, ResetCause, ResourceKind, ThresholdCrossing,
    TierBand, TierTable,
};

/// Coherence restored by meditating.
pub const MEDITATION_COHERENCE: i32 = 20;

/// Floor of the Apotheosis tier; also the one-shot unlock threshold.
pub const APOTHEOSIS_THRESHOLD: i32 = 81;

const CASCADE_DIE: u32 = 100;

/// Coherence tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CoherenceTier {
    /// 0–20.
    Destabilized,
    /// 21–40.
    Unstable,
    /// 41–60.
    Balanced,
    /// 61–80.
    Focused,
    /// 81–100.
    Apotheosis,
}

/// Effects of a coherence tier.
#[derive(Debug)]
pub struct CoherenceEffects {
    /// Modifier to spell power.
    pub spell_power: i32,
    /// Extra critical chance in percent.
    pub crit_bonus_percent: i32,
    /// Chance in percent that a cast cascades.
    pub cascade_risk_percent: u32,
    /// Penalty applied when a cascade fires.
    pub cascade: Option<CascadePenalty>,
}

/// What a cascade costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CascadePenalty {
    /// Coherence lost.
    pub coherence_lost: i32,
    /// Damage to the caster, applied by the caller.
    pub self_damage: i32,
    /// Stress gained.
    pub stress_gained: i32,
    /// Corruption gained.
    pub corruption_gained: i32,
}

static COHERENCE_TIERS: TierTable<CoherenceTier, CoherenceEffects> = TierTable::new(&[
    TierBand {
        tier: CoherenceTier::Destabilized,
        floor: 0,
        effects: CoherenceEffects {
            spell_power: -2,
            crit_bonus_percent: 0,
            cascade_risk_percent: 25,
            cascade: Some(CascadePenalty {
                coherence_lost: 20,
                self_damage: 15,
                stress_gained: 15,
                corruption_gained: 5,
            }),
        },
    },
    TierBand {
        tier: CoherenceTier::Unstable,
        floor: 21,
        effects: CoherenceEffects {
            spell_power: -1,
            crit_bonus_percent: 0,
            cascade_risk_percent: 10,
            cascade: Some(CascadePenalty {
                coherence_lost: 10,
                self_damage: 5,
                stress_gained: 10,
                corruption_gained: 0,
            }),
        },
    },
    TierBand {
        tier: CoherenceTier::Balanced,
        floor: 41,
        effects: CoherenceEffects {
            spell_power: 0,
            crit_bonus_percent: 5,
            cascade_risk_percent: 0,
            cascade: None,
        },
    },
    TierBand {
        tier: CoherenceTier::Focused,
        floor: 61,
        effects: CoherenceEffects {
            spell_power: 2,
            crit_bonus_percent: 10,
            cascade_risk_percent: 0,
            cascade: None,
        },
    },
    TierBand {
        tier: CoherenceTier::Apotheosis,
        floor: APOTHEOSIS_THRESHOLD,
        effects: CoherenceEffects {
            spell_power: 5,
            crit_bonus_percent: 20,
            cascade_risk_percent: 0,
            cascade: None,
        },
    },
]);

/// Meter kind for Coherence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Coherence;

impl MeterKind for Coherence {
    type Tier = CoherenceTier;
    type Effects = CoherenceEffects;
    const RESOURCE: ResourceKind = ResourceKind::Coherence;

    fn table() -> &'static TierTable<CoherenceTier, CoherenceEffects> {
        &COHERENCE_TIERS
    }
}

/// Persisted coherence for characters that use it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoherenceState {
    /// Current coherence.
    pub meter: Meter<Coherence>,
    /// Value restored by rest.
    pub baseline: i32,
    /// Whether Apotheosis is currently held.
    pub in_apotheosis: bool,
    /// Turns Apotheosis has been maintained.
    pub turns_in_apotheosis: u32,
}

impl CoherenceState {
    /// Coherence starting at `baseline`.
    #[must_use]
    pub fn at_baseline(baseline: i32) -> Self {
        let meter = Meter::new(baseline);
        Self {
            baseline: meter.value(),
            meter,
            in_apotheosis: false,
            turns_in_apotheosis: 0,
        }
    }
}

/// What restored the coherence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoherenceSource {
    /// A spell landed cleanly.
    SuccessfulCast,
    /// A controlled channel.
    ControlledChannel,
    /// Meditation outside combat.
    Meditation,
    /// Standing in a stability field.
    StabilityField,
    /// Anything else.
    Ability,
}

/// Why Apotheosis ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApotheosisExitCause {
    /// Coherence fell below the tier.
    CoherenceDropped,
    /// Stress hit its ceiling.
    StressOverload,
    /// The character let it go.
    Voluntary,
}

/// Entry into or exit from Apotheosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ApotheosisTransition {
    /// Apotheosis began.
    Entered {
        /// First entry ever; Apotheosis abilities are now unlocked.
        abilities_unlocked: bool,
    },
    /// Apotheosis ended.
    Exited {
        /// Why.
        cause: ApotheosisExitCause,
    },
}

/// Result of a coherence mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoherenceChange {
    /// Meter movement.
    pub crossing: ThresholdCrossing<CoherenceTier>,
    /// Apotheosis entry or exit caused by the move.
    pub apotheosis: Option<ApotheosisTransition>,
}

/// Outcome of an operation that may be refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CoherenceOutcome {
    /// The operation went through.
    Applied(CoherenceChange),
    /// The operation was refused.
    Rejected(Rejection),
}

/// Result of a cascade check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeCheck {
    /// Risk at the time of the check.
    pub risk_percent: u32,
    /// The d100 roll, if one was needed.
    pub roll: Option<u32>,
    /// Penalty, when the cascade fired.
    pub penalty: Option<CascadePenalty>,
    /// Coherence lost to the cascade.
    pub change: Option<CoherenceChange>,
}

impl CascadeCheck {
    /// Whether the cascade fired.
    #[must_use]
    pub fn triggered(&self) -> bool {
        self.penalty.is_some()
    }
}

/// Per-turn upkeep of Apotheosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApotheosisUpkeep {
    /// Stress the caller must apply.
    pub stress_cost: i32,
    /// Turns held including this one.
    pub turns_in_apotheosis: u32,
}

/// Read-only view of a character's coherence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoherenceStatus {
    /// Current value.
    pub value: i32,
    /// Current tier.
    pub tier: CoherenceTier,
    /// Rest baseline.
    pub baseline: i32,
    /// Modifier to spell power.
    pub spell_power: i32,
    /// Extra critical chance in percent.
    pub crit_bonus_percent: i32,
    /// Chance in percent that a cast cascades.
    pub cascade_risk_percent: u32,
    /// Whether Apotheosis is held.
    pub in_apotheosis: bool,
    /// Turns Apotheosis has been held.
    pub turns_in_apotheosis: u32,
    /// Whether Apotheosis abilities have been unlocked.
    pub abilities_unlocked: bool,
    /// Value is 100; the capstone may be used.
    pub capstone_ready: bool,
}

/// Coherence operations.
#[derive(Debug, Clone, Copy)]
pub struct CoherenceTracker<'a> {
    rules: &'a ResourceRules,
}

impl<'a> CoherenceTracker<'a> {
    /// A tracker using `rules`.
    #[must_use]
    pub fn new(rules: &'a ResourceRules) -> Self {
        Self { rules }
    }

    /// Current coherence view.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the character has no coherence.
    pub fn state(&self, character: &Character) -> Result<CoherenceStatus, DomainError> {
        let state = character.coherence()?;
        let effects = state.meter.effects();
        Ok(CoherenceStatus {
            value: state.meter.value(),
            tier: state.meter.tier(),
            baseline: state.baseline,
            spell_power: effects.spell_power,
            crit_bonus_percent: effects.crit_bonus_percent,
            cascade_risk_percent: effects.cascade_risk_percent,
            in_apotheosis: state.in_apotheosis,
            turns_in_apotheosis: state.turns_in_apotheosis,
            abilities_unlocked: character
                .one_shots
                .has_fired(ResourceKind::Coherence, APOTHEOSIS_THRESHOLD),
            capstone_ready: state.meter.value() == METER_MAX,
        })
    }

    /// Adds coherence.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for a negative amount and
    /// `DomainError::NotFound` if the character has no coherence.
    pub fn gain(
        &self,
        character: &mut Character,
        amount: i32,
        source: CoherenceSource,
    ) -> Result<CoherenceChange, DomainError> {
        ensure_non_negative(amount, "coherence amount")?;
        let change = mutate(character, |meter| meter.gain(amount))?;
        tracing::debug!(
            character_id = %character.id,
            ?source,
            coherence = change.crossing.new_value,
            "coherence gained"
        );
        Ok(change)
    }

    /// Meditates for coherence; refused during combat.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the character has no coherence.
    pub fn meditate(
        &self,
        character: &mut Character,
        in_combat: bool,
    ) -> Result<CoherenceOutcome, DomainError> {
        character.coherence()?;
        if in_combat {
            return Ok(CoherenceOutcome::Rejected(Rejection::invalid_state(
                "You cannot meditate while in combat.",
            )));
        }
        self.gain(character, MEDITATION_COHERENCE, CoherenceSource::Meditation)
            .map(CoherenceOutcome::Applied)
    }

    /// Gains coherence from a stability field of `strength` 1 to 10.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for a strength outside 1 to 10
    /// and `DomainError::NotFound` if the character has no coherence.
    pub fn stability_field(
        &self,
        character: &mut Character,
        strength: i32,
    ) -> Result<CoherenceChange, DomainError> {
        if !(1..=10).contains(&strength) {
            return Err(DomainError::invalid_argument(format!(
                "stability field strength must be between 1 and 10, got {strength}"
            )));
        }
        self.gain(character, strength, CoherenceSource::StabilityField)
    }

    /// Removes coherence.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for a negative amount and
    /// `DomainError::NotFound` if the character has no coherence.
    pub fn lose(
        &self,
        character: &mut Character,
        amount: i32,
    ) -> Result<CoherenceChange, DomainError> {
        ensure_non_negative(amount, "coherence amount")?;
        mutate(character, |meter| meter.lose(amount))
    }

    /// Rolls d100 against the current cascade risk. On a cascade the
    /// coherence loss is applied here; the caller applies the rest of the
    /// penalty.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the character has no coherence.
    pub fn check_cascade(
        &self,
        character: &mut Character,
        dice: &mut dyn DiceSource,
    ) -> Result<CascadeCheck, DomainError> {
        let effects = character.coherence()?.meter.effects();
        let risk_percent = effects.cascade_risk_percent;
        let Some(penalty) = effects.cascade.filter(|_| risk_percent > 0) else {
            return Ok(CascadeCheck {
                risk_percent,
                roll: None,
                penalty: None,
                change: None,
            });
        };

        let roll = dice.roll_die(CASCADE_DIE);
        if roll > risk_percent {
            return Ok(CascadeCheck {
                risk_percent,
                roll: Some(roll),
                penalty: None,
                change: None,
            });
        }

        let change = self.lose(character, penalty.coherence_lost)?;
        tracing::info!(
            character_id = %character.id,
            roll,
            risk_percent,
            coherence = change.crossing.new_value,
            "coherence cascade"
        );
        Ok(CascadeCheck {
            risk_percent,
            roll: Some(roll),
            penalty: Some(penalty),
            change: Some(change),
        })
    }

    /// Counts one more turn in Apotheosis and returns the stress owed, or
    /// `None` when Apotheosis is not held.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the character has no coherence.
    pub fn maintain_apotheosis(
        &self,
        character: &mut Character,
    ) -> Result<Option<ApotheosisUpkeep>, DomainError> {
        let state = character.coherence_mut()?;
        if !state.in_apotheosis {
            return Ok(None);
        }
        state.turns_in_apotheosis = state.turns_in_apotheosis.saturating_add(1);
        Ok(Some(ApotheosisUpkeep {
            stress_cost: self.rules.apotheosis_stress_cost,
            turns_in_apotheosis: state.turns_in_apotheosis,
        }))
    }

    /// Throws the character out of Apotheosis because stress hit its ceiling.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the character has no coherence.
    pub fn force_exit(&self, character: &mut Character) -> Result<CoherenceChange, DomainError> {
        self.exit_to_floor(character, ApotheosisExitCause::StressOverload)
    }

    /// Leaves Apotheosis by choice; refused during combat or when not held.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the character has no coherence.
    pub fn exit_apotheosis(
        &self,
        character: &mut Character,
        in_combat: bool,
    ) -> Result<CoherenceOutcome, DomainError> {
        if !character.coherence()?.in_apotheosis {
            return Ok(CoherenceOutcome::Rejected(Rejection::no_op(
                "You are not in Apotheosis.",
            )));
        }
        if in_combat {
            return Ok(CoherenceOutcome::Rejected(Rejection::invalid_state(
                "You cannot release Apotheosis in the middle of combat.",
            )));
        }
        self.exit_to_floor(character, ApotheosisExitCause::Voluntary)
            .map(CoherenceOutcome::Applied)
    }

    /// Returns coherence to the character's baseline.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the character has no coherence.
    pub fn reset(
        &self,
        character: &mut Character,
        cause: ResetCause,
    ) -> Result<CoherenceChange, DomainError> {
        let baseline = character.coherence()?.baseline;
        let change = mutate(character, |meter| meter.reset_to(baseline))?;
        tracing::debug!(
            character_id = %character.id,
            ?cause,
            previous = change.crossing.previous_value,
            baseline,
            "coherence reset"
        );
        Ok(change)
    }

    fn exit_to_floor(
        &self,
        character: &mut Character,
        cause: ApotheosisExitCause,
    ) -> Result<CoherenceChange, DomainError> {
        let state = character.coherence_mut()?;
        let was_in_apotheosis = std::mem::replace(&mut state.in_apotheosis, false);
        state.turns_in_apotheosis = 0;
        let crossing = state.meter.reset_to(self.rules.apotheosis_exit_value);
        let apotheosis =
            was_in_apotheosis.then_some(ApotheosisTransition::Exited { cause });
        if was_in_apotheosis {
            tracing::info!(character_id = %character.id, ?cause, "apotheosis exited");
        }
        Ok(CoherenceChange {
            crossing,
            apotheosis,
        })
    }
}

/// Applies `op` to the coherence meter and reconciles Apotheosis with the
/// new tier.
fn mutate(
    character: &mut Character,
    op: impl FnOnce(&mut Meter<Coherence>) -> ThresholdCrossing<CoherenceTier>,
) -> Result<CoherenceChange, DomainError> {
    let character_id = character.id;
    let state = character
        .coherence
        .as_mut()
        .ok_or_else(|| DomainError::not_found("coherence resource", character_id))?;
    let crossing = op(&mut state.meter);
    let apotheosis = reconcile_apotheosis(state, &mut character.one_shots);
    if let Some(transition) = apotheosis {
        tracing::info!(%character_id, ?transition, "apotheosis transition");
    }
    Ok(CoherenceChange {
        crossing,
        apotheosis,
    })
}

fn reconcile_apotheosis(
    state: &mut CoherenceState,
    one_shots: &mut OneShotLedger,
) -> Option<ApotheosisTransition> {
    let in_top_tier = state.meter.tier() == CoherenceTier::Apotheosis;
    match (state.in_apotheosis, in_top_tier) {
        (false, true) => {
            state.in_apotheosis = true;
            state.turns_in_apotheosis = 0;
            Some(ApotheosisTransition::Entered {
                abilities_unlocked: one_shots
                    .fire_once(ResourceKind::Coherence, APOTHEOSIS_THRESHOLD),
            })
        }
        (true, false) => {
            state.in_apotheosis = false;
            state.turns_in_apotheosis = 0;
            Some(ApotheosisTransition::Exited {
                cause: ApotheosisExitCause::CoherenceDropped,
            })
        }
        _ => None,
    }
}
