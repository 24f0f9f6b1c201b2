//! Momentum: the skirmisher's combat resource.
//!
//! Momentum builds from hits and movement, grows faster while consecutive
//! hits chain together, and bleeds away on misses and idle turns.

use blightward_content::config::ResourceRules;
use blightward_core::error::{DomainError, ensure_non_negative};
use serde::{Deserialize, Serialize};

use super::character::Character;
use super::meter::{
    METER_MAX, METER_MIN, Meter, MeterKind, ResetCause, ResourceKind, ThresholdCrossing, TierBand,
    TierTable,
};

const CHAIN_BONUS_PER_HIT: i32 = 2;
const MAX_CHAIN_BONUS: i32 = 10;

/// Momentum tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MomentumTier {
    /// 0–20.
    Stationary,
    /// 21–40.
    Moving,
    /// 41–60.
    Flowing,
    /// 61–80.
    Surging,
    /// 81–100.
    Unstoppable,
}

/// Effects of a momentum tier.
#[derive(Debug)]
pub struct MomentumEffects {
    /// Bonus to attack rolls.
    pub attack_bonus: i32,
    /// Bonus to defense.
    pub defense_bonus: i32,
    /// Extra attacks per turn.
    pub bonus_attacks: u32,
    /// Extra critical chance in percent.
    pub crit_bonus_percent: i32,
}

static MOMENTUM_TIERS: TierTable<MomentumTier, MomentumEffects> = TierTable::new(&[
    TierBand {
        tier: MomentumTier::Stationary,
        floor: 0,
        effects: MomentumEffects {
            attack_bonus: 0,
            defense_bonus: 0,
            bonus_attacks: 0,
            crit_bonus_percent: 0,
        },
    },
    TierBand {
        tier: MomentumTier::Moving,
        floor: 21,
        effects: MomentumEffects {
            attack_bonus: 1,
            defense_bonus: 1,
            bonus_attacks: 0,
            crit_bonus_percent: 0,
        },
    },
    TierBand {
        tier: MomentumTier::Flowing,
        floor: 41,
        effects: MomentumEffects {
            attack_bonus: 2,
            defense_bonus: 2,
            bonus_attacks: 1,
            crit_bonus_percent: 0,
        },
    },
    TierBand {
        tier: MomentumTier::Surging,
        floor: 61,
        effects: MomentumEffects {
            attack_bonus: 3,
            defense_bonus: 3,
            bonus_attacks: 1,
            crit_bonus_percent: 0,
        },
    },
    TierBand {
        tier: MomentumTier::Unstoppable,
        floor: 81,
        effects: MomentumEffects {
            attack_bonus: 4,
            defense_bonus: 4,
            bonus_attacks: 2,
            crit_bonus_percent: 10,
        },
    },
]);

/// Meter kind for Momentum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Momentum;

impl MeterKind for Momentum {
    type Tier = MomentumTier;
    type Effects = MomentumEffects;
    const RESOURCE: ResourceKind = ResourceKind::Momentum;

    fn table() -> &'static TierTable<MomentumTier, MomentumEffects> {
        &MOMENTUM_TIERS
    }
}

/// Persisted momentum for characters that use it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MomentumState {
    /// Current momentum.
    pub meter: Meter<Momentum>,
    /// Hits landed in a row.
    pub consecutive_hits: u32,
}

impl MomentumState {
    /// Bonus added to every gain while the chain holds.
    #[must_use]
    pub fn chain_bonus(&self) -> i32 {
        let hits = i32::try_from(self.consecutive_hits).unwrap_or(i32::MAX);
        hits.saturating_mul(CHAIN_BONUS_PER_HIT).min(MAX_CHAIN_BONUS)
    }
}

/// What built the momentum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MomentumSource {
    /// A successful attack.
    SuccessfulAttack,
    /// A killing blow.
    KillingBlow,
    /// Movement across the field.
    Movement,
    /// Anything else.
    Ability,
}

/// Movement bonus for a momentum value.
#[must_use]
pub fn movement_bonus(momentum: i32) -> i32 {
    momentum / 20
}

/// Read-only view of a character's momentum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MomentumStatus {
    /// Current value.
    pub value: i32,
    /// Current tier.
    pub tier: MomentumTier,
    /// Bonus to attack rolls.
    pub attack_bonus: i32,
    /// Bonus to defense.
    pub defense_bonus: i32,
    /// Extra attacks per turn.
    pub bonus_attacks: u32,
    /// Extra critical chance in percent.
    pub crit_bonus_percent: i32,
    /// Extra movement.
    pub movement_bonus: i32,
    /// Hits landed in a row.
    pub consecutive_hits: u32,
    /// Bonus added to the next gain.
    pub chain_bonus: i32,
    /// Value is 100; the capstone may be used.
    pub capstone_ready: bool,
}

/// Result of a momentum gain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MomentumGain {
    /// What built the momentum.
    pub source: MomentumSource,
    /// Chain bonus folded into the request.
    pub chain_bonus: i32,
    /// Meter movement.
    pub crossing: ThresholdCrossing<MomentumTier>,
}

/// Result of a missed attack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MomentumMiss {
    /// Length of the chain that was broken, 0 if there was none.
    pub chain_broken: u32,
    /// Meter movement.
    pub crossing: ThresholdCrossing<MomentumTier>,
}

/// Momentum operations.
#[derive(Debug, Clone, Copy)]
pub struct MomentumTracker<'a> {
    rules: &'a ResourceRules,
}

impl<'a> MomentumTracker<'a> {
    /// A tracker using `rules`.
    #[must_use]
    pub fn new(rules: &'a ResourceRules) -> Self {
        Self { rules }
    }

    /// Current momentum view.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the character has no momentum.
    pub fn state(&self, character: &Character) -> Result<MomentumStatus, DomainError> {
        let state = character.momentum()?;
        let effects = state.meter.effects();
        Ok(MomentumStatus {
            value: state.meter.value(),
            tier: state.meter.tier(),
            attack_bonus: effects.attack_bonus,
            defense_bonus: effects.defense_bonus,
            bonus_attacks: effects.bonus_attacks,
            crit_bonus_percent: effects.crit_bonus_percent,
            movement_bonus: movement_bonus(state.meter.value()),
            consecutive_hits: state.consecutive_hits,
            chain_bonus: state.chain_bonus(),
            capstone_ready: state.meter.value() == METER_MAX,
        })
    }

    /// Adds momentum plus the current chain bonus.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for a negative amount and
    /// `DomainError::NotFound` if the character has no momentum.
    pub fn gain(
        &self,
        character: &mut Character,
        amount: i32,
        source: MomentumSource,
    ) -> Result<MomentumGain, DomainError> {
        ensure_non_negative(amount, "momentum amount")?;
        let character_id = character.id;
        let state = character.momentum_mut()?;
        let chain_bonus = state.chain_bonus();
        let crossing = state.meter.gain(amount.saturating_add(chain_bonus));
        tracing::debug!(
            %character_id,
            ?source,
            chain_bonus,
            momentum = crossing.new_value,
            "momentum gained"
        );
        Ok(MomentumGain {
            source,
            chain_bonus,
            crossing,
        })
    }

    /// Extends the hit chain by one and returns its new length.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the character has no momentum.
    pub fn record_hit(&self, character: &mut Character) -> Result<u32, DomainError> {
        let state = character.momentum_mut()?;
        state.consecutive_hits = state.consecutive_hits.saturating_add(1);
        Ok(state.consecutive_hits)
    }

    /// Breaks the chain and applies the miss penalty.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the character has no momentum.
    pub fn record_miss(&self, character: &mut Character) -> Result<MomentumMiss, DomainError> {
        let character_id = character.id;
        let state = character.momentum_mut()?;
        let chain_broken = std::mem::take(&mut state.consecutive_hits);
        let crossing = state.meter.lose(self.rules.momentum_miss_decay);
        if chain_broken > 0 {
            tracing::debug!(%character_id, chain_broken, "momentum chain broken");
        }
        Ok(MomentumMiss {
            chain_broken,
            crossing,
        })
    }

    /// Removes momentum without touching the chain.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for a negative amount and
    /// `DomainError::NotFound` if the character has no momentum.
    pub fn lose(
        &self,
        character: &mut Character,
        amount: i32,
    ) -> Result<ThresholdCrossing<MomentumTier>, DomainError> {
        ensure_non_negative(amount, "momentum amount")?;
        Ok(character.momentum_mut()?.meter.lose(amount))
    }

    /// Out-of-combat decay for one turn. The caller checks combat status.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the character has no momentum.
    pub fn decay_idle(
        &self,
        character: &mut Character,
    ) -> Result<ThresholdCrossing<MomentumTier>, DomainError> {
        Ok(character
            .momentum_mut()?
            .meter
            .lose(self.rules.momentum_idle_decay))
    }

    /// Drops momentum to zero and clears the chain.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the character has no momentum.
    pub fn reset(
        &self,
        character: &mut Character,
        cause: ResetCause,
    ) -> Result<ThresholdCrossing<MomentumTier>, DomainError> {
        let character_id = character.id;
        let state = character.momentum_mut()?;
        state.consecutive_hits = 0;
        let crossing = state.meter.reset_to(METER_MIN);
        tracing::debug!(%character_id, ?cause, previous = crossing.previous_value, "momentum reset");
        Ok(crossing)
    }
}
