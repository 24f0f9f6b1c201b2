//! Rage: the berserker's combat resource.

use blightward_content::config::ResourceRules;
use blightward_core::error::{DomainError, ensure_non_negative};
use serde::{Deserialize, Serialize};

use super::character::Character;
use super::meter::{
    METER_MAX, METER_MIN, Meter, MeterKind, ResetCause, ResourceKind, ThresholdCrossing, TierBand,
    TierTable,
};

/// Rage tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RageTier {
    /// 0–20.
    Calm,
    /// 21–40.
    Simmering,
    /// 41–60.
    Burning,
    /// 61–80.
    BerserkFury,
    /// 81–100.
    FrenzyBeyondReason,
}

/// Effects of a rage tier.
#[derive(Debug)]
pub struct RageEffects {
    /// Extra damage soaked.
    pub soak_bonus: i32,
    /// The character must attack the nearest creature.
    pub must_attack_nearest: bool,
    /// Advantage against fear.
    pub fear_resistant: bool,
    /// Fear has no effect.
    pub fear_immune: bool,
    /// Resting allies recover extra stress.
    pub grants_party_calm: bool,
}

static RAGE_TIERS: TierTable<RageTier, RageEffects> = TierTable::new(&[
    TierBand {
        tier: RageTier::Calm,
        floor: 0,
        effects: RageEffects {
            soak_bonus: 0,
            must_attack_nearest: false,
            fear_resistant: false,
            fear_immune: false,
            grants_party_calm: false,
        },
    },
    TierBand {
        tier: RageTier::Simmering,
        floor: 21,
        effects: RageEffects {
            soak_bonus: 1,
            must_attack_nearest: false,
            fear_resistant: false,
            fear_immune: false,
            grants_party_calm: false,
        },
    },
    TierBand {
        tier: RageTier::Burning,
        floor: 41,
        effects: RageEffects {
            soak_bonus: 2,
            must_attack_nearest: false,
            fear_resistant: false,
            fear_immune: false,
            grants_party_calm: false,
        },
    },
    TierBand {
        tier: RageTier::BerserkFury,
        floor: 61,
        effects: RageEffects {
            soak_bonus: 3,
            must_attack_nearest: true,
            fear_resistant: true,
            fear_immune: false,
            grants_party_calm: false,
        },
    },
    TierBand {
        tier: RageTier::FrenzyBeyondReason,
        floor: 81,
        effects: RageEffects {
            soak_bonus: 4,
            must_attack_nearest: true,
            fear_resistant: true,
            fear_immune: true,
            grants_party_calm: true,
        },
    },
]);

/// Meter kind for Rage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rage;

impl MeterKind for Rage {
    type Tier = RageTier;
    type Effects = RageEffects;
    const RESOURCE: ResourceKind = ResourceKind::Rage;

    fn table() -> &'static TierTable<RageTier, RageEffects> {
        &RAGE_TIERS
    }
}

/// Persisted rage for characters that use it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RageState {
    /// Current rage.
    pub meter: Meter<Rage>,
}

/// What fed the rage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RageSource {
    /// Being hit.
    TakingDamage,
    /// Landing hits.
    DealingDamage,
    /// An ally was hurt.
    AllyDamaged,
    /// An enemy died.
    EnemyKilled,
    /// A maintenance action.
    Maintenance,
    /// Anything else.
    Ability,
}

/// Rage earned by taking `damage`: one point per `divisor` damage.
#[must_use]
pub fn gain_from_damage_taken(damage: i32, divisor: i32) -> i32 {
    damage.max(0) / divisor.max(1)
}

/// Damage bonus for a rage value.
#[must_use]
pub fn damage_bonus(rage: i32) -> i32 {
    rage / 10
}

/// Read-only view of a character's rage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RageStatus {
    /// Current value.
    pub value: i32,
    /// Current tier.
    pub tier: RageTier,
    /// Flat damage bonus.
    pub damage_bonus: i32,
    /// Extra soak.
    pub soak_bonus: i32,
    /// Must attack the nearest creature.
    pub must_attack_nearest: bool,
    /// Advantage against fear.
    pub fear_resistant: bool,
    /// Immune to fear.
    pub fear_immune: bool,
    /// Party stress reduction granted on rest.
    pub party_stress_reduction: i32,
    /// Value is 100; the capstone may be used.
    pub capstone_ready: bool,
}

/// Rage operations.
#[derive(Debug, Clone, Copy)]
pub struct RageTracker<'a> {
    rules: &'a ResourceRules,
}

impl<'a> RageTracker<'a> {
    /// A tracker using `rules`.
    #[must_use]
    pub fn new(rules: &'a ResourceRules) -> Self {
        Self { rules }
    }

    /// Current rage view.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the character has no rage.
    pub fn state(&self, character: &Character) -> Result<RageStatus, DomainError> {
        let meter = &character.rage()?.meter;
        let effects = meter.effects();
        Ok(RageStatus {
            value: meter.value(),
            tier: meter.tier(),
            damage_bonus: damage_bonus(meter.value()),
            soak_bonus: effects.soak_bonus,
            must_attack_nearest: effects.must_attack_nearest,
            fear_resistant: effects.fear_resistant,
            fear_immune: effects.fear_immune,
            party_stress_reduction: if effects.grants_party_calm {
                self.rules.party_stress_reduction
            } else {
                0
            },
            capstone_ready: meter.value() == METER_MAX,
        })
    }

    /// Soak bonus, or 0 for characters without rage.
    #[must_use]
    pub fn soak_bonus(&self, character: &Character) -> i32 {
        character
            .rage
            .as_ref()
            .map_or(0, |r| r.meter.effects().soak_bonus)
    }

    /// Adds rage.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for a negative amount and
    /// `DomainError::NotFound` if the character has no rage.
    pub fn gain(
        &self,
        character: &mut Character,
        amount: i32,
        source: RageSource,
    ) -> Result<ThresholdCrossing<RageTier>, DomainError> {
        ensure_non_negative(amount, "rage amount")?;
        let character_id = character.id;
        let crossing = character.rage_mut()?.meter.gain(amount);
        tracing::debug!(%character_id, ?source, rage = crossing.new_value, "rage gained");
        Ok(crossing)
    }

    /// Removes rage.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for a negative amount and
    /// `DomainError::NotFound` if the character has no rage.
    pub fn lose(
        &self,
        character: &mut Character,
        amount: i32,
    ) -> Result<ThresholdCrossing<RageTier>, DomainError> {
        ensure_non_negative(amount, "rage amount")?;
        Ok(character.rage_mut()?.meter.lose(amount))
    }

    /// Out-of-combat decay for one turn. The caller checks combat status.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the character has no rage.
    pub fn decay_idle(
        &self,
        character: &mut Character,
    ) -> Result<ThresholdCrossing<RageTier>, DomainError> {
        Ok(character.rage_mut()?.meter.lose(self.rules.rage_idle_decay))
    }

    /// Drops rage to zero.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the character has no rage.
    pub fn reset(
        &self,
        character: &mut Character,
        cause: ResetCause,
    ) -> Result<ThresholdCrossing<RageTier>, DomainError> {
        let character_id = character.id;
        let crossing = character.rage_mut()?.meter.reset_to(METER_MIN);
        tracing::debug!(%character_id, ?cause, previous = crossing.previous_value, "rage reset");
        Ok(crossing)
    }
}
