//! Bounded meters and their tier tables.
//!
//! Every resource in the trauma economy is a 0–100 integer whose tier is a
//! pure function of its value. A [`TierTable`] maps half-open value ranges
//! to a tier and a bundle of tier effects; a [`Meter`] owns the value and
//! reports every mutation as a [`ThresholdCrossing`].

use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Lowest value any meter can hold.
pub const METER_MIN: i32 = 0;

/// Highest value any meter can hold.
pub const METER_MAX: i32 = 100;

/// Clamps a value into the meter range.
#[must_use]
pub fn clamp_meter(value: i32) -> i32 {
    value.clamp(METER_MIN, METER_MAX)
}

/// The resources tracked by the trauma economy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Psychological strain.
    Stress,
    /// Blight corruption.
    Corruption,
    /// Berserker rage.
    Rage,
    /// Skirmisher momentum.
    Momentum,
    /// Mystic coherence.
    Coherence,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why a combat resource was forced back to its reset value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetCause {
    /// The character was stunned.
    Stunned,
    /// The character was frozen.
    Frozen,
    /// A long or sanctuary rest.
    Rest,
    /// The capstone ability spent the resource.
    Capstone,
}

/// One band of a tier table, covering `[floor, next band's floor)`.
#[derive(Debug)]
pub struct TierBand<T: 'static, E: 'static> {
    /// Tier this band maps to.
    pub tier: T,
    /// Lowest value in the band.
    pub floor: i32,
    /// Effects active while in this band.
    pub effects: E,
}

/// Ordered, non-overlapping bands covering `0..=100`. The first band's
/// floor must be 0 and floors must ascend.
#[derive(Debug)]
pub struct TierTable<T: 'static, E: 'static> {
    bands: &'static [TierBand<T, E>],
}

impl<T: Copy + PartialEq, E> TierTable<T, E> {
    /// Wraps a band list.
    #[must_use]
    pub const fn new(bands: &'static [TierBand<T, E>]) -> Self {
        Self { bands }
    }

    /// The band containing `value` (clamped into range first).
    #[must_use]
    pub fn band_for(&self, value: i32) -> &'static TierBand<T, E> {
        let value = clamp_meter(value);
        self.bands
            .iter()
            .rev()
            .find(|band| band.floor <= value)
            .unwrap_or(&self.bands[0])
    }

    /// Tier for `value`.
    #[must_use]
    pub fn tier_for(&self, value: i32) -> T {
        self.band_for(value).tier
    }

    /// Effects for `value`.
    #[must_use]
    pub fn effects_for(&self, value: i32) -> &'static E {
        &self.band_for(value).effects
    }

    /// Highest tier in the table.
    #[must_use]
    pub fn top_tier(&self) -> T {
        self.bands[self.bands.len() - 1].tier
    }

    /// Lowest value of `tier`, if the table contains it.
    #[must_use]
    pub fn floor_of(&self, tier: T) -> Option<i32> {
        self.bands.iter().find(|b| b.tier == tier).map(|b| b.floor)
    }

    /// All bands in ascending order.
    #[must_use]
    pub fn bands(&self) -> &'static [TierBand<T, E>] {
        self.bands
    }
}

/// Static description of one kind of meter.
pub trait MeterKind: Copy + fmt::Debug + Default + PartialEq + Eq + 'static {
    /// Ordered tier enum.
    type Tier: Copy + Eq + Ord + fmt::Debug + Serialize + 'static;
    /// Per-tier effect bundle.
    type Effects: fmt::Debug + 'static;

    /// Which resource this meter tracks.
    const RESOURCE: ResourceKind;

    /// The tier table for this meter.
    fn table() -> &'static TierTable<Self::Tier, Self::Effects>;

    /// Whether `value` sits at this meter's extreme boundary.
    fn is_extreme(value: i32) -> bool {
        let table = Self::table();
        table.tier_for(value) == table.top_tier()
    }
}

/// Result of every meter mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThresholdCrossing<T> {
    /// Which meter moved.
    pub resource: ResourceKind,
    /// Value before the call.
    pub previous_value: i32,
    /// Value after the call.
    pub new_value: i32,
    /// Signed change the caller asked for.
    pub requested: i32,
    /// Signed change actually applied after clamping.
    pub applied: i32,
    /// Tier before the call.
    pub previous_tier: T,
    /// Tier after the call.
    pub new_tier: T,
    /// Whether the tier changed (or, for resets, whether the value moved).
    pub threshold_crossed: bool,
    /// Whether the new value sits at the meter's extreme boundary.
    pub extreme: bool,
}

impl<T> ThresholdCrossing<T> {
    /// Absolute amount gained; 0 for losses.
    #[must_use]
    pub fn amount_gained(&self) -> i32 {
        self.applied.max(0)
    }

    /// Absolute amount lost; 0 for gains.
    #[must_use]
    pub fn amount_lost(&self) -> i32 {
        (-self.applied).max(0)
    }

    /// Whether the call changed the value at all.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.applied != 0
    }
}

/// A bounded 0–100 meter of kind `K`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Meter<K> {
    value: i32,
    kind: PhantomData<K>,
}

impl<K> Meter<K> {
    /// A meter at `value`, clamped into range.
    #[must_use]
    pub fn new(value: i32) -> Self {
        Self {
            value: clamp_meter(value),
            kind: PhantomData,
        }
    }

    /// Current value.
    #[must_use]
    pub fn value(&self) -> i32 {
        self.value
    }
}

impl<K> Default for Meter<K> {
    fn default() -> Self {
        Self::new(METER_MIN)
    }
}

impl<K: MeterKind> Meter<K> {
    /// Current tier.
    #[must_use]
    pub fn tier(&self) -> K::Tier {
        K::table().tier_for(self.value)
    }

    /// Effects of the current tier.
    #[must_use]
    pub fn effects(&self) -> &'static K::Effects {
        K::table().effects_for(self.value)
    }

    /// Whether the meter sits at its extreme boundary.
    #[must_use]
    pub fn is_extreme(&self) -> bool {
        K::is_extreme(self.value)
    }

    /// Adds `amount`, clamping at the ceiling.
    pub fn gain(&mut self, amount: i32) -> ThresholdCrossing<K::Tier> {
        self.shift(amount)
    }

    /// Subtracts `amount`, clamping at the floor.
    pub fn lose(&mut self, amount: i32) -> ThresholdCrossing<K::Tier> {
        self.shift(amount.saturating_neg())
    }

    /// Sets the value unconditionally. Reports a crossing whenever the value
    /// moves, even within one tier.
    pub fn reset_to(&mut self, target: i32) -> ThresholdCrossing<K::Tier> {
        let delta = clamp_meter(target) - self.value;
        let mut crossing = self.shift(delta);
        crossing.threshold_crossed |= crossing.changed();
        crossing
    }

    fn shift(&mut self, requested: i32) -> ThresholdCrossing<K::Tier> {
        let previous_value = self.value;
        let previous_tier = self.tier();
        self.value = clamp_meter(previous_value.saturating_add(requested));
        let new_tier = self.tier();

        if previous_tier != new_tier {
            tracing::debug!(
                resource = %K::RESOURCE,
                previous = previous_value,
                new = self.value,
                previous_tier = ?previous_tier,
                new_tier = ?new_tier,
                "meter crossed a tier threshold"
            );
        }

        ThresholdCrossing {
            resource: K::RESOURCE,
            previous_value,
            new_value: self.value,
            requested,
            applied: self.value - previous_value,
            previous_tier,
            new_tier,
            threshold_crossed: previous_tier != new_tier,
            extreme: K::is_extreme(self.value),
        }
    }
}

impl<K> Serialize for Meter<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.value)
    }
}

impl<'de, K> Deserialize<'de> for Meter<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i32::deserialize(deserializer).map(Self::new)
    }
}

/// A `(resource, threshold)` pair that may fire only once per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OneShotKey {
    /// Resource the threshold belongs to.
    pub resource: ResourceKind,
    /// Threshold value.
    pub threshold: i32,
}

/// Persisted record of one-shot thresholds that have already fired.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneShotLedger {
    fired: BTreeSet<OneShotKey>,
}

impl OneShotLedger {
    /// Records the threshold; returns `true` only the first time.
    pub fn fire_once(&mut self, resource: ResourceKind, threshold: i32) -> bool {
        self.fired.insert(OneShotKey {
            resource,
            threshold,
        })
    }

    /// Whether the threshold has fired before.
    #[must_use]
    pub fn has_fired(&self, resource: ResourceKind, threshold: i32) -> bool {
        self.fired.contains(&OneShotKey {
            resource,
            threshold,
        })
    }

    /// Every fired threshold, ordered.
    pub fn iter(&self) -> impl Iterator<Item = &OneShotKey> {
        self.fired.iter()
    }
}
