//! The character state the trauma economy reads and writes.

use blightward_core::clock::Clock;
use blightward_core::error::DomainError;
use blightward_core::repository::StoredCharacter;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::coherence::CoherenceState;
use super::corruption::Corruption;
use super::meter::{Meter, OneShotLedger};
use super::momentum::MomentumState;
use super::rage::RageState;
use super::stress::Stress;
use super::trauma::TraumaInstance;

const DEFAULT_MAX_HP: i32 = 100;
const DEFAULT_MAX_AP: i32 = 50;

fn default_max_hp() -> i32 {
    DEFAULT_MAX_HP
}

fn default_max_ap() -> i32 {
    DEFAULT_MAX_AP
}

/// One character's trauma-economy state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    /// Unique identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// WILL attribute; sizes resistance pools.
    pub will: u32,
    /// Armor soak before rage.
    #[serde(default)]
    pub base_armor: i32,
    /// Maximum HP before corruption penalties.
    #[serde(default = "default_max_hp")]
    pub base_max_hp: i32,
    /// Maximum AP before corruption penalties.
    #[serde(default = "default_max_ap")]
    pub base_max_ap: i32,
    /// Stress meter.
    #[serde(default)]
    pub stress: Meter<Stress>,
    /// Corruption meter.
    #[serde(default)]
    pub corruption: Meter<Corruption>,
    /// Rage, for berserkers.
    #[serde(default)]
    pub rage: Option<RageState>,
    /// Momentum, for skirmishers.
    #[serde(default)]
    pub momentum: Option<MomentumState>,
    /// Coherence, for mystics.
    #[serde(default)]
    pub coherence: Option<CoherenceState>,
    /// Traumas in acquisition order.
    #[serde(default)]
    pub traumas: Vec<TraumaInstance>,
    /// Thresholds that have already fired.
    #[serde(default)]
    pub one_shots: OneShotLedger,
    /// Lost to the Blight; no longer playable.
    #[serde(default)]
    pub forlorn: bool,
    /// The capstone ability has been spent this encounter.
    #[serde(default)]
    pub capstone_used_this_encounter: bool,
    /// Number of notifications journaled for this character.
    #[serde(default)]
    pub journal_position: i64,
    /// Persisted version, set on load.
    #[serde(skip)]
    pub version: i64,
}

impl Character {
    /// A fresh character with every meter at zero.
    #[must_use]
    pub fn new(id: Uuid, name: impl Into<String>, will: u32) -> Self {
        Self {
            id,
            name: name.into(),
            will,
            base_armor: 0,
            base_max_hp: DEFAULT_MAX_HP,
            base_max_ap: DEFAULT_MAX_AP,
            stress: Meter::default(),
            corruption: Meter::default(),
            rage: None,
            momentum: None,
            coherence: None,
            traumas: Vec::new(),
            one_shots: OneShotLedger::default(),
            forlorn: false,
            capstone_used_this_encounter: false,
            journal_position: 0,
            version: 0,
        }
    }

    /// Gives the character rage.
    #[must_use]
    pub fn with_rage(mut self) -> Self {
        self.rage = Some(RageState::default());
        self
    }

    /// Gives the character momentum.
    #[must_use]
    pub fn with_momentum(mut self) -> Self {
        self.momentum = Some(MomentumState::default());
        self
    }

    /// Gives the character coherence resting at `baseline`.
    #[must_use]
    pub fn with_coherence(mut self, baseline: i32) -> Self {
        self.coherence = Some(CoherenceState::at_baseline(baseline));
        self
    }

    /// Sets base armor.
    #[must_use]
    pub fn with_armor(mut self, armor: i32) -> Self {
        self.base_armor = armor;
        self
    }

    /// Rage state.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the character has no rage.
    pub fn rage(&self) -> Result<&RageState, DomainError> {
        self.rage
            .as_ref()
            .ok_or_else(|| DomainError::not_found("rage resource", self.id))
    }

    /// Mutable rage state.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the character has no rage.
    pub fn rage_mut(&mut self) -> Result<&mut RageState, DomainError> {
        let id = self.id;
        self.rage
            .as_mut()
            .ok_or_else(|| DomainError::not_found("rage resource", id))
    }

    /// Momentum state.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the character has no momentum.
    pub fn momentum(&self) -> Result<&MomentumState, DomainError> {
        self.momentum
            .as_ref()
            .ok_or_else(|| DomainError::not_found("momentum resource", self.id))
    }

    /// Mutable momentum state.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the character has no momentum.
    pub fn momentum_mut(&mut self) -> Result<&mut MomentumState, DomainError> {
        let id = self.id;
        self.momentum
            .as_mut()
            .ok_or_else(|| DomainError::not_found("momentum resource", id))
    }

    /// Coherence state.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the character has no coherence.
    pub fn coherence(&self) -> Result<&CoherenceState, DomainError> {
        self.coherence
            .as_ref()
            .ok_or_else(|| DomainError::not_found("coherence resource", self.id))
    }

    /// Mutable coherence state.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the character has no coherence.
    pub fn coherence_mut(&mut self) -> Result<&mut CoherenceState, DomainError> {
        let id = self.id;
        self.coherence
            .as_mut()
            .ok_or_else(|| DomainError::not_found("coherence resource", id))
    }

    /// Serializes the character for the repository.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if serialization fails.
    pub fn to_stored(&self, clock: &dyn Clock) -> Result<StoredCharacter, DomainError> {
        let payload = serde_json::to_value(self)
            .map_err(|e| DomainError::Infrastructure(format!("serialize character: {e}")))?;
        Ok(StoredCharacter {
            character_id: self.id,
            version: self.version,
            payload,
            updated_at: clock.now(),
        })
    }

    /// Rebuilds a character from its stored form.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the payload is malformed.
    pub fn from_stored(stored: &StoredCharacter) -> Result<Self, DomainError> {
        let mut character: Self = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DomainError::Infrastructure(format!("deserialize character: {e}")))?;
        if character.id != stored.character_id {
            return Err(DomainError::Infrastructure(format!(
                "stored character {} carries payload for {}",
                stored.character_id, character.id
            )));
        }
        character.version = stored.version;
        Ok(character)
    }
}
