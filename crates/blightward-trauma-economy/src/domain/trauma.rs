//! Permanent traumas.
//!
//! A character holds at most one instance per trauma id. Stackable traumas
//! count repeats on that instance; non-stackable ones refuse them. Instances
//! are never deleted implicitly, only suppressed or explicitly removed.

use blightward_content::config::TraumaRules;
use blightward_content::traumas::{
    RetirementRule, TraumaCatalog, TraumaCategory, TraumaEffect, normalize_id,
};
use blightward_core::clock::Clock;
use blightward_core::dice::DiceSource;
use blightward_core::error::{DomainError, Rejection, ensure_not_blank};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::character::Character;
use super::corruption::resolve_pool;

/// Reason given when a trauma forces retirement on acquisition.
pub const IMMEDIATE_RETIREMENT_REASON: &str = "Severe trauma forces immediate retirement";

/// Reason given when a trauma has stacked too far.
pub const STACKING_RETIREMENT_REASON: &str = "Critical trauma stacking forces retirement";

/// Reason given when enough distinct traumas have accumulated.
pub const ACCUMULATED_RETIREMENT_REASON: &str = "Accumulated trauma permits retirement";

/// One trauma held by a character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraumaInstance {
    /// Catalog id, lower-cased.
    pub trauma_id: String,
    /// Times acquired; always 1 for non-stackable traumas.
    pub stack_count: u32,
    /// When first acquired.
    pub acquired_at: DateTime<Utc>,
    /// False while narratively suppressed.
    pub active: bool,
    /// Where it came from.
    pub source: String,
}

/// Events that call for a trauma check, each tied to one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraumaCheckTrigger {
    /// Watched an ally die.
    AllyDeath,
    /// Stress reached 100.
    BreakingPoint,
    /// A surge of corruption.
    CorruptionSurge,
    /// Saw something that should not exist.
    HorrificDiscovery,
    /// Too long in a paradox zone.
    ProlongedExposure,
    /// Public failure or betrayal.
    Humiliation,
    /// Came within a breath of dying.
    NearDeath,
}

impl TraumaCheckTrigger {
    /// The category traumas are drawn from on failure.
    #[must_use]
    pub fn category(self) -> TraumaCategory {
        match self {
            Self::AllyDeath => TraumaCategory::Emotional,
            Self::BreakingPoint | Self::ProlongedExposure => TraumaCategory::Cognitive,
            Self::CorruptionSurge => TraumaCategory::Corruption,
            Self::HorrificDiscovery => TraumaCategory::Existential,
            Self::Humiliation => TraumaCategory::Social,
            Self::NearDeath => TraumaCategory::Physical,
        }
    }
}

/// Whether a character has to, or may, retire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetirementCheck {
    /// Retirement is mandatory.
    pub must_retire: bool,
    /// Retirement is the player's choice.
    pub can_continue_with_permission: bool,
    /// Why, for display.
    pub reason: Option<String>,
    /// The traumas responsible.
    pub contributing_traumas: Vec<String>,
}

impl RetirementCheck {
    /// Whether any retirement rule fired.
    #[must_use]
    pub fn triggered(&self) -> bool {
        self.must_retire || self.can_continue_with_permission
    }
}

/// What happened on acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AcquisitionOutcome {
    /// A new instance was created.
    Acquired,
    /// An existing instance stacked.
    Stacked {
        /// Stack count after this acquisition.
        stack_count: u32,
    },
    /// Nothing changed.
    Rejected(Rejection),
}

/// Result of acquiring a trauma.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraumaAcquisition {
    /// Catalog id.
    pub trauma_id: String,
    /// Display name.
    pub name: String,
    /// What happened.
    pub outcome: AcquisitionOutcome,
    /// Retirement evaluated after the acquisition.
    pub retirement: RetirementCheck,
}

impl TraumaAcquisition {
    /// Whether the character's traumas changed.
    #[must_use]
    pub fn changed(&self) -> bool {
        !matches!(self.outcome, AcquisitionOutcome::Rejected(_))
    }
}

/// A trauma effect currently in force.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveTraumaEffect {
    /// Trauma the effect comes from.
    pub trauma_id: String,
    /// Stack count of that trauma.
    pub stack_count: u32,
    /// The effect.
    pub effect: TraumaEffect,
}

/// Result of a resolved trauma check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraumaCheck {
    /// What called for the check.
    pub trigger: TraumaCheckTrigger,
    /// Category drawn from on failure.
    pub category: TraumaCategory,
    /// Dice rolled.
    pub pool_size: u32,
    /// Net successes.
    pub successes: u32,
    /// Successes needed.
    pub dc: u32,
    /// Whether the character resisted.
    pub passed: bool,
    /// The trauma acquired on failure.
    pub acquisition: Option<TraumaAcquisition>,
}

/// Outcome of a trauma-check request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TraumaCheckOutcome {
    /// The check was rolled.
    Resolved(TraumaCheck),
    /// The check could not be rolled.
    Rejected(Rejection),
}

/// Outcome of suppressing or restoring a trauma.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TraumaActivation {
    /// The trauma's active flag changed.
    Changed {
        /// Catalog id.
        trauma_id: String,
        /// New flag.
        active: bool,
    },
    /// Already in the requested state.
    Rejected(Rejection),
}

/// Trauma operations.
#[derive(Debug, Clone, Copy)]
pub struct TraumaTracker<'a> {
    catalog: &'a TraumaCatalog,
    rules: &'a TraumaRules,
}

impl<'a> TraumaTracker<'a> {
    /// A tracker over `catalog`.
    #[must_use]
    pub fn new(catalog: &'a TraumaCatalog, rules: &'a TraumaRules) -> Self {
        Self { catalog, rules }
    }

    /// Acquires a trauma, stacking or refusing repeats per its definition,
    /// then re-evaluates retirement.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for a blank id or source, and
    /// `DomainError::NotFound` for an id missing from the catalog.
    pub fn acquire_trauma(
        &self,
        character: &mut Character,
        trauma_id: &str,
        source: &str,
        clock: &dyn Clock,
    ) -> Result<TraumaAcquisition, DomainError> {
        ensure_not_blank(trauma_id, "trauma id")?;
        ensure_not_blank(source, "trauma source")?;
        let definition = self.catalog.get(trauma_id)?;

        let outcome = match character
            .traumas
            .iter_mut()
            .find(|t| t.trauma_id == definition.id)
        {
            Some(existing) if definition.stackable => {
                existing.stack_count += 1;
                AcquisitionOutcome::Stacked {
                    stack_count: existing.stack_count,
                }
            }
            Some(_) => AcquisitionOutcome::Rejected(Rejection::no_op(format!(
                "{} is already afflicted with {}, which does not stack.",
                character.name, definition.name
            ))),
            None => {
                character.traumas.push(TraumaInstance {
                    trauma_id: definition.id.clone(),
                    stack_count: 1,
                    acquired_at: clock.now(),
                    active: true,
                    source: source.to_owned(),
                });
                AcquisitionOutcome::Acquired
            }
        };

        let retirement = self.check_retirement(character)?;
        tracing::info!(
            character_id = %character.id,
            trauma_id = %definition.id,
            ?outcome,
            must_retire = retirement.must_retire,
            "trauma acquisition"
        );

        Ok(TraumaAcquisition {
            trauma_id: definition.id.clone(),
            name: definition.name.clone(),
            outcome,
            retirement,
        })
    }

    /// Evaluates the retirement rules over the character's active traumas.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if a held trauma is missing from the
    /// catalog.
    pub fn check_retirement(&self, character: &Character) -> Result<RetirementCheck, DomainError> {
        let mut immediate = Vec::new();
        let mut stacked = Vec::new();
        let mut active = Vec::new();

        for instance in character.traumas.iter().filter(|t| t.active) {
            let definition = self.catalog.get(&instance.trauma_id)?;
            active.push(instance.trauma_id.clone());
            match definition.retirement {
                RetirementRule::Immediate => immediate.push(instance.trauma_id.clone()),
                RetirementRule::AtStack { stacks } if instance.stack_count >= stacks => {
                    stacked.push(instance.trauma_id.clone());
                }
                _ => {}
            }
        }

        let check = if !immediate.is_empty() {
            RetirementCheck {
                must_retire: true,
                can_continue_with_permission: false,
                reason: Some(IMMEDIATE_RETIREMENT_REASON.to_owned()),
                contributing_traumas: immediate,
            }
        } else if !stacked.is_empty() {
            RetirementCheck {
                must_retire: true,
                can_continue_with_permission: false,
                reason: Some(STACKING_RETIREMENT_REASON.to_owned()),
                contributing_traumas: stacked,
            }
        } else if active.len() >= self.rules.retirement_threshold {
            RetirementCheck {
                must_retire: false,
                can_continue_with_permission: true,
                reason: Some(ACCUMULATED_RETIREMENT_REASON.to_owned()),
                contributing_traumas: active,
            }
        } else {
            RetirementCheck::default()
        };
        Ok(check)
    }

    /// Whether the character holds an active instance of `trauma_id`.
    #[must_use]
    pub fn has_trauma(&self, character: &Character, trauma_id: &str) -> bool {
        find(character, trauma_id).is_some_and(|t| t.active)
    }

    /// Number of distinct active traumas.
    #[must_use]
    pub fn active_count(&self, character: &Character) -> usize {
        character.traumas.iter().filter(|t| t.active).count()
    }

    /// Stack count of `trauma_id`, or 0 if not held.
    #[must_use]
    pub fn stack_count(&self, character: &Character, trauma_id: &str) -> u32 {
        find(character, trauma_id).map_or(0, |t| t.stack_count)
    }

    /// Held traumas, oldest first.
    #[must_use]
    pub fn traumas<'c>(&self, character: &'c Character) -> Vec<&'c TraumaInstance> {
        let mut traumas: Vec<&TraumaInstance> = character.traumas.iter().collect();
        traumas.sort_by_key(|t| t.acquired_at);
        traumas
    }

    /// Every effect of every active trauma.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if a held trauma is missing from the
    /// catalog.
    pub fn active_effects(
        &self,
        character: &Character,
    ) -> Result<Vec<ActiveTraumaEffect>, DomainError> {
        let mut effects = Vec::new();
        for instance in self.traumas(character).into_iter().filter(|t| t.active) {
            let definition = self.catalog.get(&instance.trauma_id)?;
            effects.extend(definition.effects.iter().map(|effect| ActiveTraumaEffect {
                trauma_id: instance.trauma_id.clone(),
                stack_count: instance.stack_count,
                effect: effect.clone(),
            }));
        }
        Ok(effects)
    }

    /// Suppresses or restores a held trauma.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for a blank reason and
    /// `DomainError::NotFound` if the character does not hold the trauma.
    pub fn set_active(
        &self,
        character: &mut Character,
        trauma_id: &str,
        active: bool,
        reason: &str,
    ) -> Result<TraumaActivation, DomainError> {
        ensure_not_blank(reason, "reason")?;
        let character_id = character.id;
        let key = normalize_id(trauma_id);
        let instance = character
            .traumas
            .iter_mut()
            .find(|t| t.trauma_id == key)
            .ok_or_else(|| DomainError::not_found("held trauma", trauma_id))?;

        if instance.active == active {
            let state = if active { "active" } else { "suppressed" };
            return Ok(TraumaActivation::Rejected(Rejection::no_op(format!(
                "{key} is already {state}."
            ))));
        }
        instance.active = active;
        tracing::info!(%character_id, trauma_id = %key, active, reason, "trauma activation changed");
        Ok(TraumaActivation::Changed {
            trauma_id: key,
            active,
        })
    }

    /// Removes a held trauma outright.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for a blank reason and
    /// `DomainError::NotFound` if the character does not hold the trauma.
    pub fn remove_trauma(
        &self,
        character: &mut Character,
        trauma_id: &str,
        reason: &str,
    ) -> Result<TraumaInstance, DomainError> {
        ensure_not_blank(reason, "reason")?;
        let key = normalize_id(trauma_id);
        let index = character
            .traumas
            .iter()
            .position(|t| t.trauma_id == key)
            .ok_or_else(|| DomainError::not_found("held trauma", trauma_id))?;
        let removed = character.traumas.remove(index);
        tracing::info!(character_id = %character.id, trauma_id = %key, reason, "trauma removed");
        Ok(removed)
    }

    /// Rolls a trauma check. On failure one trauma from the trigger's
    /// category is chosen by die roll and acquired.
    ///
    /// # Errors
    ///
    /// Propagates errors from the acquisition.
    pub fn perform_trauma_check(
        &self,
        character: &mut Character,
        trigger: TraumaCheckTrigger,
        dice: &mut dyn DiceSource,
        clock: &dyn Clock,
    ) -> Result<TraumaCheckOutcome, DomainError> {
        let category = trigger.category();
        let candidates = self.catalog.in_category(category);
        if candidates.is_empty() {
            return Ok(TraumaCheckOutcome::Rejected(Rejection::invalid_state(
                format!("No traumas are defined for the {category} category."),
            )));
        }

        let pool_size = resolve_pool(character.will, character.corruption.value());
        let dc = self.rules.check_dc;
        let successes = dice.roll_pool(pool_size, dc);
        let passed = successes >= dc;

        let acquisition = if passed {
            None
        } else {
            let sides = u32::try_from(candidates.len()).unwrap_or(u32::MAX);
            let roll = dice.roll_die(sides).clamp(1, sides);
            let index = usize::try_from(roll - 1).unwrap_or(0);
            let chosen = candidates[index].id.clone();
            Some(self.acquire_trauma(character, &chosen, &format!("{trigger:?} trauma check"), clock)?)
        };

        tracing::debug!(
            character_id = %character.id,
            ?trigger,
            pool_size,
            successes,
            dc,
            passed,
            "trauma check rolled"
        );

        Ok(TraumaCheckOutcome::Resolved(TraumaCheck {
            trigger,
            category,
            pool_size,
            successes,
            dc,
            passed,
            acquisition,
        }))
    }
}

fn find<'c>(character: &'c Character, trauma_id: &str) -> Option<&'c TraumaInstance> {
    let key = normalize_id(trauma_id);
    character.traumas.iter().find(|t| t.trauma_id == key)
}
