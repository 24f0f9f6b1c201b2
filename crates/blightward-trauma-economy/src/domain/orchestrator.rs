//! Cross-system coordination over one character's trauma economy.
//!
//! The orchestrator is the only component that knows every tracker. It runs
//! damage, rest and turn boundaries through them in a fixed order, turns
//! their results into notifications, and builds the derived state view.
//! It never rolls a trauma check on its own: results report that one is
//! owed and the caller decides when to resolve it.

use std::fmt::Debug;
use std::sync::Arc;

use blightward_content::RulesContent;
use blightward_content::panic::PanicEntry;
use blightward_core::clock::Clock;
use blightward_core::dice::DiceSource;
use blightward_core::error::{DomainError, Rejection, ensure_non_negative};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::character::Character;
use super::coherence::{
    APOTHEOSIS_THRESHOLD, ApotheosisTransition, ApotheosisUpkeep, CascadeCheck, CoherenceChange,
    CoherenceSource, CoherenceTracker,
};
use super::corruption::{
    CorruptionGain, CorruptionSource, CorruptionTracker, CorruptionTransfer, TerminalErrorCheck,
    resolve_pool,
};
use super::cps::{CpsStageChange, CpsTracker, PanicRoll};
use super::events::{
    AbilitiesUnlocked, ApotheosisEntered, ApotheosisExited, BecameForlorn, CascadeTriggered,
    CorruptionMilestoneReached, CpsStageChanged, PanicTriggered, RetirementRequired,
    TerminalErrorRequired, ThresholdCrossed, TraumaAcquired, TraumaCheckRequired,
    TraumaEconomyEventKind,
};
use super::meter::{METER_MAX, ResetCause, ResourceKind, ThresholdCrossing};
use super::momentum::{MomentumGain, MomentumSource, MomentumTier, MomentumTracker};
use super::rage::{RageSource, RageTier, RageTracker, gain_from_damage_taken};
use super::state::{
    TraumaEconomySnapshot, TraumaEconomyState, apply_percent_penalty, resource_warnings,
    warning_level, warning_messages,
};
use super::stress::{
    RestType, StressApplication, StressRecovery, StressSource, StressTier, StressTracker,
};
use super::trauma::{
    AcquisitionOutcome, TraumaAcquisition, TraumaCheck, TraumaCheckOutcome, TraumaCheckTrigger,
    TraumaTracker,
};

/// Recovery source recorded for the party bonus.
pub const PARTY_CALM_SOURCE: &str = "Party calm";

/// Damage left after soak. Any damage that lands deals at least 1.
#[must_use]
pub fn damage_after_soak(damage: i32, soak: i32) -> i32 {
    if damage <= 0 {
        0
    } else {
        (damage - soak.max(0)).max(1)
    }
}

/// Circumstances of a hit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DamageContext {
    /// The hit was a critical.
    pub critical_hit: bool,
    /// The hit left the character near death.
    pub near_death: bool,
    /// The character watched an ally die this hit.
    pub ally_death_witnessed: bool,
    /// Resistance DC for the stress; 0 skips the roll.
    pub resist_dc: u32,
}

/// A result together with the notifications it raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notified<T> {
    /// The operation's result.
    pub outcome: T,
    /// Notifications for the character, in order.
    pub events: Vec<TraumaEconomyEventKind>,
}

/// Everything a hit did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DamageResult {
    /// Damage before soak.
    pub damage: i32,
    /// Armor plus rage soak.
    pub soak: i32,
    /// Damage that drove stress and rage.
    pub damage_after_soak: i32,
    /// Stress gained.
    pub stress: StressApplication,
    /// Rage gained, for berserkers.
    pub rage: Option<ThresholdCrossing<RageTier>>,
    /// Momentum lost to a critical, for skirmishers.
    pub momentum: Option<ThresholdCrossing<MomentumTier>>,
    /// Coherence lost to a critical, for mystics.
    pub coherence: Option<CoherenceChange>,
    /// Forced Apotheosis exit because stress hit 100.
    pub apotheosis_exit: Option<CoherenceChange>,
    /// CPS movement.
    pub cps_change: CpsStageChange,
    /// Stress reached 100; a breaking-point check is owed.
    pub trauma_check_triggered: bool,
    /// Every trauma check the hit made owed, breaking point included.
    pub trauma_checks_owed: Vec<TraumaCheckTrigger>,
    /// Corruption sits at 100; a terminal-error check is still owed.
    pub terminal_error_pending: bool,
    /// Notifications raised.
    pub events: Vec<TraumaEconomyEventKind>,
}

/// Stress relief a party shares on rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartyContext {
    /// Extra stress recovered by every member on long and sanctuary rests.
    pub stress_reduction: i32,
    /// Members providing the relief.
    pub source_ids: Vec<Uuid>,
}

/// Everything a rest did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestResult {
    /// Kind of rest.
    pub rest: RestType,
    /// Stress recovered by the rest itself.
    pub recovery: StressRecovery,
    /// Stress recovered from the party bonus.
    pub party_bonus: Option<StressRecovery>,
    /// Rage reset.
    pub rage: Option<ThresholdCrossing<RageTier>>,
    /// Momentum reset.
    pub momentum: Option<ThresholdCrossing<MomentumTier>>,
    /// Coherence returned to baseline.
    pub coherence: Option<CoherenceChange>,
    /// CPS movement.
    pub cps_change: CpsStageChange,
    /// Notifications raised.
    pub events: Vec<TraumaEconomyEventKind>,
}

/// Everything the start of a turn did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnStartResult {
    /// Idle rage decay, out of combat only.
    pub rage_decay: Option<ThresholdCrossing<RageTier>>,
    /// Idle momentum decay, out of combat only.
    pub momentum_decay: Option<ThresholdCrossing<MomentumTier>>,
    /// Apotheosis upkeep, while held.
    pub apotheosis_upkeep: Option<ApotheosisUpkeep>,
    /// Stress paid for the upkeep.
    pub upkeep_stress: Option<StressApplication>,
    /// Forced Apotheosis exit because stress hit 100.
    pub apotheosis_exit: Option<CoherenceChange>,
    /// CPS movement.
    pub cps_change: CpsStageChange,
    /// Stress reached 100; a breaking-point check is owed.
    pub trauma_check_triggered: bool,
    /// Notifications raised.
    pub events: Vec<TraumaEconomyEventKind>,
}

/// A panic effect the combat layer must apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanicOutcome {
    /// Die face.
    pub roll: u32,
    /// Selected row.
    pub entry: PanicEntry,
}

/// Everything the end of a turn did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnEndResult {
    /// Environmental stress applied, after the per-turn cap.
    pub environmental_stress: Option<StressApplication>,
    /// Forced Apotheosis exit because stress hit 100.
    pub apotheosis_exit: Option<CoherenceChange>,
    /// Panic rolled, when the character is panic-eligible.
    pub panic: Option<PanicOutcome>,
    /// CPS movement.
    pub cps_change: CpsStageChange,
    /// Stress reached 100; a breaking-point check is owed.
    pub trauma_check_triggered: bool,
    /// Notifications raised.
    pub events: Vec<TraumaEconomyEventKind>,
}

/// A resolved breaking point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakingPointResolution {
    /// The trauma check.
    pub check: TraumaCheck,
    /// Stress reset after the check.
    pub reset: ThresholdCrossing<StressTier>,
    /// CPS movement.
    pub cps_change: CpsStageChange,
}

/// Outcome of a breaking-point request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BreakingPointOutcome {
    /// The check was rolled and stress reset.
    Resolved(BreakingPointResolution),
    /// No breaking point to resolve.
    Rejected(Rejection),
}

/// Outcome of a capstone request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CapstoneOutcome {
    /// The capstone fired and spent the resource.
    Used {
        /// Resource spent.
        resource: ResourceKind,
        /// Value after spending.
        new_value: i32,
    },
    /// The capstone is not available.
    Rejected(Rejection),
}

/// Resources dropped by incapacitation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncapacitationReset {
    /// What happened.
    pub cause: ResetCause,
    /// Rage reset.
    pub rage: Option<ThresholdCrossing<RageTier>>,
    /// Momentum reset.
    pub momentum: Option<ThresholdCrossing<MomentumTier>>,
}

/// A cascade check and the penalties it applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeResult {
    /// The roll.
    pub check: CascadeCheck,
    /// Stress from the backlash.
    pub stress: Option<StressApplication>,
    /// Corruption from the backlash.
    pub corruption: Option<CorruptionGain>,
}

/// A corruption transfer with notifications for each side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferResult {
    /// The transfer.
    pub outcome: CorruptionTransfer,
    /// Notifications for the giving character.
    pub source_events: Vec<TraumaEconomyEventKind>,
    /// Notifications for the receiving character.
    pub target_events: Vec<TraumaEconomyEventKind>,
}

/// Collects notifications while an operation runs.
#[derive(Debug, Default)]
struct Notifications {
    events: Vec<TraumaEconomyEventKind>,
}

impl Notifications {
    fn push(&mut self, event: TraumaEconomyEventKind) {
        self.events.push(event);
    }

    fn crossing<T: Debug>(&mut self, crossing: &ThresholdCrossing<T>) {
        if let Some(event) = ThresholdCrossed::from_crossing(crossing) {
            self.push(TraumaEconomyEventKind::ThresholdCrossed(event));
        }
    }

    fn trauma_check(&mut self, trigger: TraumaCheckTrigger) {
        self.push(TraumaEconomyEventKind::TraumaCheckRequired(
            TraumaCheckRequired { trigger },
        ));
    }

    fn stress(&mut self, application: &StressApplication) {
        self.crossing(&application.crossing);
        if application.trauma_check_triggered {
            self.trauma_check(TraumaCheckTrigger::BreakingPoint);
        }
    }

    fn corruption(&mut self, gain: &CorruptionGain) {
        self.crossing(&gain.crossing);
        if let Some(milestone) = gain.milestone_reached {
            self.push(TraumaEconomyEventKind::CorruptionMilestoneReached(
                CorruptionMilestoneReached { milestone },
            ));
        }
        if gain.terminal_error_triggered {
            self.push(TraumaEconomyEventKind::TerminalErrorRequired(
                TerminalErrorRequired {
                    corruption: gain.crossing.new_value,
                },
            ));
        }
    }

    fn coherence(&mut self, change: &CoherenceChange, affordable_turns: i32) {
        self.crossing(&change.crossing);
        match change.apotheosis {
            Some(ApotheosisTransition::Entered { abilities_unlocked }) => {
                self.push(TraumaEconomyEventKind::ApotheosisEntered(
                    ApotheosisEntered { affordable_turns },
                ));
                if abilities_unlocked {
                    self.push(TraumaEconomyEventKind::AbilitiesUnlocked(
                        AbilitiesUnlocked {
                            resource: ResourceKind::Coherence,
                            threshold: APOTHEOSIS_THRESHOLD,
                        },
                    ));
                }
            }
            Some(ApotheosisTransition::Exited { cause }) => {
                self.push(TraumaEconomyEventKind::ApotheosisExited(ApotheosisExited {
                    cause,
                }));
            }
            None => {}
        }
    }

    fn cps(&mut self, change: &CpsStageChange) {
        if change.changed {
            self.push(TraumaEconomyEventKind::CpsStageChanged(CpsStageChanged {
                previous: change.previous,
                new: change.new,
            }));
        }
    }

    fn acquisition(&mut self, acquisition: &TraumaAcquisition) {
        let stack_count = match acquisition.outcome {
            AcquisitionOutcome::Acquired => 1,
            AcquisitionOutcome::Stacked { stack_count } => stack_count,
            AcquisitionOutcome::Rejected(_) => return,
        };
        self.push(TraumaEconomyEventKind::TraumaAcquired(TraumaAcquired {
            trauma_id: acquisition.trauma_id.clone(),
            name: acquisition.name.clone(),
            stack_count,
        }));

        let retirement = &acquisition.retirement;
        if retirement.triggered() {
            self.push(TraumaEconomyEventKind::RetirementRequired(
                RetirementRequired {
                    mandatory: retirement.must_retire,
                    reason: retirement.reason.clone().unwrap_or_default(),
                    contributing_traumas: retirement.contributing_traumas.clone(),
                },
            ));
        }
    }

    fn trauma_check_outcome(&mut self, outcome: &TraumaCheckOutcome) {
        if let TraumaCheckOutcome::Resolved(TraumaCheck {
            acquisition: Some(acquisition),
            ..
        }) = outcome
        {
            self.acquisition(acquisition);
        }
    }

    fn finish(self) -> Vec<TraumaEconomyEventKind> {
        self.events
    }
}

/// Runs game events across every tracker of a character.
#[derive(Debug, Clone)]
pub struct TraumaEconomyOrchestrator {
    content: Arc<RulesContent>,
}

impl TraumaEconomyOrchestrator {
    /// An orchestrator over `content`.
    #[must_use]
    pub fn new(content: Arc<RulesContent>) -> Self {
        Self { content }
    }

    /// The rules in force.
    #[must_use]
    pub fn content(&self) -> &RulesContent {
        &self.content
    }

    /// Stress tracker over the loaded rules.
    #[must_use]
    pub fn stress(&self) -> StressTracker<'_> {
        StressTracker::new(&self.content.config.stress)
    }

    /// Corruption tracker over the loaded rules.
    #[must_use]
    pub fn corruption(&self) -> CorruptionTracker<'_> {
        CorruptionTracker::new(&self.content.config.corruption)
    }

    /// CPS tracker over the loaded panic table.
    #[must_use]
    pub fn cps(&self) -> CpsTracker<'_> {
        CpsTracker::new(&self.content.panic_table)
    }

    /// Trauma tracker over the loaded catalog.
    #[must_use]
    pub fn traumas(&self) -> TraumaTracker<'_> {
        TraumaTracker::new(&self.content.traumas, &self.content.config.trauma)
    }

    /// Rage tracker over the loaded rules.
    #[must_use]
    pub fn rage(&self) -> RageTracker<'_> {
        RageTracker::new(&self.content.config.resources)
    }

    /// Momentum tracker over the loaded rules.
    #[must_use]
    pub fn momentum(&self) -> MomentumTracker<'_> {
        MomentumTracker::new(&self.content.config.resources)
    }

    /// Coherence tracker over the loaded rules.
    #[must_use]
    pub fn coherence(&self) -> CoherenceTracker<'_> {
        CoherenceTracker::new(&self.content.config.resources)
    }

    /// The unified view of a character.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if a held trauma is missing from the
    /// catalog.
    pub fn state(&self, character: &Character) -> Result<TraumaEconomyState, DomainError> {
        let stress = self.stress().state(character);
        let corruption = self.corruption().state(character);
        let cps = self.cps().state(character);
        let trauma_tracker = self.traumas();
        let traumas = trauma_tracker
            .traumas(character)
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();
        let retirement = trauma_tracker.check_retirement(character)?;

        let rage = match character.rage {
            Some(_) => Some(self.rage().state(character)?),
            None => None,
        };
        let momentum = match character.momentum {
            Some(_) => Some(self.momentum().state(character)?),
            None => None,
        };
        let coherence = match character.coherence {
            Some(_) => Some(self.coherence().state(character)?),
            None => None,
        };

        let rules = &self.content.config.warnings;
        let level = warning_level(stress.value, corruption.value, cps.panic_eligible, rules);
        let mut warnings = warning_messages(
            stress.value,
            corruption.value,
            cps.panic_eligible,
            trauma_tracker.active_count(character),
            rules,
        );
        warnings.extend(resource_warnings(
            rage.as_ref().map(|r| r.value),
            momentum.as_ref().map(|m| m.value),
            coherence.as_ref().map(|c| c.value),
            rules,
        ));

        Ok(TraumaEconomyState {
            character_id: character.id,
            name: character.name.clone(),
            effective_max_hp: apply_percent_penalty(
                character.base_max_hp,
                corruption.hp_penalty_percent,
            ),
            effective_max_ap: apply_percent_penalty(
                character.base_max_ap,
                corruption.ap_penalty_percent,
            ),
            effective_resolve: resolve_pool(character.will, corruption.value),
            total_defense_penalty: stress.defense_penalty,
            total_skill_penalty: i32::from(stress.skill_disadvantage) + cps.logic_disadvantage,
            warning_level: level,
            warnings,
            capstone_used_this_encounter: character.capstone_used_this_encounter,
            stress,
            corruption,
            cps,
            traumas,
            retirement,
            rage,
            momentum,
            coherence,
        })
    }

    /// A serializable point-in-time record of the character.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Self::state`].
    pub fn snapshot(
        &self,
        character: &Character,
        clock: &dyn Clock,
    ) -> Result<TraumaEconomySnapshot, DomainError> {
        let state = self.state(character)?;
        Ok(TraumaEconomySnapshot::capture(
            &state,
            clock.now(),
            self.content.fingerprint(),
        ))
    }

    /// Runs a hit through soak, stress, rage and the critical-hit losses.
    /// Stress and rage are driven by post-soak damage.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if `damage` is negative.
    pub fn process_damage(
        &self,
        character: &mut Character,
        damage: i32,
        context: &DamageContext,
        dice: &mut dyn DiceSource,
    ) -> Result<DamageResult, DomainError> {
        ensure_non_negative(damage, "damage")?;
        let rules = &self.content.config.damage;
        let mut notes = Notifications::default();
        let previous_stress = character.stress.value();

        let soak = character
            .base_armor
            .max(0)
            .saturating_add(self.rage().soak_bonus(character));
        let after_soak = damage_after_soak(damage, soak);

        let mut stress_amount = after_soak / rules.stress_divisor.max(1);
        if context.critical_hit {
            stress_amount = stress_amount.saturating_add(rules.critical_hit_stress);
        }
        if context.near_death {
            stress_amount = stress_amount.saturating_add(rules.near_death_stress);
        }
        if context.ally_death_witnessed {
            stress_amount = stress_amount.saturating_add(rules.ally_death_stress);
        }
        let stress = self.stress().apply_stress(
            character,
            stress_amount,
            StressSource::Combat,
            context.resist_dc,
            dice,
        )?;
        notes.stress(&stress);

        let mut trauma_checks_owed = Vec::new();
        if stress.trauma_check_triggered {
            trauma_checks_owed.push(TraumaCheckTrigger::BreakingPoint);
        }
        for (owed, trigger) in [
            (context.near_death, TraumaCheckTrigger::NearDeath),
            (context.ally_death_witnessed, TraumaCheckTrigger::AllyDeath),
        ] {
            if owed {
                trauma_checks_owed.push(trigger);
                notes.trauma_check(trigger);
            }
        }

        let rage = match character.rage {
            Some(_) => {
                let crossing = self.rage().gain(
                    character,
                    gain_from_damage_taken(after_soak, rules.rage_divisor),
                    RageSource::TakingDamage,
                )?;
                notes.crossing(&crossing);
                Some(crossing)
            }
            None => None,
        };

        let momentum = match character.momentum {
            Some(_) if context.critical_hit => {
                let crossing = self
                    .momentum()
                    .lose(character, rules.momentum_loss_on_critical)?;
                notes.crossing(&crossing);
                Some(crossing)
            }
            _ => None,
        };

        let coherence = match character.coherence {
            Some(_) if context.critical_hit => {
                let change = self
                    .coherence()
                    .lose(character, rules.coherence_loss_on_critical)?;
                notes.coherence(&change, 0);
                Some(change)
            }
            _ => None,
        };

        let apotheosis_exit = self.enforce_stress_ceiling(character, &mut notes)?;
        let cps_change = self
            .cps()
            .check_stage_change(previous_stress, character.stress.value());
        notes.cps(&cps_change);

        tracing::debug!(
            character_id = %character.id,
            damage,
            soak,
            after_soak,
            stress = character.stress.value(),
            trauma_check_triggered = stress.trauma_check_triggered,
            "damage processed"
        );

        Ok(DamageResult {
            damage,
            soak,
            damage_after_soak: after_soak,
            trauma_check_triggered: stress.trauma_check_triggered,
            stress,
            rage,
            momentum,
            coherence,
            apotheosis_exit,
            cps_change,
            trauma_checks_owed,
            terminal_error_pending: character.corruption.is_extreme(),
            events: notes.finish(),
        })
    }

    /// The relief a party shares on rest, read from members' rage before
    /// anyone rests. Relief from several members does not stack.
    #[must_use]
    pub fn party_context(&self, members: &[Character]) -> PartyContext {
        let tracker = self.rage();
        let providers = members
            .iter()
            .filter_map(|member| {
                tracker
                    .state(member)
                    .ok()
                    .filter(|status| status.party_stress_reduction > 0)
                    .map(|status| (member.id, status.party_stress_reduction))
            })
            .collect::<Vec<_>>();
        PartyContext {
            stress_reduction: providers.iter().map(|(_, r)| *r).max().unwrap_or(0),
            source_ids: providers.into_iter().map(|(id, _)| id).collect(),
        }
    }

    /// Rests one character: stress recovery, resource resets on long and
    /// sanctuary rests, then the party bonus.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the party bonus is negative.
    pub fn process_rest(
        &self,
        character: &mut Character,
        rest: RestType,
        party: Option<&PartyContext>,
    ) -> Result<RestResult, DomainError> {
        let mut notes = Notifications::default();
        let previous_stress = character.stress.value();

        let recovery = self.stress().recover_for_rest(character, rest);
        notes.crossing(&recovery.crossing);

        let (mut rage, mut momentum, mut coherence) = (None, None, None);
        if rest.resets_resources() {
            if character.rage.is_some() {
                let crossing = self.rage().reset(character, ResetCause::Rest)?;
                notes.crossing(&crossing);
                rage = Some(crossing);
            }
            if character.momentum.is_some() {
                let crossing = self.momentum().reset(character, ResetCause::Rest)?;
                notes.crossing(&crossing);
                momentum = Some(crossing);
            }
            if character.coherence.is_some() {
                let change = self.coherence().reset(character, ResetCause::Rest)?;
                notes.coherence(&change, 0);
                coherence = Some(change);
            }
        }

        let party_bonus = match party {
            Some(party) if rest.resets_resources() && party.stress_reduction != 0 => {
                let bonus =
                    self.stress()
                        .recover(character, party.stress_reduction, PARTY_CALM_SOURCE)?;
                notes.crossing(&bonus.crossing);
                Some(bonus)
            }
            _ => None,
        };

        let cps_change = self
            .cps()
            .check_stage_change(previous_stress, character.stress.value());
        notes.cps(&cps_change);

        tracing::debug!(
            character_id = %character.id,
            ?rest,
            previous_stress,
            stress = character.stress.value(),
            party_bonus = party_bonus.is_some(),
            "rest processed"
        );

        Ok(RestResult {
            rest,
            recovery,
            party_bonus,
            rage,
            momentum,
            coherence,
            cps_change,
            events: notes.finish(),
        })
    }

    /// Rests a whole party. The party bonus is read from every member before
    /// anyone's rage resets.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Self::process_rest`].
    pub fn process_party_rest(
        &self,
        members: &mut [Character],
        rest: RestType,
    ) -> Result<Vec<RestResult>, DomainError> {
        let party = self.party_context(members);
        members
            .iter_mut()
            .map(|member| self.process_rest(member, rest, Some(&party)))
            .collect()
    }

    /// Start of a turn: idle decay out of combat, then Apotheosis upkeep.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` only if a held resource vanishes
    /// mid-call.
    pub fn process_turn_start(
        &self,
        character: &mut Character,
        in_combat: bool,
    ) -> Result<TurnStartResult, DomainError> {
        let mut notes = Notifications::default();
        let previous_stress = character.stress.value();

        let (mut rage_decay, mut momentum_decay) = (None, None);
        if !in_combat {
            if character.rage.is_some() {
                let crossing = self.rage().decay_idle(character)?;
                notes.crossing(&crossing);
                rage_decay = Some(crossing);
            }
            if character.momentum.is_some() {
                let crossing = self.momentum().decay_idle(character)?;
                notes.crossing(&crossing);
                momentum_decay = Some(crossing);
            }
        }

        let apotheosis_upkeep = match character.coherence {
            Some(_) => self.coherence().maintain_apotheosis(character)?,
            None => None,
        };
        let upkeep_stress = match apotheosis_upkeep {
            Some(upkeep) => {
                let application = self.stress().apply_unresisted(
                    character,
                    upkeep.stress_cost,
                    StressSource::Apotheosis,
                )?;
                notes.stress(&application);
                Some(application)
            }
            None => None,
        };

        let apotheosis_exit = self.enforce_stress_ceiling(character, &mut notes)?;
        let cps_change = self
            .cps()
            .check_stage_change(previous_stress, character.stress.value());
        notes.cps(&cps_change);

        Ok(TurnStartResult {
            rage_decay,
            momentum_decay,
            apotheosis_upkeep,
            trauma_check_triggered: upkeep_stress
                .as_ref()
                .is_some_and(|s| s.trauma_check_triggered),
            upkeep_stress,
            apotheosis_exit,
            cps_change,
            events: notes.finish(),
        })
    }

    /// End of a turn: capped environmental stress, then a panic roll if the
    /// character is panic-eligible afterwards.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if `environmental_stress` is
    /// negative, and `DomainError::NotFound` if the panic die lands on a
    /// face the table does not cover.
    pub fn process_turn_end(
        &self,
        character: &mut Character,
        environmental_stress: i32,
        dice: &mut dyn DiceSource,
    ) -> Result<TurnEndResult, DomainError> {
        ensure_non_negative(environmental_stress, "environmental stress")?;
        let mut notes = Notifications::default();
        let previous_stress = character.stress.value();

        let environmental = if environmental_stress > 0 {
            let capped = environmental_stress.min(self.content.config.stress.environmental_turn_cap);
            let application =
                self.stress()
                    .apply_unresisted(character, capped, StressSource::Environmental)?;
            notes.stress(&application);
            Some(application)
        } else {
            None
        };

        let apotheosis_exit = self.enforce_stress_ceiling(character, &mut notes)?;

        let panic = match self.cps().roll_panic_table(character, dice)? {
            PanicRoll::Rolled { roll, entry } => {
                notes.push(TraumaEconomyEventKind::PanicTriggered(PanicTriggered {
                    roll,
                    effect: entry.effect,
                    name: entry.name.clone(),
                    duration_turns: entry.duration_turns,
                    statuses: entry.statuses.clone(),
                    forced_action: entry.forced_action,
                }));
                Some(PanicOutcome { roll, entry })
            }
            PanicRoll::Rejected(_) => None,
        };

        let cps_change = self
            .cps()
            .check_stage_change(previous_stress, character.stress.value());
        notes.cps(&cps_change);

        Ok(TurnEndResult {
            trauma_check_triggered: environmental
                .as_ref()
                .is_some_and(|s| s.trauma_check_triggered),
            environmental_stress: environmental,
            apotheosis_exit,
            panic,
            cps_change,
            events: notes.finish(),
        })
    }

    /// Rolls the breaking-point trauma check owed at 100 stress, then resets
    /// stress according to the result.
    ///
    /// # Errors
    ///
    /// Propagates errors from the trauma acquisition.
    pub fn resolve_breaking_point(
        &self,
        character: &mut Character,
        dice: &mut dyn DiceSource,
        clock: &dyn Clock,
    ) -> Result<Notified<BreakingPointOutcome>, DomainError> {
        let current = character.stress.value();
        if current != METER_MAX {
            return Ok(Notified {
                outcome: BreakingPointOutcome::Rejected(Rejection::invalid_state(format!(
                    "A breaking point requires stress 100; current stress is {current}."
                ))),
                events: Vec::new(),
            });
        }

        let mut notes = Notifications::default();
        let outcome = self.traumas().perform_trauma_check(
            character,
            TraumaCheckTrigger::BreakingPoint,
            dice,
            clock,
        )?;
        notes.trauma_check_outcome(&outcome);

        let check = match outcome {
            TraumaCheckOutcome::Resolved(check) => check,
            TraumaCheckOutcome::Rejected(rejection) => {
                return Ok(Notified {
                    outcome: BreakingPointOutcome::Rejected(rejection),
                    events: notes.finish(),
                });
            }
        };

        let reset = self.stress().reset_after_trauma_check(character, check.passed);
        notes.crossing(&reset);
        let cps_change = self.cps().check_stage_change(current, reset.new_value);
        notes.cps(&cps_change);

        tracing::info!(
            character_id = %character.id,
            passed = check.passed,
            stress = reset.new_value,
            "breaking point resolved"
        );

        Ok(Notified {
            outcome: BreakingPointOutcome::Resolved(BreakingPointResolution {
                check,
                reset,
                cps_change,
            }),
            events: notes.finish(),
        })
    }

    /// Rolls the terminal-error check owed at 100 corruption.
    pub fn resolve_terminal_error(
        &self,
        character: &mut Character,
        dice: &mut dyn DiceSource,
    ) -> Notified<TerminalErrorCheck> {
        let mut notes = Notifications::default();
        let outcome = self.corruption().perform_terminal_error_check(character, dice);
        match &outcome {
            TerminalErrorCheck::Survived { crossing, .. } => notes.crossing(crossing),
            TerminalErrorCheck::Forlorn { successes, .. } => {
                notes.push(TraumaEconomyEventKind::BecameForlorn(BecameForlorn {
                    successes: *successes,
                }));
            }
            TerminalErrorCheck::Rejected(_) => {}
        }
        Notified {
            outcome,
            events: notes.finish(),
        }
    }

    /// Makes the capstone available again. Returns whether it had been
    /// spent.
    pub fn begin_encounter(&self, character: &mut Character) -> bool {
        std::mem::take(&mut character.capstone_used_this_encounter)
    }

    /// Fires the capstone of `resource`, spending it to its reset value.
    /// Allowed once per encounter and only at exactly 100.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for a resource without a
    /// capstone and `DomainError::NotFound` if the character does not hold
    /// the resource.
    pub fn use_capstone(
        &self,
        character: &mut Character,
        resource: ResourceKind,
    ) -> Result<Notified<CapstoneOutcome>, DomainError> {
        let value = match resource {
            ResourceKind::Rage => character.rage()?.meter.value(),
            ResourceKind::Momentum => character.momentum()?.meter.value(),
            ResourceKind::Coherence => character.coherence()?.meter.value(),
            ResourceKind::Stress | ResourceKind::Corruption => {
                return Err(DomainError::invalid_argument(format!(
                    "{resource} has no capstone ability"
                )));
            }
        };

        let rejection = if character.capstone_used_this_encounter {
            Some(Rejection::invalid_state(
                "The capstone has already been used this encounter.",
            ))
        } else if value != METER_MAX {
            Some(Rejection::invalid_state(format!(
                "The {resource} capstone requires 100; current value is {value}."
            )))
        } else {
            None
        };
        if let Some(rejection) = rejection {
            tracing::debug!(character_id = %character.id, %resource, reason = %rejection.reason, "capstone refused");
            return Ok(Notified {
                outcome: CapstoneOutcome::Rejected(rejection),
                events: Vec::new(),
            });
        }

        let mut notes = Notifications::default();
        let new_value = match resource {
            ResourceKind::Rage => {
                let crossing = self.rage().reset(character, ResetCause::Capstone)?;
                notes.crossing(&crossing);
                crossing.new_value
            }
            ResourceKind::Momentum => {
                let crossing = self.momentum().reset(character, ResetCause::Capstone)?;
                notes.crossing(&crossing);
                crossing.new_value
            }
            _ => {
                let change = self.coherence().reset(character, ResetCause::Capstone)?;
                notes.coherence(&change, 0);
                change.crossing.new_value
            }
        };
        character.capstone_used_this_encounter = true;
        tracing::info!(character_id = %character.id, %resource, "capstone used");

        Ok(Notified {
            outcome: CapstoneOutcome::Used {
                resource,
                new_value,
            },
            events: notes.finish(),
        })
    }

    /// Drops rage and momentum after the character is stunned or frozen.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for a cause other than
    /// [`ResetCause::Stunned`] or [`ResetCause::Frozen`].
    pub fn process_incapacitation(
        &self,
        character: &mut Character,
        cause: ResetCause,
    ) -> Result<Notified<IncapacitationReset>, DomainError> {
        if !matches!(cause, ResetCause::Stunned | ResetCause::Frozen) {
            return Err(DomainError::invalid_argument(format!(
                "{cause:?} is not an incapacitation"
            )));
        }
        let mut notes = Notifications::default();
        let rage = match character.rage {
            Some(_) => {
                let crossing = self.rage().reset(character, cause)?;
                notes.crossing(&crossing);
                Some(crossing)
            }
            None => None,
        };
        let momentum = match character.momentum {
            Some(_) => {
                let crossing = self.momentum().reset(character, cause)?;
                notes.crossing(&crossing);
                Some(crossing)
            }
            None => None,
        };
        Ok(Notified {
            outcome: IncapacitationReset {
                cause,
                rage,
                momentum,
            },
            events: notes.finish(),
        })
    }

    /// Applies stress and reports what it set off.
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
    ) -> Result<Notified<StressApplication>, DomainError> {
        let mut notes = Notifications::default();
        let application = self
            .stress()
            .apply_stress(character, amount, source, resist_dc, dice)?;
        notes.stress(&application);
        self.enforce_stress_ceiling(character, &mut notes)?;
        notes.cps(&self.cps().check_stage_change(
            application.crossing.previous_value,
            application.crossing.new_value,
        ));
        Ok(Notified {
            outcome: application,
            events: notes.finish(),
        })
    }

    /// Adds corruption and reports milestones and terminal errors.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if `amount` is negative.
    pub fn add_corruption(
        &self,
        character: &mut Character,
        amount: i32,
        source: CorruptionSource,
    ) -> Result<Notified<CorruptionGain>, DomainError> {
        let mut notes = Notifications::default();
        let gain = self.corruption().add_corruption(character, amount, source)?;
        notes.corruption(&gain);
        Ok(Notified {
            outcome: gain,
            events: notes.finish(),
        })
    }

    /// Moves corruption between two characters.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for a non-positive amount or a
    /// transfer to the same character.
    pub fn transfer_corruption(
        &self,
        source: &mut Character,
        target: &mut Character,
        amount: i32,
    ) -> Result<TransferResult, DomainError> {
        let outcome = self
            .corruption()
            .transfer_corruption(source, target, amount)?;
        let mut source_notes = Notifications::default();
        let mut target_notes = Notifications::default();
        if let CorruptionTransfer::Transferred {
            source: crossing,
            target: gain,
        } = &outcome
        {
            source_notes.crossing(crossing);
            target_notes.corruption(gain);
        }
        Ok(TransferResult {
            outcome,
            source_events: source_notes.finish(),
            target_events: target_notes.finish(),
        })
    }

    /// Acquires a trauma and reports retirement.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`TraumaTracker::acquire_trauma`].
    pub fn acquire_trauma(
        &self,
        character: &mut Character,
        trauma_id: &str,
        source: &str,
        clock: &dyn Clock,
    ) -> Result<Notified<TraumaAcquisition>, DomainError> {
        let mut notes = Notifications::default();
        let acquisition = self
            .traumas()
            .acquire_trauma(character, trauma_id, source, clock)?;
        notes.acquisition(&acquisition);
        Ok(Notified {
            outcome: acquisition,
            events: notes.finish(),
        })
    }

    /// Rolls a trauma check for `trigger`.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`TraumaTracker::perform_trauma_check`].
    pub fn perform_trauma_check(
        &self,
        character: &mut Character,
        trigger: TraumaCheckTrigger,
        dice: &mut dyn DiceSource,
        clock: &dyn Clock,
    ) -> Result<Notified<TraumaCheckOutcome>, DomainError> {
        let mut notes = Notifications::default();
        let outcome = self
            .traumas()
            .perform_trauma_check(character, trigger, dice, clock)?;
        notes.trauma_check_outcome(&outcome);
        Ok(Notified {
            outcome,
            events: notes.finish(),
        })
    }

    /// Adds rage.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`RageTracker::gain`].
    pub fn gain_rage(
        &self,
        character: &mut Character,
        amount: i32,
        source: RageSource,
    ) -> Result<Notified<ThresholdCrossing<RageTier>>, DomainError> {
        let mut notes = Notifications::default();
        let crossing = self.rage().gain(character, amount, source)?;
        notes.crossing(&crossing);
        Ok(Notified {
            outcome: crossing,
            events: notes.finish(),
        })
    }

    /// Adds momentum plus the chain bonus.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`MomentumTracker::gain`].
    pub fn gain_momentum(
        &self,
        character: &mut Character,
        amount: i32,
        source: MomentumSource,
    ) -> Result<Notified<MomentumGain>, DomainError> {
        let mut notes = Notifications::default();
        let gain = self.momentum().gain(character, amount, source)?;
        notes.crossing(&gain.crossing);
        Ok(Notified {
            outcome: gain,
            events: notes.finish(),
        })
    }

    /// Adds coherence and reports Apotheosis entry.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`CoherenceTracker::gain`].
    pub fn gain_coherence(
        &self,
        character: &mut Character,
        amount: i32,
        source: CoherenceSource,
    ) -> Result<Notified<CoherenceChange>, DomainError> {
        let mut notes = Notifications::default();
        let change = self.coherence().gain(character, amount, source)?;
        notes.coherence(&change, self.affordable_apotheosis_turns(character));
        Ok(Notified {
            outcome: change,
            events: notes.finish(),
        })
    }

    /// Rolls for a cascade and applies its stress and corruption backlash.
    /// Self damage is reported for the combat layer.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the character has no coherence.
    pub fn check_cascade(
        &self,
        character: &mut Character,
        dice: &mut dyn DiceSource,
    ) -> Result<Notified<CascadeResult>, DomainError> {
        let mut notes = Notifications::default();
        let previous_stress = character.stress.value();
        let check = self.coherence().check_cascade(character, dice)?;

        let (Some(penalty), Some(roll)) = (check.penalty, check.roll) else {
            return Ok(Notified {
                outcome: CascadeResult {
                    check,
                    stress: None,
                    corruption: None,
                },
                events: Vec::new(),
            });
        };

        notes.push(TraumaEconomyEventKind::CascadeTriggered(CascadeTriggered {
            roll,
            self_damage: penalty.self_damage,
        }));
        if let Some(change) = &check.change {
            notes.coherence(change, 0);
        }

        let stress = if penalty.stress_gained > 0 {
            let application = self.stress().apply_unresisted(
                character,
                penalty.stress_gained,
                StressSource::Heretical,
            )?;
            notes.stress(&application);
            Some(application)
        } else {
            None
        };
        let corruption = if penalty.corruption_gained > 0 {
            let gain = self.corruption().add_corruption(
                character,
                penalty.corruption_gained,
                CorruptionSource::CoherenceCascade,
            )?;
            notes.corruption(&gain);
            Some(gain)
        } else {
            None
        };

        notes.cps(
            &self
                .cps()
                .check_stage_change(previous_stress, character.stress.value()),
        );

        Ok(Notified {
            outcome: CascadeResult {
                check,
                stress,
                corruption,
            },
            events: notes.finish(),
        })
    }

    /// Turns of Apotheosis the character can pay for at current stress.
    fn affordable_apotheosis_turns(&self, character: &Character) -> i32 {
        let cost = self.content.config.resources.apotheosis_stress_cost.max(1);
        (METER_MAX - character.stress.value()) / cost
    }

    /// Throws the character out of Apotheosis when stress has hit 100.
    fn enforce_stress_ceiling(
        &self,
        character: &mut Character,
        notes: &mut Notifications,
    ) -> Result<Option<CoherenceChange>, DomainError> {
        let overloaded = character.stress.value() == METER_MAX
            && character.coherence.as_ref().is_some_and(|c| c.in_apotheosis);
        if !overloaded {
            return Ok(None);
        }
        let change = self.coherence().force_exit(character)?;
        notes.coherence(&change, 0);
        Ok(Some(change))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::coherence::{ApotheosisExitCause, CoherenceTier};
    use crate::domain::cps::CpsStage;
    use crate::domain::meter::Meter;
    use crate::domain::state::WarningLevel;
    use blightward_content::panic::PanicEffect;
    use blightward_core::error::RejectionKind;
    use blightward_test_support::{FixedClock, MockDice, SequenceDice};
    use chrono::{TimeZone, Utc};

    fn orchestrator() -> TraumaEconomyOrchestrator {
        TraumaEconomyOrchestrator::new(Arc::new(RulesContent::load_default().unwrap()))
    }

    fn fixed_clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
    }

    fn character(stress: i32) -> Character {
        let mut character = Character::new(Uuid::new_v4(), "Tester", 3);
        character.stress = Meter::new(stress);
        character
    }

    fn berserker(stress: i32, rage: i32) -> Character {
        let mut character = character(stress).with_rage();
        character.rage_mut().unwrap().meter = Meter::new(rage);
        character
    }

    fn mystic(stress: i32, coherence: i32) -> Character {
        let mut character = character(stress).with_coherence(50);
        character.coherence_mut().unwrap().meter = Meter::new(coherence);
        character
    }

    fn in_apotheosis(stress: i32) -> Character {
        let orchestrator = orchestrator();
        let mut character = mystic(stress, 75);
        orchestrator
            .gain_coherence(&mut character, 10, CoherenceSource::Ability)
            .unwrap();
        assert!(character.coherence().unwrap().in_apotheosis);
        character
    }

    #[test]
    fn test_damage_after_soak_floors_at_one() {
        assert_eq!(damage_after_soak(0, 5), 0);
        assert_eq!(damage_after_soak(3, 5), 1);
        assert_eq!(damage_after_soak(30, 5), 25);
        assert_eq!(damage_after_soak(30, -2), 30);
    }

    #[test]
    fn test_process_damage_uses_post_soak_damage_for_stress_and_rage() {
        let orchestrator = orchestrator();
        // Burning rage soaks 2, armor soaks 3.
        let mut character = berserker(0, 45).with_armor(3);

        let result = orchestrator
            .process_damage(&mut character, 30, &DamageContext::default(), &mut MockDice)
            .unwrap();

        assert_eq!(result.soak, 5);
        assert_eq!(result.damage_after_soak, 25);
        assert_eq!(result.stress.crossing.amount_gained(), 2);
        assert_eq!(result.rage.unwrap().amount_gained(), 5);
        assert_eq!(character.rage().unwrap().meter.value(), 50);
        assert!(!result.trauma_check_triggered);
        assert!(result.trauma_checks_owed.is_empty());
    }

    #[test]
    fn test_rage_from_damage_follows_configured_divisor() {
        let mut content = RulesContent::load_default().unwrap();
        content.config.damage.rage_divisor = 10;
        let orchestrator = TraumaEconomyOrchestrator::new(Arc::new(content));
        let mut character = berserker(0, 0);

        let result = orchestrator
            .process_damage(&mut character, 30, &DamageContext::default(), &mut MockDice)
            .unwrap();

        assert_eq!(result.damage_after_soak, 30);
        assert_eq!(result.rage.unwrap().amount_gained(), 3);
        assert_eq!(character.rage().unwrap().meter.value(), 3);
    }

    #[test]
    fn test_process_damage_context_bonuses_stack() {
        let orchestrator = orchestrator();
        let mut character = character(0);
        let context = DamageContext {
            critical_hit: true,
            near_death: true,
            ally_death_witnessed: true,
            resist_dc: 0,
        };

        let result = orchestrator
            .process_damage(&mut character, 20, &context, &mut MockDice)
            .unwrap();

        // 2 from damage, 5 critical, 10 near death, 15 ally death.
        assert_eq!(character.stress.value(), 32);
        assert_eq!(
            result.trauma_checks_owed,
            vec![TraumaCheckTrigger::NearDeath, TraumaCheckTrigger::AllyDeath]
        );
        assert!(result.events.contains(&TraumaEconomyEventKind::TraumaCheckRequired(
            TraumaCheckRequired {
                trigger: TraumaCheckTrigger::AllyDeath
            }
        )));
    }

    #[test]
    fn test_process_damage_at_ceiling_reports_breaking_point() {
        let orchestrator = orchestrator();
        let mut character = character(95);

        let result = orchestrator
            .process_damage(&mut character, 60, &DamageContext::default(), &mut MockDice)
            .unwrap();

        assert_eq!(character.stress.value(), 100);
        assert!(result.trauma_check_triggered);
        assert_eq!(result.trauma_checks_owed, vec![TraumaCheckTrigger::BreakingPoint]);
        assert_eq!(result.cps_change.new, CpsStage::HollowShell);
        assert!(!result.terminal_error_pending);
        // A trauma check is owed, never rolled here.
        assert!(character.traumas.is_empty());
    }

    #[test]
    fn test_process_damage_critical_costs_momentum_and_coherence() {
        let orchestrator = orchestrator();
        let mut character = mystic(0, 60).with_momentum();
        character.momentum_mut().unwrap().meter = Meter::new(50);
        let context = DamageContext {
            critical_hit: true,
            ..DamageContext::default()
        };

        let result = orchestrator
            .process_damage(&mut character, 10, &context, &mut MockDice)
            .unwrap();

        assert_eq!(result.momentum.unwrap().new_value, 30);
        assert_eq!(result.coherence.unwrap().crossing.new_value, 50);
        assert!(result.rage.is_none());
    }

    #[test]
    fn test_process_damage_forces_apotheosis_exit_at_stress_ceiling() {
        let orchestrator = orchestrator();
        let mut character = in_apotheosis(95);

        let result = orchestrator
            .process_damage(&mut character, 100, &DamageContext::default(), &mut MockDice)
            .unwrap();

        let exit = result.apotheosis_exit.unwrap();
        assert_eq!(
            exit.apotheosis,
            Some(ApotheosisTransition::Exited {
                cause: ApotheosisExitCause::StressOverload
            })
        );
        let coherence = character.coherence().unwrap();
        assert!(!coherence.in_apotheosis);
        assert_eq!(coherence.meter.value(), 80);
        assert!(result.events.contains(&TraumaEconomyEventKind::ApotheosisExited(
            ApotheosisExited {
                cause: ApotheosisExitCause::StressOverload
            }
        )));
    }

    #[test]
    fn test_process_damage_rejects_negative_damage() {
        let orchestrator = orchestrator();
        let mut character = character(0);
        match orchestrator
            .process_damage(&mut character, -1, &DamageContext::default(), &mut MockDice)
            .unwrap_err()
        {
            DomainError::InvalidArgument(msg) => assert!(msg.contains("damage")),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn test_long_rest_resets_resources_and_recovers_stress() {
        let orchestrator = orchestrator();
        let mut character = berserker(40, 80).with_coherence(50);
        character.coherence_mut().unwrap().meter = Meter::new(30);

        let result = orchestrator
            .process_rest(&mut character, RestType::Long, None)
            .unwrap();

        assert_eq!(character.rage().unwrap().meter.value(), 0);
        assert_eq!(character.coherence().unwrap().meter.value(), 50);
        assert_eq!(character.stress.value(), 25);
        assert!(result.rage.unwrap().threshold_crossed);
        assert!(result.cps_change.improved);
        assert!(result.party_bonus.is_none());
    }

    #[test]
    fn test_short_rest_keeps_resources_and_skips_party_bonus() {
        let orchestrator = orchestrator();
        let mut character = berserker(40, 80);
        let party = PartyContext {
            stress_reduction: 10,
            source_ids: vec![character.id],
        };

        let result = orchestrator
            .process_rest(&mut character, RestType::Short, Some(&party))
            .unwrap();

        assert_eq!(character.stress.value(), 34);
        assert_eq!(character.rage().unwrap().meter.value(), 80);
        assert!(result.rage.is_none());
        assert!(result.party_bonus.is_none());
    }

    #[test]
    fn test_party_rest_applies_frenzy_bonus_to_every_member() {
        let orchestrator = orchestrator();
        let mut members = vec![berserker(50, 90), character(50), character(50)];

        let results = orchestrator
            .process_party_rest(&mut members, RestType::Long)
            .unwrap();

        assert_eq!(results.len(), 3);
        for (member, result) in members.iter().zip(&results) {
            // 15 from WILL 3 x 5, then 10 party calm.
            assert_eq!(member.stress.value(), 25);
            assert_eq!(result.party_bonus.as_ref().unwrap().source, PARTY_CALM_SOURCE);
        }
        assert_eq!(members[0].rage().unwrap().meter.value(), 0);
        assert_eq!(
            orchestrator.party_context(&[berserker(0, 90)]).stress_reduction,
            10
        );
        assert_eq!(
            orchestrator.party_context(&[berserker(0, 70)]),
            PartyContext::default()
        );
    }

    #[test]
    fn test_turn_start_decays_only_out_of_combat() {
        let orchestrator = orchestrator();
        let mut character = berserker(0, 50).with_momentum();
        character.momentum_mut().unwrap().meter = Meter::new(50);

        let in_combat = orchestrator.process_turn_start(&mut character, true).unwrap();
        assert!(in_combat.rage_decay.is_none());
        assert_eq!(character.rage().unwrap().meter.value(), 50);

        let idle = orchestrator.process_turn_start(&mut character, false).unwrap();
        assert_eq!(idle.rage_decay.unwrap().new_value, 40);
        assert_eq!(idle.momentum_decay.unwrap().new_value, 35);
    }

    #[test]
    fn test_turn_start_charges_apotheosis_upkeep() {
        let orchestrator = orchestrator();
        let mut character = in_apotheosis(30);

        let result = orchestrator.process_turn_start(&mut character, true).unwrap();

        assert_eq!(result.apotheosis_upkeep.unwrap().turns_in_apotheosis, 1);
        assert_eq!(result.upkeep_stress.unwrap().crossing.amount_gained(), 10);
        assert_eq!(character.stress.value(), 40);
        assert!(result.apotheosis_exit.is_none());
    }

    #[test]
    fn test_turn_start_upkeep_at_ceiling_forces_exit() {
        let orchestrator = orchestrator();
        let mut character = in_apotheosis(95);

        let result = orchestrator.process_turn_start(&mut character, true).unwrap();

        assert_eq!(character.stress.value(), 100);
        assert!(result.trauma_check_triggered);
        assert!(result.apotheosis_exit.is_some());
        assert_eq!(
            character.coherence().unwrap().meter.tier(),
            CoherenceTier::Focused
        );
    }

    #[test]
    fn test_turn_end_caps_environmental_stress_and_skips_panic_when_calm() {
        let orchestrator = orchestrator();
        let mut character = character(10);

        let result = orchestrator
            .process_turn_end(&mut character, 12, &mut MockDice)
            .unwrap();

        assert_eq!(character.stress.value(), 15);
        assert!(result.panic.is_none());
        assert!(!result.trauma_check_triggered);
    }

    #[test]
    fn test_turn_end_rolls_panic_when_eligible() {
        let orchestrator = orchestrator();
        let mut character = character(58);
        let mut dice = SequenceDice::new(vec![3]);

        let result = orchestrator
            .process_turn_end(&mut character, 5, &mut dice)
            .unwrap();

        assert_eq!(character.stress.value(), 63);
        let panic = result.panic.unwrap();
        assert_eq!(panic.roll, 3);
        assert_eq!(panic.entry.effect, PanicEffect::Flee);
        assert_eq!(result.cps_change.new, CpsStage::RuinMadness);
        assert!(result.events.iter().any(|e| matches!(
            e,
            TraumaEconomyEventKind::PanicTriggered(PanicTriggered { roll: 3, .. })
        )));
    }

    #[test]
    fn test_breaking_point_rejected_below_ceiling() {
        let orchestrator = orchestrator();
        let mut character = character(99);

        let result = orchestrator
            .resolve_breaking_point(&mut character, &mut MockDice, &fixed_clock())
            .unwrap();

        match result.outcome {
            BreakingPointOutcome::Rejected(rejection) => {
                assert_eq!(rejection.kind, RejectionKind::InvalidState);
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_breaking_point_pass_resets_to_75() {
        let orchestrator = orchestrator();
        let mut character = character(100);
        let mut dice = SequenceDice::new(vec![2]);

        let result = orchestrator
            .resolve_breaking_point(&mut character, &mut dice, &fixed_clock())
            .unwrap();

        match result.outcome {
            BreakingPointOutcome::Resolved(resolution) => {
                assert!(resolution.check.passed);
                assert_eq!(resolution.reset.new_value, 75);
            }
            other => panic!("expected Resolved, got {other:?}"),
        }
        assert!(character.traumas.is_empty());
    }

    #[test]
    fn test_breaking_point_fail_acquires_trauma_and_resets_to_50() {
        let orchestrator = orchestrator();
        let mut character = character(100);
        // Zero successes, then the first cognitive trauma by id.
        let mut dice = SequenceDice::new(vec![0, 1]);

        let result = orchestrator
            .resolve_breaking_point(&mut character, &mut dice, &fixed_clock())
            .unwrap();

        assert_eq!(character.stress.value(), 50);
        assert_eq!(character.traumas.len(), 1);
        assert_eq!(character.traumas[0].trauma_id, "intrusive_patterns");
        assert!(result.events.iter().any(|e| matches!(
            e,
            TraumaEconomyEventKind::TraumaAcquired(TraumaAcquired { stack_count: 1, .. })
        )));
    }

    #[test]
    fn test_terminal_error_forlorn_emits_notification() {
        let orchestrator = orchestrator();
        let mut character = character(0);
        character.corruption = Meter::new(100);

        let result = orchestrator.resolve_terminal_error(&mut character, &mut MockDice);

        assert!(matches!(result.outcome, TerminalErrorCheck::Forlorn { .. }));
        assert!(character.forlorn);
        assert_eq!(
            result.events,
            vec![TraumaEconomyEventKind::BecameForlorn(BecameForlorn { successes: 0 })]
        );
    }

    #[test]
    fn test_capstone_once_per_encounter() {
        let orchestrator = orchestrator();
        let mut character = berserker(0, 100);

        let first = orchestrator
            .use_capstone(&mut character, ResourceKind::Rage)
            .unwrap();
        assert_eq!(
            first.outcome,
            CapstoneOutcome::Used {
                resource: ResourceKind::Rage,
                new_value: 0
            }
        );

        character.rage_mut().unwrap().meter = Meter::new(100);
        let second = orchestrator
            .use_capstone(&mut character, ResourceKind::Rage)
            .unwrap();
        assert!(matches!(second.outcome, CapstoneOutcome::Rejected(_)));

        assert!(orchestrator.begin_encounter(&mut character));
        let third = orchestrator
            .use_capstone(&mut character, ResourceKind::Rage)
            .unwrap();
        assert!(matches!(third.outcome, CapstoneOutcome::Used { .. }));
    }

    #[test]
    fn test_capstone_requires_full_resource() {
        let orchestrator = orchestrator();
        let mut character = berserker(0, 99);

        let result = orchestrator
            .use_capstone(&mut character, ResourceKind::Rage)
            .unwrap();

        match result.outcome {
            CapstoneOutcome::Rejected(rejection) => {
                assert_eq!(
                    rejection.reason,
                    "The Rage capstone requires 100; current value is 99."
                );
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
        assert!(!character.capstone_used_this_encounter);
        assert!(matches!(
            orchestrator.use_capstone(&mut character, ResourceKind::Stress),
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_incapacitation_resets_rage_and_momentum() {
        let orchestrator = orchestrator();
        let mut character = berserker(0, 70).with_momentum();
        character.momentum_mut().unwrap().meter = Meter::new(40);
        character.momentum_mut().unwrap().consecutive_hits = 3;

        let result = orchestrator
            .process_incapacitation(&mut character, ResetCause::Stunned)
            .unwrap();

        assert_eq!(result.outcome.rage.unwrap().new_value, 0);
        assert_eq!(character.momentum().unwrap().consecutive_hits, 0);
        assert!(matches!(
            orchestrator.process_incapacitation(&mut character, ResetCause::Rest),
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_gain_coherence_unlocks_abilities_once() {
        let orchestrator = orchestrator();
        let mut character = mystic(20, 75);

        let first = orchestrator
            .gain_coherence(&mut character, 10, CoherenceSource::Ability)
            .unwrap();
        assert!(first.events.contains(&TraumaEconomyEventKind::ApotheosisEntered(
            ApotheosisEntered { affordable_turns: 8 }
        )));
        assert!(first.events.iter().any(|e| matches!(
            e,
            TraumaEconomyEventKind::AbilitiesUnlocked(_)
        )));

        orchestrator.coherence().lose(&mut character, 30).unwrap();
        let second = orchestrator
            .gain_coherence(&mut character, 30, CoherenceSource::Ability)
            .unwrap();
        assert!(!second.events.iter().any(|e| matches!(
            e,
            TraumaEconomyEventKind::AbilitiesUnlocked(_)
        )));
    }

    #[test]
    fn test_check_cascade_applies_backlash() {
        let orchestrator = orchestrator();
        let mut character = mystic(0, 10);
        let mut dice = SequenceDice::new(vec![5]);

        let result = orchestrator.check_cascade(&mut character, &mut dice).unwrap();

        assert!(result.outcome.check.triggered());
        assert_eq!(character.coherence().unwrap().meter.value(), 0);
        assert_eq!(character.stress.value(), 15);
        assert_eq!(character.corruption.value(), 5);
        assert!(result.events.contains(&TraumaEconomyEventKind::CascadeTriggered(
            CascadeTriggered {
                roll: 5,
                self_damage: 15
            }
        )));
    }

    #[test]
    fn test_add_corruption_reports_terminal_error() {
        let orchestrator = orchestrator();
        let mut character = character(0);
        character.corruption = Meter::new(90);

        let result = orchestrator
            .add_corruption(&mut character, 15, CorruptionSource::HereticalAbility)
            .unwrap();

        assert_eq!(character.corruption.value(), 100);
        assert!(result.outcome.terminal_error_triggered);
        assert!(result.events.contains(&TraumaEconomyEventKind::TerminalErrorRequired(
            TerminalErrorRequired { corruption: 100 }
        )));
    }

    #[test]
    fn test_transfer_splits_notifications_by_side() {
        let orchestrator = orchestrator();
        let mut source = character(0);
        source.corruption = Meter::new(30);
        let mut target = character(0);

        let result = orchestrator
            .transfer_corruption(&mut source, &mut target, 25)
            .unwrap();

        assert!(matches!(result.outcome, CorruptionTransfer::Transferred { .. }));
        assert_eq!(source.corruption.value(), 5);
        assert_eq!(target.corruption.value(), 25);
        assert!(!result.source_events.is_empty());
        assert!(result.target_events.iter().any(|e| matches!(
            e,
            TraumaEconomyEventKind::CorruptionMilestoneReached(CorruptionMilestoneReached {
                milestone: 25
            })
        )));
    }

    #[test]
    fn test_acquire_trauma_reports_mandatory_retirement() {
        let orchestrator = orchestrator();
        let mut character = character(0);

        let result = orchestrator
            .acquire_trauma(&mut character, "logic_fracture", "Paradox", &fixed_clock())
            .unwrap();

        assert!(result.outcome.retirement.must_retire);
        assert!(result.events.iter().any(|e| matches!(
            e,
            TraumaEconomyEventKind::RetirementRequired(RetirementRequired {
                mandatory: true,
                ..
            })
        )));
    }

    #[test]
    fn test_state_derives_effective_values() {
        let orchestrator = orchestrator();
        let mut character = berserker(85, 90);
        character.corruption = Meter::new(45);

        let state = orchestrator.state(&character).unwrap();

        // 45 corruption: 20% off HP and AP, resolve -2.
        assert_eq!(state.effective_max_hp, 80);
        assert_eq!(state.effective_max_ap, 40);
        assert_eq!(state.effective_resolve, 1);
        assert_eq!(state.total_defense_penalty, 4);
        assert_eq!(state.total_skill_penalty, 4);
        assert_eq!(state.warning_level, WarningLevel::Critical);
        assert!(state.warnings.contains(&"Your rage threatens to overwhelm your reason.".to_owned()));
        assert_eq!(state.rage.unwrap().party_stress_reduction, 10);
        assert!(state.momentum.is_none());
    }

    #[test]
    fn test_snapshot_is_valid_and_fingerprinted() {
        let orchestrator = orchestrator();
        let mut character = mystic(30, 60);
        orchestrator
            .acquire_trauma(&mut character, "paranoia", "Ambush", &fixed_clock())
            .unwrap();

        let snapshot = orchestrator.snapshot(&character, &fixed_clock()).unwrap();

        assert!(snapshot.is_valid());
        assert_eq!(snapshot.captured_at, fixed_clock().0);
        assert_eq!(snapshot.trauma_ids, vec!["paranoia".to_owned()]);
        assert_eq!(snapshot.resources.len(), 1);
        assert_eq!(snapshot.rules_fingerprint, orchestrator.content().fingerprint());
    }
}
