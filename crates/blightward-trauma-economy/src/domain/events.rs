//! Notifications raised by the trauma economy.
//!
//! Domain operations return bare [`TraumaEconomyEventKind`] values; the
//! application layer wraps them in a [`TraumaEconomyEvent`] envelope and
//! journals them.

use std::fmt::Debug;

use blightward_content::panic::{ForcedAction, PanicEffect, StatusEffect};
use blightward_core::event::{DomainEvent, EventMetadata};
use serde::{Deserialize, Serialize};

use super::coherence::ApotheosisExitCause;
use super::cps::CpsStage;
use super::meter::{ResourceKind, ThresholdCrossing};
use super::trauma::TraumaCheckTrigger;

/// A meter changed tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdCrossed {
    /// Which meter.
    pub resource: ResourceKind,
    /// Value before.
    pub previous_value: i32,
    /// Value after.
    pub new_value: i32,
    /// Tier name before.
    pub previous_tier: String,
    /// Tier name after.
    pub new_tier: String,
}

impl ThresholdCrossed {
    /// The notification for `crossing`, if it crossed a threshold.
    #[must_use]
    pub fn from_crossing<T: Debug>(crossing: &ThresholdCrossing<T>) -> Option<Self> {
        crossing.threshold_crossed.then(|| Self {
            resource: crossing.resource,
            previous_value: crossing.previous_value,
            new_value: crossing.new_value,
            previous_tier: format!("{:?}", crossing.previous_tier),
            new_tier: format!("{:?}", crossing.new_tier),
        })
    }
}

/// A trauma check is owed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraumaCheckRequired {
    /// What calls for the check.
    pub trigger: TraumaCheckTrigger,
}

/// Corruption reached 100; a terminal-error check is owed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalErrorRequired {
    /// Corruption at the time.
    pub corruption: i32,
}

/// A trauma was acquired or stacked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraumaAcquired {
    /// Catalog id.
    pub trauma_id: String,
    /// Display name.
    pub name: String,
    /// Stack count after acquisition.
    pub stack_count: u32,
}

/// A retirement rule fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetirementRequired {
    /// Retirement is mandatory rather than optional.
    pub mandatory: bool,
    /// Display reason.
    pub reason: String,
    /// Traumas responsible.
    pub contributing_traumas: Vec<String>,
}

/// A corruption milestone was reached for the first time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorruptionMilestoneReached {
    /// The milestone value.
    pub milestone: i32,
}

/// Apotheosis began.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApotheosisEntered {
    /// Turns the character can afford at the current stress.
    pub affordable_turns: i32,
}

/// Apotheosis ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApotheosisExited {
    /// Why.
    pub cause: ApotheosisExitCause,
}

/// Abilities gated behind a one-shot threshold became available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilitiesUnlocked {
    /// Resource whose threshold unlocked them.
    pub resource: ResourceKind,
    /// The threshold.
    pub threshold: i32,
}

/// A coherence cascade fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeTriggered {
    /// The d100 roll.
    pub roll: u32,
    /// Damage the caller must apply to the caster.
    pub self_damage: i32,
}

/// The panic table produced an effect the combat layer must apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanicTriggered {
    /// Die face.
    pub roll: u32,
    /// Outcome.
    pub effect: PanicEffect,
    /// Display name.
    pub name: String,
    /// Turns the effect lasts.
    pub duration_turns: u32,
    /// Statuses to apply.
    pub statuses: Vec<StatusEffect>,
    /// Forced action, if any.
    pub forced_action: Option<ForcedAction>,
}

/// CPS moved to a different stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpsStageChanged {
    /// Stage before.
    pub previous: CpsStage,
    /// Stage after.
    pub new: CpsStage,
}

/// The character was lost to the Blight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BecameForlorn {
    /// Successes rolled on the failed check.
    pub successes: u32,
}

/// Event payload variants for the trauma economy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraumaEconomyEventKind {
    /// A meter changed tier.
    ThresholdCrossed(ThresholdCrossed),
    /// A trauma check is owed.
    TraumaCheckRequired(TraumaCheckRequired),
    /// A terminal-error check is owed.
    TerminalErrorRequired(TerminalErrorRequired),
    /// A trauma was acquired or stacked.
    TraumaAcquired(TraumaAcquired),
    /// A retirement rule fired.
    RetirementRequired(RetirementRequired),
    /// A corruption milestone was reached.
    CorruptionMilestoneReached(CorruptionMilestoneReached),
    /// Apotheosis began.
    ApotheosisEntered(ApotheosisEntered),
    /// Apotheosis ended.
    ApotheosisExited(ApotheosisExited),
    /// One-shot abilities were unlocked.
    AbilitiesUnlocked(AbilitiesUnlocked),
    /// A coherence cascade fired.
    CascadeTriggered(CascadeTriggered),
    /// The panic table was rolled.
    PanicTriggered(PanicTriggered),
    /// CPS changed stage.
    CpsStageChanged(CpsStageChanged),
    /// The character became forlorn.
    BecameForlorn(BecameForlorn),
}

impl TraumaEconomyEventKind {
    /// Routing name of this notification.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ThresholdCrossed(_) => "trauma_economy.threshold_crossed",
            Self::TraumaCheckRequired(_) => "trauma_economy.trauma_check_required",
            Self::TerminalErrorRequired(_) => "trauma_economy.terminal_error_required",
            Self::TraumaAcquired(_) => "trauma_economy.trauma_acquired",
            Self::RetirementRequired(_) => "trauma_economy.retirement_required",
            Self::CorruptionMilestoneReached(_) => "trauma_economy.corruption_milestone_reached",
            Self::ApotheosisEntered(_) => "trauma_economy.apotheosis_entered",
            Self::ApotheosisExited(_) => "trauma_economy.apotheosis_exited",
            Self::AbilitiesUnlocked(_) => "trauma_economy.abilities_unlocked",
            Self::CascadeTriggered(_) => "trauma_economy.cascade_triggered",
            Self::PanicTriggered(_) => "trauma_economy.panic_triggered",
            Self::CpsStageChanged(_) => "trauma_economy.cps_stage_changed",
            Self::BecameForlorn(_) => "trauma_economy.became_forlorn",
        }
    }
}

/// Domain event envelope for the trauma economy.
#[derive(Debug, Clone)]
pub struct TraumaEconomyEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: TraumaEconomyEventKind,
}

impl DomainEvent for TraumaEconomyEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(&self.kind).unwrap_or(serde_json::Value::Null)
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::meter::Meter;
    use crate::domain::stress::Stress;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_threshold_crossed_only_for_tier_changes() {
        let mut meter: Meter<Stress> = Meter::new(15);

        assert!(ThresholdCrossed::from_crossing(&meter.gain(2)).is_none());
        let crossed = ThresholdCrossed::from_crossing(&meter.gain(5)).unwrap();

        assert_eq!(crossed.resource, ResourceKind::Stress);
        assert_eq!(crossed.previous_tier, "Calm");
        assert_eq!(crossed.new_tier, "Uneasy");
        assert_eq!(crossed.new_value, 22);
    }

    #[test]
    fn test_envelope_reports_type_and_payload() {
        let event = TraumaEconomyEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: "trauma_economy.terminal_error_required".to_owned(),
                character_id: Uuid::new_v4(),
                sequence_number: 1,
                correlation_id: Uuid::new_v4(),
                causation_id: Uuid::new_v4(),
                occurred_at: Utc::now(),
            },
            kind: TraumaEconomyEventKind::TerminalErrorRequired(TerminalErrorRequired {
                corruption: 100,
            }),
        };

        assert_eq!(event.event_type(), "trauma_economy.terminal_error_required");
        assert_eq!(
            event.to_payload(),
            serde_json::json!({ "TerminalErrorRequired": { "corruption": 100 } })
        );
    }
}
