//! Unified read-only view of a character's trauma economy.

use blightward_content::config::WarningRules;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::coherence::CoherenceStatus;
use super::corruption::{CorruptionStage, CorruptionState};
use super::cps::{CpsStage, CpsState};
use super::meter::{METER_MAX, METER_MIN, ResourceKind};
use super::momentum::MomentumStatus;
use super::rage::RageStatus;
use super::stress::{StressState, StressTier};
use super::trauma::{RetirementCheck, TraumaInstance};

/// Value at which warnings switch to their most severe wording.
const SEVERE_WARNING: i32 = 90;

/// Overall danger, worst first in severity order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WarningLevel {
    /// Nothing to report.
    None,
    /// Stress or corruption at the warning threshold.
    Warning,
    /// Stress or corruption critical, or the panic table is active.
    Critical,
    /// Stress or corruption at 100.
    Terminal,
}

/// Overall warning level.
#[must_use]
pub fn warning_level(
    stress: i32,
    corruption: i32,
    panic_eligible: bool,
    rules: &WarningRules,
) -> WarningLevel {
    let worst = stress.max(corruption);
    if worst >= rules.terminal {
        WarningLevel::Terminal
    } else if worst >= rules.critical || panic_eligible {
        WarningLevel::Critical
    } else if worst >= rules.warning {
        WarningLevel::Warning
    } else {
        WarningLevel::None
    }
}

/// Player-facing warnings, most severe per system.
#[must_use]
pub fn warning_messages(
    stress: i32,
    corruption: i32,
    panic_eligible: bool,
    trauma_count: usize,
    rules: &WarningRules,
) -> Vec<String> {
    let mut warnings = Vec::new();

    if stress >= SEVERE_WARNING {
        warnings.push("Your mind spirals toward total collapse.".to_owned());
    } else if stress >= rules.critical {
        warnings.push("Your sanity fractures under the weight of reality.".to_owned());
    } else if stress >= rules.warning {
        warnings.push("Your thoughts grow increasingly scattered.".to_owned());
    }

    if corruption >= SEVERE_WARNING {
        warnings.push("The Blight consumes your very essence.".to_owned());
    } else if corruption >= rules.critical {
        warnings.push("Corruption ravages your form.".to_owned());
    } else if corruption >= rules.warning {
        warnings.push("The taint spreads deeper within you.".to_owned());
    }

    if panic_eligible {
        warnings.push("Your grip on reality is slipping. The panic table is active.".to_owned());
    }

    if stress >= rules.critical && corruption >= rules.critical {
        warnings.push("Your body and mind fail in tandem.".to_owned());
    }

    match trauma_count {
        0 => {}
        1 => warnings.push("You carry 1 unhealed trauma.".to_owned()),
        n => warnings.push(format!("You carry {n} unhealed traumas.")),
    }

    warnings
}

/// Warnings for combat resources running hot. Each value is `None` for
/// characters without that resource.
#[must_use]
pub fn resource_warnings(
    rage: Option<i32>,
    momentum: Option<i32>,
    coherence: Option<i32>,
    rules: &WarningRules,
) -> Vec<String> {
    let hot = |value: Option<i32>| value.is_some_and(|v| v >= rules.critical);
    let mut warnings = Vec::new();
    if hot(rage) {
        warnings.push("Your rage threatens to overwhelm your reason.".to_owned());
    }
    if hot(momentum) {
        warnings.push("Your momentum carries you toward recklessness.".to_owned());
    }
    if hot(coherence) {
        warnings.push("Your coherence strains against the edge of Apotheosis.".to_owned());
    }
    warnings
}

/// `base` reduced by `penalty_percent`.
#[must_use]
pub fn apply_percent_penalty(base: i32, penalty_percent: i32) -> i32 {
    let kept = i64::from(base) * i64::from(100 - penalty_percent.clamp(0, 100)) / 100;
    i32::try_from(kept.max(0)).unwrap_or(i32::MAX)
}

/// Everything the trauma economy knows about one character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraumaEconomyState {
    /// Character identifier.
    pub character_id: Uuid,
    /// Display name.
    pub name: String,
    /// Stress view.
    pub stress: StressState,
    /// Corruption view.
    pub corruption: CorruptionState,
    /// CPS view.
    pub cps: CpsState,
    /// Traumas, oldest first.
    pub traumas: Vec<TraumaInstance>,
    /// Retirement status.
    pub retirement: RetirementCheck,
    /// Rage view, for berserkers.
    pub rage: Option<RageStatus>,
    /// Momentum view, for skirmishers.
    pub momentum: Option<MomentumStatus>,
    /// Coherence view, for mystics.
    pub coherence: Option<CoherenceStatus>,
    /// Max HP after corruption.
    pub effective_max_hp: i32,
    /// Max AP after corruption.
    pub effective_max_ap: i32,
    /// Resolve dice after corruption.
    pub effective_resolve: u32,
    /// Defense penalty from stress.
    pub total_defense_penalty: i32,
    /// Disadvantage dice on skill checks.
    pub total_skill_penalty: i32,
    /// Overall warning level.
    pub warning_level: WarningLevel,
    /// Player-facing warnings.
    pub warnings: Vec<String>,
    /// The capstone has been spent this encounter.
    pub capstone_used_this_encounter: bool,
}

impl TraumaEconomyState {
    /// Stress or corruption at the critical threshold.
    #[must_use]
    pub fn is_critical(&self) -> bool {
        self.warning_level >= WarningLevel::Critical
    }

    /// Stress or corruption at 100.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.warning_level == WarningLevel::Terminal
    }

    /// Ids of active traumas, oldest first.
    #[must_use]
    pub fn active_trauma_ids(&self) -> Vec<String> {
        self.traumas
            .iter()
            .filter(|t| t.active)
            .map(|t| t.trauma_id.clone())
            .collect()
    }
}

/// One combat resource captured in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// Which resource.
    pub resource: ResourceKind,
    /// Value at capture.
    pub value: i32,
    /// Tier name at capture.
    pub tier: String,
}

/// Serializable point-in-time record of a character's trauma economy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraumaEconomySnapshot {
    /// Character identifier.
    pub character_id: Uuid,
    /// When captured.
    pub captured_at: DateTime<Utc>,
    /// Stress value.
    pub stress: i32,
    /// Stress tier.
    pub stress_tier: StressTier,
    /// Corruption value.
    pub corruption: i32,
    /// Corruption stage.
    pub corruption_stage: CorruptionStage,
    /// CPS stage.
    pub cps_stage: CpsStage,
    /// Number of active traumas.
    pub trauma_count: usize,
    /// Active trauma ids.
    pub trauma_ids: Vec<String>,
    /// Combat resources.
    pub resources: Vec<ResourceSnapshot>,
    /// Overall warning level.
    pub warning_level: WarningLevel,
    /// Was critical at capture.
    pub was_critical: bool,
    /// Was terminal at capture.
    pub was_terminal: bool,
    /// Fingerprint of the rules content in force.
    pub rules_fingerprint: String,
}

impl TraumaEconomySnapshot {
    /// Captures `state` at `captured_at`.
    #[must_use]
    pub fn capture(
        state: &TraumaEconomyState,
        captured_at: DateTime<Utc>,
        rules_fingerprint: &str,
    ) -> Self {
        let mut resources = Vec::new();
        if let Some(rage) = &state.rage {
            resources.push(ResourceSnapshot {
                resource: ResourceKind::Rage,
                value: rage.value,
                tier: format!("{:?}", rage.tier),
            });
        }
        if let Some(momentum) = &state.momentum {
            resources.push(ResourceSnapshot {
                resource: ResourceKind::Momentum,
                value: momentum.value,
                tier: format!("{:?}", momentum.tier),
            });
        }
        if let Some(coherence) = &state.coherence {
            resources.push(ResourceSnapshot {
                resource: ResourceKind::Coherence,
                value: coherence.value,
                tier: format!("{:?}", coherence.tier),
            });
        }

        let trauma_ids = state.active_trauma_ids();
        Self {
            character_id: state.character_id,
            captured_at,
            stress: state.stress.value,
            stress_tier: state.stress.tier,
            corruption: state.corruption.value,
            corruption_stage: state.corruption.stage,
            cps_stage: state.cps.stage,
            trauma_count: trauma_ids.len(),
            trauma_ids,
            resources,
            warning_level: state.warning_level,
            was_critical: state.is_critical(),
            was_terminal: state.is_terminal(),
            rules_fingerprint: rules_fingerprint.to_owned(),
        }
    }

    /// Whether the snapshot is internally consistent.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let in_range = |v: i32| (METER_MIN..=METER_MAX).contains(&v);
        !self.character_id.is_nil()
            && in_range(self.stress)
            && in_range(self.corruption)
            && self.trauma_count == self.trauma_ids.len()
            && self.resources.iter().all(|r| in_range(r.value))
            && !self.rules_fingerprint.is_empty()
    }
}
