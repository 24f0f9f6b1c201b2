//! Balance configuration for the trauma economy.
//!
//! Every field has a default, so a YAML file only needs the values it
//! changes. Tier boundaries are not configured here; they are fixed tables
//! owned by each meter.

use blightward_core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Stress recovery and post-check reset values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressRules {
    /// Short rest recovers WILL times this.
    pub short_rest_will_multiplier: i32,
    /// Long rest recovers WILL times this.
    pub long_rest_will_multiplier: i32,
    /// Flat recovery on reaching a milestone.
    pub milestone_recovery: i32,
    /// Stress after passing a breaking-point trauma check.
    pub reset_after_passed_check: i32,
    /// Stress after failing a breaking-point trauma check.
    pub reset_after_failed_check: i32,
    /// Most environmental stress applied in a single turn end.
    pub environmental_turn_cap: i32,
}

impl Default for StressRules {
    fn default() -> Self {
        Self {
            short_rest_will_multiplier: 2,
            long_rest_will_multiplier: 5,
            milestone_recovery: 25,
            reset_after_passed_check: 75,
            reset_after_failed_check: 50,
            environmental_turn_cap: 5,
        }
    }
}

/// Trauma check and retirement rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraumaRules {
    /// Successes needed to resist a trauma.
    pub check_dc: u32,
    /// Distinct active traumas at which retirement becomes an option.
    pub retirement_threshold: usize,
}

impl Default for TraumaRules {
    fn default() -> Self {
        Self {
            check_dc: 2,
            retirement_threshold: 3,
        }
    }
}

/// Corruption survival and milestone rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorruptionRules {
    /// Successes needed to survive a terminal error.
    pub terminal_check_dc: u32,
    /// Values that fire a one-time milestone the first time they are reached.
    pub milestones: Vec<i32>,
}

impl Default for CorruptionRules {
    fn default() -> Self {
        Self {
            terminal_check_dc: 3,
            milestones: vec![25, 50, 75],
        }
    }
}

/// How incoming damage feeds the other meters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DamageRules {
    /// Post-soak damage per point of stress.
    pub stress_divisor: i32,
    /// Extra stress from a critical hit.
    pub critical_hit_stress: i32,
    /// Extra stress when the hit leaves the character near death.
    pub near_death_stress: i32,
    /// Extra stress when the character just watched an ally die.
    pub ally_death_stress: i32,
    /// Post-soak damage per point of rage.
    pub rage_divisor: i32,
    /// Momentum lost to a critical hit.
    pub momentum_loss_on_critical: i32,
    /// Coherence lost to a critical hit.
    pub coherence_loss_on_critical: i32,
}

impl Default for DamageRules {
    fn default() -> Self {
        Self {
            stress_divisor: 10,
            critical_hit_stress: 5,
            near_death_stress: 10,
            ally_death_stress: 15,
            rage_divisor: 5,
            momentum_loss_on_critical: 20,
            coherence_loss_on_critical: 10,
        }
    }
}

/// Specialization resource rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceRules {
    /// Rage lost per turn out of combat.
    pub rage_idle_decay: i32,
    /// Momentum lost per turn out of combat.
    pub momentum_idle_decay: i32,
    /// Momentum lost on a missed attack.
    pub momentum_miss_decay: i32,
    /// Extra stress recovered by every resting party member while someone is
    /// in a frenzy.
    pub party_stress_reduction: i32,
    /// Stress paid for each turn spent in Apotheosis.
    pub apotheosis_stress_cost: i32,
    /// Coherence value a forced Apotheosis exit drops to.
    pub apotheosis_exit_value: i32,
    /// Default Coherence baseline.
    pub coherence_baseline: i32,
}

impl Default for ResourceRules {
    fn default() -> Self {
        Self {
            rage_idle_decay: 10,
            momentum_idle_decay: 15,
            momentum_miss_decay: 25,
            party_stress_reduction: 10,
            apotheosis_stress_cost: 10,
            apotheosis_exit_value: 80,
            coherence_baseline: 50,
        }
    }
}

/// Warning levels shown to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarningRules {
    /// Stress or corruption at which a warning shows.
    pub warning: i32,
    /// Stress or corruption at which the warning turns critical.
    pub critical: i32,
    /// Stress or corruption at which the warning turns terminal.
    pub terminal: i32,
}

impl Default for WarningRules {
    fn default() -> Self {
        Self {
            warning: 70,
            critical: 80,
            terminal: 100,
        }
    }
}

/// All tunable balance values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraumaEconomyConfig {
    /// Stress rules.
    pub stress: StressRules,
    /// Trauma rules.
    pub trauma: TraumaRules,
    /// Corruption rules.
    pub corruption: CorruptionRules,
    /// Damage rules.
    pub damage: DamageRules,
    /// Resource rules.
    pub resources: ResourceRules,
    /// Warning thresholds.
    pub warnings: WarningRules,
}

fn in_meter_range(value: i32) -> bool {
    (0..=100).contains(&value)
}

impl TraumaEconomyConfig {
    /// Parses a configuration from YAML, defaulting any missing field.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Configuration` if the YAML is malformed.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, DomainError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| DomainError::Configuration(format!("rules config: {e}")))
    }

    /// Lists every value that is out of range.
    #[must_use]
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut require = |ok: bool, message: &str| {
            if !ok {
                problems.push(message.to_owned());
            }
        };

        require(
            self.stress.short_rest_will_multiplier >= 0
                && self.stress.long_rest_will_multiplier >= 0
                && self.stress.milestone_recovery >= 0
                && self.stress.environmental_turn_cap >= 0,
            "stress recovery values must not be negative",
        );
        require(
            in_meter_range(self.stress.reset_after_passed_check)
                && in_meter_range(self.stress.reset_after_failed_check),
            "stress reset values must be within 0..=100",
        );
        require(
            self.trauma.retirement_threshold >= 1,
            "retirement threshold must be at least 1",
        );
        require(
            self.corruption
                .milestones
                .windows(2)
                .all(|w| w[0] < w[1])
                && self.corruption.milestones.iter().all(|&m| (1..100).contains(&m)),
            "corruption milestones must ascend within 1..=99",
        );
        require(
            self.damage.stress_divisor > 0 && self.damage.rage_divisor > 0,
            "damage divisors must be positive",
        );
        require(
            in_meter_range(self.resources.coherence_baseline)
                && in_meter_range(self.resources.apotheosis_exit_value),
            "coherence baseline and exit value must be within 0..=100",
        );
        require(
            self.resources.rage_idle_decay >= 0
                && self.resources.momentum_idle_decay >= 0
                && self.resources.momentum_miss_decay >= 0
                && self.resources.party_stress_reduction >= 0
                && self.resources.apotheosis_stress_cost >= 0,
            "resource decay and cost values must not be negative",
        );
        require(
            self.warnings.warning < self.warnings.critical
                && self.warnings.critical < self.warnings.terminal,
            "warning thresholds must ascend",
        );
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(TraumaEconomyConfig::default().problems().is_empty());
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let config = TraumaEconomyConfig::from_yaml_str(
            "stress:\n  long_rest_will_multiplier: 6\ntrauma:\n  retirement_threshold: 4\n",
        )
        .unwrap();
        assert_eq!(config.stress.long_rest_will_multiplier, 6);
        assert_eq!(config.stress.short_rest_will_multiplier, 2);
        assert_eq!(config.trauma.retirement_threshold, 4);
        assert_eq!(config.trauma.check_dc, 2);
    }

    #[test]
    fn test_problems_flag_unordered_warnings() {
        let mut config = TraumaEconomyConfig::default();
        config.warnings.critical = 60;
        assert_eq!(config.problems(), vec!["warning thresholds must ascend"]);
    }

    #[test]
    fn test_problems_flag_zero_divisor() {
        let mut config = TraumaEconomyConfig::default();
        config.damage.stress_divisor = 0;
        assert_eq!(config.problems(), vec!["damage divisors must be positive"]);
    }

    #[test]
    fn test_malformed_yaml_is_configuration_error() {
        assert!(matches!(
            TraumaEconomyConfig::from_yaml_str("stress: [1, 2"),
            Err(DomainError::Configuration(_))
        ));
    }
}
