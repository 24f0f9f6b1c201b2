//! Commands for the Trauma Economy context.

use blightward_core::command::Command;
use uuid::Uuid;

use super::corruption::CorruptionSource;
use super::meter::ResourceKind;
use super::orchestrator::DamageContext;
use super::stress::{RestType, StressSource};

/// Command to run a hit through soak, stress and the combat resources.
#[derive(Debug, Clone)]
pub struct ProcessDamage {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The character taking the hit.
    pub character_id: Uuid,
    /// Damage before soak.
    pub damage: i32,
    /// Circumstances of the hit.
    pub context: DamageContext,
}

impl Command for ProcessDamage {
    fn command_type(&self) -> &'static str {
        "trauma_economy.process_damage"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn character_ids(&self) -> Vec<Uuid> {
        vec![self.character_id]
    }
}

/// Command to rest a single character.
#[derive(Debug, Clone)]
pub struct ProcessRest {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The resting character.
    pub character_id: Uuid,
    /// Kind of rest.
    pub rest: RestType,
}

impl Command for ProcessRest {
    fn command_type(&self) -> &'static str {
        "trauma_economy.process_rest"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn character_ids(&self) -> Vec<Uuid> {
        vec![self.character_id]
    }
}

/// Command to rest a whole party together.
#[derive(Debug, Clone)]
pub struct ProcessPartyRest {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Every resting member.
    pub member_ids: Vec<Uuid>,
    /// Kind of rest.
    pub rest: RestType,
}

impl Command for ProcessPartyRest {
    fn command_type(&self) -> &'static str {
        "trauma_economy.process_party_rest"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn character_ids(&self) -> Vec<Uuid> {
        self.member_ids.clone()
    }
}

/// Command to open a character's turn.
#[derive(Debug, Clone)]
pub struct ProcessTurnStart {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The acting character.
    pub character_id: Uuid,
    /// Whether combat is under way.
    pub in_combat: bool,
}

impl Command for ProcessTurnStart {
    fn command_type(&self) -> &'static str {
        "trauma_economy.process_turn_start"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn character_ids(&self) -> Vec<Uuid> {
        vec![self.character_id]
    }
}

/// Command to close a character's turn.
#[derive(Debug, Clone)]
pub struct ProcessTurnEnd {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The acting character.
    pub character_id: Uuid,
    /// Environmental stress before the per-turn cap.
    pub environmental_stress: i32,
}

impl Command for ProcessTurnEnd {
    fn command_type(&self) -> &'static str {
        "trauma_economy.process_turn_end"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn character_ids(&self) -> Vec<Uuid> {
        vec![self.character_id]
    }
}

/// Command to apply stress from any source.
#[derive(Debug, Clone)]
pub struct ApplyStress {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The stressed character.
    pub character_id: Uuid,
    /// Stress before resistance.
    pub amount: i32,
    /// Where it came from.
    pub source: StressSource,
    /// Resistance DC; 0 skips the roll.
    pub resist_dc: u32,
}

impl Command for ApplyStress {
    fn command_type(&self) -> &'static str {
        "trauma_economy.apply_stress"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn character_ids(&self) -> Vec<Uuid> {
        vec![self.character_id]
    }
}

/// Command to add corruption.
#[derive(Debug, Clone)]
pub struct AddCorruption {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The corrupted character.
    pub character_id: Uuid,
    /// Corruption to add.
    pub amount: i32,
    /// Where it came from.
    pub source: CorruptionSource,
}

impl Command for AddCorruption {
    fn command_type(&self) -> &'static str {
        "trauma_economy.add_corruption"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn character_ids(&self) -> Vec<Uuid> {
        vec![self.character_id]
    }
}

/// Command to move corruption from one character to another.
#[derive(Debug, Clone)]
pub struct TransferCorruption {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The character giving up corruption.
    pub source_id: Uuid,
    /// The character taking it on.
    pub target_id: Uuid,
    /// Corruption to move.
    pub amount: i32,
}

impl Command for TransferCorruption {
    fn command_type(&self) -> &'static str {
        "trauma_economy.transfer_corruption"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn character_ids(&self) -> Vec<Uuid> {
        vec![self.source_id, self.target_id]
    }
}

/// Command to roll the breaking-point trauma check owed at 100 stress.
#[derive(Debug, Clone)]
pub struct ResolveBreakingPoint {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The breaking character.
    pub character_id: Uuid,
}

impl Command for ResolveBreakingPoint {
    fn command_type(&self) -> &'static str {
        "trauma_economy.resolve_breaking_point"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn character_ids(&self) -> Vec<Uuid> {
        vec![self.character_id]
    }
}

/// Command to roll the terminal-error check owed at 100 corruption.
#[derive(Debug, Clone)]
pub struct ResolveTerminalError {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The consumed character.
    pub character_id: Uuid,
}

impl Command for ResolveTerminalError {
    fn command_type(&self) -> &'static str {
        "trauma_economy.resolve_terminal_error"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn character_ids(&self) -> Vec<Uuid> {
        vec![self.character_id]
    }
}

/// Command to give a character a specific trauma.
#[derive(Debug, Clone)]
pub struct AcquireTrauma {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The traumatized character.
    pub character_id: Uuid,
    /// Catalog id of the trauma.
    pub trauma_id: String,
    /// What inflicted it.
    pub source: String,
}

impl Command for AcquireTrauma {
    fn command_type(&self) -> &'static str {
        "trauma_economy.acquire_trauma"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn character_ids(&self) -> Vec<Uuid> {
        vec![self.character_id]
    }
}

/// Command to fire a resource capstone.
#[derive(Debug, Clone)]
pub struct UseCapstone {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The acting character.
    pub character_id: Uuid,
    /// Resource whose capstone fires.
    pub resource: ResourceKind,
}

impl Command for UseCapstone {
    fn command_type(&self) -> &'static str {
        "trauma_economy.use_capstone"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn character_ids(&self) -> Vec<Uuid> {
        vec![self.character_id]
    }
}

/// Command to open a new encounter for a group of characters.
#[derive(Debug, Clone)]
pub struct BeginEncounter {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Every participant.
    pub character_ids: Vec<Uuid>,
}

impl Command for BeginEncounter {
    fn command_type(&self) -> &'static str {
        "trauma_economy.begin_encounter"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn character_ids(&self) -> Vec<Uuid> {
        self.character_ids.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_names_both_characters() {
        let source_id = Uuid::new_v4();
        let target_id = Uuid::new_v4();
        let command = TransferCorruption {
            correlation_id: Uuid::new_v4(),
            source_id,
            target_id,
            amount: 10,
        };

        assert_eq!(command.command_type(), "trauma_economy.transfer_corruption");
        assert_eq!(command.character_ids(), vec![source_id, target_id]);
    }

    #[test]
    fn test_party_rest_names_every_member() {
        let members = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let command = ProcessPartyRest {
            correlation_id: Uuid::new_v4(),
            member_ids: members.clone(),
            rest: RestType::Long,
        };

        assert_eq!(command.character_ids(), members);
    }
}
