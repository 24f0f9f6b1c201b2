//! Command handlers for the Trauma Economy context.
//!
//! Every handler follows the same path: lock the characters the command
//! names, load them, run the orchestrator, save each character against the
//! version it was loaded at, then journal the notifications. A domain error
//! leaves the stored characters untouched. A failed save restores every
//! character already written, and a failed journal append restores every
//! character whose entries did not land, so a saved journal position never
//! runs ahead of the journal.

use blightward_core::clock::Clock;
use blightward_core::command::Command;
use blightward_core::dice::DiceSource;
use blightward_core::error::DomainError;
use blightward_core::event::{DomainEvent, EventMetadata};
use blightward_core::repository::{StoredCharacter, StoredEvent};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::application::services::TraumaEconomyServices;
use crate::domain::character::Character;
use crate::domain::commands::{
    AcquireTrauma, AddCorruption, ApplyStress, BeginEncounter, ProcessDamage, ProcessPartyRest,
    ProcessRest, ProcessTurnEnd, ProcessTurnStart, ResolveBreakingPoint, ResolveTerminalError,
    TransferCorruption, UseCapstone,
};
use crate::domain::corruption::{CorruptionGain, TerminalErrorCheck};
use crate::domain::events::{TraumaEconomyEvent, TraumaEconomyEventKind};
use crate::domain::orchestrator::{
    BreakingPointOutcome, CapstoneOutcome, DamageResult, Notified, RestResult,
    TraumaEconomyOrchestrator, TransferResult, TurnEndResult, TurnStartResult,
};
use crate::domain::stress::StressApplication;
use crate::domain::trauma::TraumaAcquisition;

/// What a handler returns: the domain result and the journaled events.
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutcome<T> {
    /// The orchestrator's result.
    pub result: T,
    /// Events appended to the journal, across every character touched.
    #[serde(skip)]
    pub events: Vec<StoredEvent>,
}

impl<T> CommandOutcome<T> {
    /// Ids of the journaled events.
    #[must_use]
    pub fn event_ids(&self) -> Vec<Uuid> {
        self.events.iter().map(|e| e.event_id).collect()
    }
}

/// Notifications per loaded character, in load order.
type Notifications = Vec<Vec<TraumaEconomyEventKind>>;

fn to_stored_event(event: &TraumaEconomyEvent) -> StoredEvent {
    let meta = event.metadata();
    StoredEvent {
        event_id: meta.event_id,
        character_id: meta.character_id,
        event_type: event.event_type().to_owned(),
        payload: event.to_payload(),
        sequence_number: meta.sequence_number,
        correlation_id: meta.correlation_id,
        causation_id: meta.causation_id,
        occurred_at: meta.occurred_at,
    }
}

/// Wraps `kinds` in envelopes, advancing the character's journal position.
fn journal_entries(
    character: &mut Character,
    kinds: Vec<TraumaEconomyEventKind>,
    correlation_id: Uuid,
    clock: &dyn Clock,
) -> Vec<StoredEvent> {
    kinds
        .into_iter()
        .map(|kind| {
            character.journal_position += 1;
            let event = TraumaEconomyEvent {
                metadata: EventMetadata {
                    event_id: Uuid::new_v4(),
                    event_type: kind.event_type().to_owned(),
                    character_id: character.id,
                    sequence_number: character.journal_position,
                    correlation_id,
                    causation_id: correlation_id,
                    occurred_at: clock.now(),
                },
                kind,
            };
            to_stored_event(&event)
        })
        .collect()
}

fn unique_in_order(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}

/// Runs `op` over every character `command` names as one unit of work.
async fn execute<C, T, F>(
    services: &TraumaEconomyServices,
    command: &C,
    op: F,
) -> Result<CommandOutcome<T>, DomainError>
where
    C: Command,
    F: FnOnce(
        &TraumaEconomyOrchestrator,
        &mut [Character],
        &mut dyn DiceSource,
        &dyn Clock,
    ) -> Result<(T, Notifications), DomainError>,
{
    let ids = unique_in_order(command.character_ids());
    if ids.is_empty() {
        return Err(DomainError::invalid_argument(format!(
            "{} names no characters",
            command.command_type()
        )));
    }
    let _guard = services.locks.acquire(&ids).await?;

    let mut originals = Vec::with_capacity(ids.len());
    let mut characters = Vec::with_capacity(ids.len());
    for id in &ids {
        let stored = services.characters.load(*id).await?;
        characters.push(Character::from_stored(&stored)?);
        originals.push(stored);
    }

    // Dice stay locked only for the synchronous domain call.
    let (result, notifications) = {
        let mut dice = services
            .dice
            .lock()
            .map_err(|e| DomainError::Infrastructure(format!("dice mutex poisoned: {e}")))?;
        op(
            &services.orchestrator,
            characters.as_mut_slice(),
            &mut *dice,
            services.clock.as_ref(),
        )?
    };

    let clock = services.clock.as_ref();
    let mut pending = Vec::with_capacity(characters.len());
    for (character, kinds) in characters.iter_mut().zip(notifications) {
        let entries = journal_entries(character, kinds, command.correlation_id(), clock);
        pending.push((character.to_stored(clock)?, character.version, entries));
    }

    // Nothing is written unless every character is still at its loaded version.
    for original in &originals {
        let current = services.characters.load(original.character_id).await?;
        if current.version != original.version {
            return Err(DomainError::ConcurrencyConflict {
                character_id: original.character_id,
                expected: original.version,
                actual: current.version,
            });
        }
    }

    for (written, (document, expected, _)) in pending.iter().enumerate() {
        if let Err(e) = services.characters.save(document, *expected).await {
            tracing::warn!(
                character_id = %document.character_id,
                error = %e,
                "save failed, restoring characters already written"
            );
            restore(services, &originals[..written]).await;
            return Err(e);
        }
    }

    let mut events = Vec::new();
    for (index, (document, _, entries)) in pending.into_iter().enumerate() {
        if entries.is_empty() {
            continue;
        }
        if let Err(e) = services
            .journal
            .append_events(document.character_id, &entries)
            .await
        {
            tracing::warn!(
                character_id = %document.character_id,
                error = %e,
                "journal append failed, restoring characters without entries"
            );
            restore(services, &originals[index..]).await;
            return Err(e);
        }
        events.extend(entries);
    }

    tracing::debug!(
        command_type = command.command_type(),
        characters = ids.len(),
        events = events.len(),
        "command committed"
    );
    Ok(CommandOutcome { result, events })
}

/// Writes back `originals`, each of which was saved once by this command.
async fn restore(services: &TraumaEconomyServices, originals: &[StoredCharacter]) {
    for original in originals {
        if let Err(e) = services
            .characters
            .save(original, original.version + 1)
            .await
        {
            tracing::warn!(
                character_id = %original.character_id,
                error = %e,
                "could not restore character"
            );
        }
    }
}

/// [`execute`] for commands naming exactly one character.
async fn execute_one<C, T, F>(
    services: &TraumaEconomyServices,
    command: &C,
    op: F,
) -> Result<CommandOutcome<T>, DomainError>
where
    C: Command,
    F: FnOnce(
        &TraumaEconomyOrchestrator,
        &mut Character,
        &mut dyn DiceSource,
        &dyn Clock,
    ) -> Result<(T, Vec<TraumaEconomyEventKind>), DomainError>,
{
    execute(services, command, |orchestrator, characters, dice, clock| {
        let count = characters.len();
        let [character] = characters else {
            return Err(DomainError::invalid_argument(format!(
                "{} expects one character, got {count}",
                command.command_type()
            )));
        };
        let (result, events) = op(orchestrator, character, dice, clock)?;
        Ok((result, vec![events]))
    })
    .await
}

fn notified<T>(notified: Notified<T>) -> (Notified<T>, Vec<TraumaEconomyEventKind>) {
    let events = notified.events.clone();
    (notified, events)
}

/// Handles the `ProcessDamage` command.
///
/// # Errors
///
/// Returns `DomainError` if loading, the damage pipeline, or persistence
/// fails.
#[instrument(skip(services, command), fields(character_id = %command.character_id, correlation_id = %command.correlation_id))]
pub async fn handle_process_damage(
    command: &ProcessDamage,
    services: &TraumaEconomyServices,
) -> Result<CommandOutcome<DamageResult>, DomainError> {
    execute_one(services, command, |orchestrator, character, dice, _| {
        let result = orchestrator.process_damage(character, command.damage, &command.context, dice)?;
        let events = result.events.clone();
        Ok((result, events))
    })
    .await
}

/// Handles the `ProcessRest` command for a single character. The party
/// bonus needs the whole party; use [`handle_process_party_rest`] for it.
///
/// # Errors
///
/// Returns `DomainError` if loading, the rest, or persistence fails.
#[instrument(skip(services, command), fields(character_id = %command.character_id, correlation_id = %command.correlation_id))]
pub async fn handle_process_rest(
    command: &ProcessRest,
    services: &TraumaEconomyServices,
) -> Result<CommandOutcome<RestResult>, DomainError> {
    execute_one(services, command, |orchestrator, character, _, _| {
        let result = orchestrator.process_rest(character, command.rest, None)?;
        let events = result.events.clone();
        Ok((result, events))
    })
    .await
}

/// Handles the `ProcessPartyRest` command. Results follow the order of
/// `member_ids` with duplicates removed.
///
/// # Errors
///
/// Returns `DomainError` if any member fails to load, rest, or persist.
#[instrument(skip(services, command), fields(members = command.member_ids.len(), correlation_id = %command.correlation_id))]
pub async fn handle_process_party_rest(
    command: &ProcessPartyRest,
    services: &TraumaEconomyServices,
) -> Result<CommandOutcome<Vec<RestResult>>, DomainError> {
    execute(services, command, |orchestrator, members, _, _| {
        let results = orchestrator.process_party_rest(members, command.rest)?;
        let events = results.iter().map(|r| r.events.clone()).collect();
        Ok((results, events))
    })
    .await
}

/// Handles the `ProcessTurnStart` command.
///
/// # Errors
///
/// Returns `DomainError` if loading, the turn start, or persistence fails.
#[instrument(skip(services, command), fields(character_id = %command.character_id, correlation_id = %command.correlation_id))]
pub async fn handle_process_turn_start(
    command: &ProcessTurnStart,
    services: &TraumaEconomyServices,
) -> Result<CommandOutcome<TurnStartResult>, DomainError> {
    execute_one(services, command, |orchestrator, character, _, _| {
        let result = orchestrator.process_turn_start(character, command.in_combat)?;
        let events = result.events.clone();
        Ok((result, events))
    })
    .await
}

/// Handles the `ProcessTurnEnd` command.
///
/// # Errors
///
/// Returns `DomainError` if loading, the turn end, or persistence fails.
#[instrument(skip(services, command), fields(character_id = %command.character_id, correlation_id = %command.correlation_id))]
pub async fn handle_process_turn_end(
    command: &ProcessTurnEnd,
    services: &TraumaEconomyServices,
) -> Result<CommandOutcome<TurnEndResult>, DomainError> {
    execute_one(services, command, |orchestrator, character, dice, _| {
        let result = orchestrator.process_turn_end(character, command.environmental_stress, dice)?;
        let events = result.events.clone();
        Ok((result, events))
    })
    .await
}

/// Handles the `ApplyStress` command.
///
/// # Errors
///
/// Returns `DomainError` if loading, validation, or persistence fails.
#[instrument(skip(services, command), fields(character_id = %command.character_id, correlation_id = %command.correlation_id))]
pub async fn handle_apply_stress(
    command: &ApplyStress,
    services: &TraumaEconomyServices,
) -> Result<CommandOutcome<Notified<StressApplication>>, DomainError> {
    execute_one(services, command, |orchestrator, character, dice, _| {
        orchestrator
            .apply_stress(character, command.amount, command.source, command.resist_dc, dice)
            .map(notified)
    })
    .await
}

/// Handles the `AddCorruption` command.
///
/// # Errors
///
/// Returns `DomainError` if loading, validation, or persistence fails.
#[instrument(skip(services, command), fields(character_id = %command.character_id, correlation_id = %command.correlation_id))]
pub async fn handle_add_corruption(
    command: &AddCorruption,
    services: &TraumaEconomyServices,
) -> Result<CommandOutcome<Notified<CorruptionGain>>, DomainError> {
    execute_one(services, command, |orchestrator, character, _, _| {
        orchestrator
            .add_corruption(character, command.amount, command.source)
            .map(notified)
    })
    .await
}

/// Handles the `TransferCorruption` command.
///
/// # Errors
///
/// Returns `DomainError::InvalidArgument` for a transfer to the same
/// character or a non-positive amount, and other `DomainError`s if loading
/// or persistence fails.
#[instrument(skip(services, command), fields(source_id = %command.source_id, target_id = %command.target_id, correlation_id = %command.correlation_id))]
pub async fn handle_transfer_corruption(
    command: &TransferCorruption,
    services: &TraumaEconomyServices,
) -> Result<CommandOutcome<TransferResult>, DomainError> {
    if command.source_id == command.target_id {
        return Err(DomainError::invalid_argument(
            "cannot transfer corruption to the same character",
        ));
    }
    execute(services, command, |orchestrator, characters, _, _| {
        let [source, target] = characters else {
            return Err(DomainError::invalid_argument(
                "a transfer needs exactly two characters",
            ));
        };
        let result = orchestrator.transfer_corruption(source, target, command.amount)?;
        let events = vec![result.source_events.clone(), result.target_events.clone()];
        Ok((result, events))
    })
    .await
}

/// Handles the `ResolveBreakingPoint` command.
///
/// # Errors
///
/// Returns `DomainError` if loading, the trauma check, or persistence fails.
#[instrument(skip(services, command), fields(character_id = %command.character_id, correlation_id = %command.correlation_id))]
pub async fn handle_resolve_breaking_point(
    command: &ResolveBreakingPoint,
    services: &TraumaEconomyServices,
) -> Result<CommandOutcome<Notified<BreakingPointOutcome>>, DomainError> {
    execute_one(services, command, |orchestrator, character, dice, clock| {
        orchestrator
            .resolve_breaking_point(character, dice, clock)
            .map(notified)
    })
    .await
}

/// Handles the `ResolveTerminalError` command.
///
/// # Errors
///
/// Returns `DomainError` if loading or persistence fails.
#[instrument(skip(services, command), fields(character_id = %command.character_id, correlation_id = %command.correlation_id))]
pub async fn handle_resolve_terminal_error(
    command: &ResolveTerminalError,
    services: &TraumaEconomyServices,
) -> Result<CommandOutcome<Notified<TerminalErrorCheck>>, DomainError> {
    execute_one(services, command, |orchestrator, character, dice, _| {
        Ok(notified(orchestrator.resolve_terminal_error(character, dice)))
    })
    .await
}

/// Handles the `AcquireTrauma` command.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for an unknown trauma id, and other
/// `DomainError`s if loading or persistence fails.
#[instrument(skip(services, command), fields(character_id = %command.character_id, trauma_id = %command.trauma_id, correlation_id = %command.correlation_id))]
pub async fn handle_acquire_trauma(
    command: &AcquireTrauma,
    services: &TraumaEconomyServices,
) -> Result<CommandOutcome<Notified<TraumaAcquisition>>, DomainError> {
    execute_one(services, command, |orchestrator, character, _, clock| {
        orchestrator
            .acquire_trauma(character, &command.trauma_id, &command.source, clock)
            .map(notified)
    })
    .await
}

/// Handles the `UseCapstone` command.
///
/// # Errors
///
/// Returns `DomainError` if loading, validation, or persistence fails.
#[instrument(skip(services, command), fields(character_id = %command.character_id, resource = %command.resource, correlation_id = %command.correlation_id))]
pub async fn handle_use_capstone(
    command: &UseCapstone,
    services: &TraumaEconomyServices,
) -> Result<CommandOutcome<Notified<CapstoneOutcome>>, DomainError> {
    execute_one(services, command, |orchestrator, character, _, _| {
        orchestrator
            .use_capstone(character, command.resource)
            .map(notified)
    })
    .await
}

/// Handles the `BeginEncounter` command. The result says, per character in
/// command order, whether a spent capstone was made available again.
///
/// # Errors
///
/// Returns `DomainError` if loading or persistence fails.
#[instrument(skip(services, command), fields(characters = command.character_ids.len(), correlation_id = %command.correlation_id))]
pub async fn handle_begin_encounter(
    command: &BeginEncounter,
    services: &TraumaEconomyServices,
) -> Result<CommandOutcome<Vec<bool>>, DomainError> {
    execute(services, command, |orchestrator, characters, _, _| {
        let restored = characters
            .iter_mut()
            .map(|character| orchestrator.begin_encounter(character))
            .collect::<Vec<_>>();
        let events = vec![Vec::new(); characters.len()];
        Ok((restored, events))
    })
    .await
}
