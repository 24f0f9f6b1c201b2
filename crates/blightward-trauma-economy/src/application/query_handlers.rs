//! Query handlers for the Trauma Economy context.
//!
//! Queries load the character document and derive read-only views; they
//! never save or journal anything.

use blightward_core::error::DomainError;
use blightward_core::repository::StoredEvent;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::application::services::TraumaEconomyServices;
use crate::domain::character::Character;
use crate::domain::state::{TraumaEconomySnapshot, TraumaEconomyState};

/// Read-only view of one journal entry.
#[derive(Debug, Serialize)]
pub struct JournalEntryView {
    /// The event identifier.
    pub event_id: Uuid,
    /// Routing name, e.g. `trauma_economy.threshold_crossed`.
    pub event_type: String,
    /// Position in the character's journal.
    pub sequence_number: i64,
    /// The command that raised it.
    pub correlation_id: Uuid,
    /// When it was raised.
    pub occurred_at: DateTime<Utc>,
    /// Notification body.
    pub payload: serde_json::Value,
}

impl From<StoredEvent> for JournalEntryView {
    fn from(event: StoredEvent) -> Self {
        Self {
            event_id: event.event_id,
            event_type: event.event_type,
            sequence_number: event.sequence_number,
            correlation_id: event.correlation_id,
            occurred_at: event.occurred_at,
            payload: event.payload,
        }
    }
}

async fn load_character(
    character_id: Uuid,
    services: &TraumaEconomyServices,
) -> Result<Character, DomainError> {
    let stored = services.characters.load(character_id).await?;
    Character::from_stored(&stored)
}

/// Full derived state of a character.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for an unknown character, or any error
/// from loading or deriving the state.
pub async fn get_trauma_economy_state(
    character_id: Uuid,
    services: &TraumaEconomyServices,
) -> Result<TraumaEconomyState, DomainError> {
    let character = load_character(character_id, services).await?;
    services.orchestrator.state(&character)
}

/// Compact snapshot of a character, stamped with the current time and the
/// rules fingerprint.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for an unknown character, or any error
/// from loading or deriving the snapshot.
pub async fn get_snapshot(
    character_id: Uuid,
    services: &TraumaEconomyServices,
) -> Result<TraumaEconomySnapshot, DomainError> {
    let character = load_character(character_id, services).await?;
    services
        .orchestrator
        .snapshot(&character, services.clock.as_ref())
}

/// The character's journal, oldest first.
///
/// # Errors
///
/// Returns `DomainError` if the journal cannot be read.
pub async fn get_journal(
    character_id: Uuid,
    services: &TraumaEconomyServices,
) -> Result<Vec<JournalEntryView>, DomainError> {
    let mut events = services.journal.load_events(character_id).await?;
    events.sort_by_key(|e| e.sequence_number);
    Ok(events.into_iter().map(JournalEntryView::from).collect())
}
