//! Repository abstractions.
//!
//! Characters are stored as versioned JSON documents; notifications are
//! appended to a per-character journal.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;

/// Stored representation of a character document.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCharacter {
    /// Character identifier.
    pub character_id: Uuid,
    /// Version of this document. A character that was never saved is
    /// version 0.
    pub version: i64,
    /// Serialized character state.
    pub payload: serde_json::Value,
    /// When this version was written.
    pub updated_at: DateTime<Utc>,
}

/// Repository trait for loading and saving characters.
#[async_trait]
pub trait CharacterRepository: Send + Sync {
    /// Load the latest document for a character.
    ///
    /// Implementations return `DomainError::NotFound` for unknown ids.
    async fn load(&self, character_id: Uuid) -> Result<StoredCharacter, DomainError>;

    /// Save a document with optimistic concurrency. `expected_version` is
    /// the version that was loaded; the stored version must still match.
    /// The document is written as version `expected_version + 1`.
    ///
    /// Implementations return `DomainError::ConcurrencyConflict` when the
    /// stored version has moved on.
    async fn save(
        &self,
        character: &StoredCharacter,
        expected_version: i64,
    ) -> Result<(), DomainError>;
}

/// Stored representation of a domain event.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Character this event concerns.
    pub character_id: Uuid,
    /// Event type name for deserialization routing.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Sequence number within the character's journal.
    pub sequence_number: i64,
    /// Correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Causation ID linking to the causing command.
    pub causation_id: Uuid,
    /// Timestamp of event creation.
    pub occurred_at: DateTime<Utc>,
}

/// Append-only journal of notification events.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Load all events for a character, ordered by sequence number.
    async fn load_events(&self, character_id: Uuid) -> Result<Vec<StoredEvent>, DomainError>;

    /// Append events to a character's journal.
    async fn append_events(
        &self,
        character_id: Uuid,
        events: &[StoredEvent],
    ) -> Result<(), DomainError>;
}
