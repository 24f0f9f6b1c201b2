//! Test repositories: in-memory and failing implementations of the
//! character and journal repositories.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use blightward_core::error::DomainError;
use blightward_core::repository::{
    CharacterRepository, EventRepository, StoredCharacter, StoredEvent,
};
use uuid::Uuid;

/// A character repository backed by a map, enforcing optimistic
/// concurrency like a real store would.
#[derive(Debug, Default)]
pub struct InMemoryCharacterRepository {
    characters: RwLock<HashMap<Uuid, StoredCharacter>>,
}

impl InMemoryCharacterRepository {
    /// An empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `character` as-is, bypassing the version check. For seeding.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn insert(&self, character: StoredCharacter) {
        self.characters
            .write()
            .unwrap()
            .insert(character.character_id, character);
    }

    /// The stored document for `character_id`, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn get(&self, character_id: Uuid) -> Option<StoredCharacter> {
        self.characters.read().unwrap().get(&character_id).cloned()
    }
}

#[async_trait]
impl CharacterRepository for InMemoryCharacterRepository {
    async fn load(&self, character_id: Uuid) -> Result<StoredCharacter, DomainError> {
        self.characters
            .read()
            .map_err(|_| DomainError::Infrastructure("character store poisoned".into()))?
            .get(&character_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("character", character_id))
    }

    async fn save(
        &self,
        character: &StoredCharacter,
        expected_version: i64,
    ) -> Result<(), DomainError> {
        let mut characters = self
            .characters
            .write()
            .map_err(|_| DomainError::Infrastructure("character store poisoned".into()))?;
        let actual = characters
            .get(&character.character_id)
            .map_or(0, |stored| stored.version);
        if actual != expected_version {
            return Err(DomainError::ConcurrencyConflict {
                character_id: character.character_id,
                expected: expected_version,
                actual,
            });
        }
        let mut next = character.clone();
        next.version = expected_version + 1;
        characters.insert(next.character_id, next);
        Ok(())
    }
}

/// A character repository that always returns an infrastructure error.
/// Useful for testing error-handling paths.
#[derive(Debug)]
pub struct FailingCharacterRepository;

#[async_trait]
impl CharacterRepository for FailingCharacterRepository {
    async fn load(&self, _character_id: Uuid) -> Result<StoredCharacter, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn save(
        &self,
        _character: &StoredCharacter,
        _expected_version: i64,
    ) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}

/// Delegates to an in-memory repository but refuses every save of one
/// character. Loads always succeed, so a multi-character command gets as far
/// as writing before it fails.
#[derive(Debug)]
pub struct RefusingCharacterRepository {
    inner: Arc<InMemoryCharacterRepository>,
    refused: Uuid,
}

impl RefusingCharacterRepository {
    /// Refuses saves of `refused`; everything else reaches `inner`.
    #[must_use]
    pub fn new(inner: Arc<InMemoryCharacterRepository>, refused: Uuid) -> Self {
        Self { inner, refused }
    }
}

#[async_trait]
impl CharacterRepository for RefusingCharacterRepository {
    async fn load(&self, character_id: Uuid) -> Result<StoredCharacter, DomainError> {
        self.inner.load(character_id).await
    }

    async fn save(
        &self,
        character: &StoredCharacter,
        expected_version: i64,
    ) -> Result<(), DomainError> {
        if character.character_id == self.refused {
            return Err(DomainError::Infrastructure("write refused".into()));
        }
        self.inner.save(character, expected_version).await
    }
}

/// An event repository that records every `append_events` call and serves
/// the recorded events back from `load_events`.
#[derive(Debug, Default)]
pub struct RecordingEventRepository {
    appended: Mutex<Vec<(Uuid, Vec<StoredEvent>)>>,
}

impl RecordingEventRepository {
    /// An empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every append call, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn appended_events(&self) -> Vec<(Uuid, Vec<StoredEvent>)> {
        self.appended.lock().unwrap().clone()
    }

    /// Every event recorded for `character_id`, in append order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn events_for(&self, character_id: Uuid) -> Vec<StoredEvent> {
        self.appended
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == character_id)
            .flat_map(|(_, events)| events.iter().cloned())
            .collect()
    }
}

#[async_trait]
impl EventRepository for RecordingEventRepository {
    async fn load_events(&self, character_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self.events_for(character_id))
    }

    async fn append_events(
        &self,
        character_id: Uuid,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        self.appended
            .lock()
            .unwrap()
            .push((character_id, events.to_vec()));
        Ok(())
    }
}

/// An event repository that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventRepository;

#[async_trait]
impl EventRepository for FailingEventRepository {
    async fn load_events(&self, _character_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn append_events(
        &self,
        _character_id: Uuid,
        _events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}
