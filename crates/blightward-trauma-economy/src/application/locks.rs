//! Per-character serialization for the application layer.
//!
//! Two commands against the same character must not interleave between
//! load and save. Each character id maps to one async mutex; commands that
//! touch several characters take their locks in sorted id order so two such
//! commands cannot deadlock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use blightward_core::error::DomainError;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// Registry of per-character locks.
#[derive(Debug, Default)]
pub struct CharacterLocks {
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

/// Held locks for a set of characters. Released on drop.
#[derive(Debug)]
pub struct CharacterGuard {
    ids: Vec<Uuid>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl CharacterGuard {
    /// Locked ids, sorted and de-duplicated.
    #[must_use]
    pub fn ids(&self) -> &[Uuid] {
        &self.ids
    }
}

impl CharacterLocks {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks every id in `ids`, waiting for any holder to finish.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the registry mutex is
    /// poisoned.
    pub async fn acquire(&self, ids: &[Uuid]) -> Result<CharacterGuard, DomainError> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        // Registry lock is released before any await.
        let mutexes = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|e| DomainError::Infrastructure(format!("lock registry poisoned: {e}")))?;
            ids.iter()
                .map(|id| Arc::clone(locks.entry(*id).or_default()))
                .collect::<Vec<_>>()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }
        Ok(CharacterGuard {
            ids,
            _guards: guards,
        })
    }
}
