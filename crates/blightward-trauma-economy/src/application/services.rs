//! Collaborators shared by every handler.

use std::fmt;
use std::sync::{Arc, Mutex};

use blightward_core::clock::Clock;
use blightward_core::dice::DiceSource;
use blightward_core::repository::{CharacterRepository, EventRepository};

use crate::application::locks::CharacterLocks;
use crate::domain::orchestrator::TraumaEconomyOrchestrator;

/// Everything a handler needs, cheap to clone.
#[derive(Clone)]
pub struct TraumaEconomyServices {
    /// Rules and trackers.
    pub orchestrator: Arc<TraumaEconomyOrchestrator>,
    /// Per-character serialization.
    pub locks: Arc<CharacterLocks>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Shared dice; locked only around synchronous domain calls.
    pub dice: Arc<Mutex<dyn DiceSource>>,
    /// Character documents.
    pub characters: Arc<dyn CharacterRepository>,
    /// Notification journal.
    pub journal: Arc<dyn EventRepository>,
}

impl TraumaEconomyServices {
    /// Bundles the collaborators with a fresh lock registry.
    #[must_use]
    pub fn new(
        orchestrator: Arc<TraumaEconomyOrchestrator>,
        clock: Arc<dyn Clock>,
        dice: Arc<Mutex<dyn DiceSource>>,
        characters: Arc<dyn CharacterRepository>,
        journal: Arc<dyn EventRepository>,
    ) -> Self {
        Self {
            orchestrator,
            locks: Arc::new(CharacterLocks::new()),
            clock,
            dice,
            characters,
            journal,
        }
    }
}

impl fmt::Debug for TraumaEconomyServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraumaEconomyServices")
            .field("orchestrator", &self.orchestrator)
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}
