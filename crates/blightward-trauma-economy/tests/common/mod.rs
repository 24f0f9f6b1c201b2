//! Shared helpers for trauma economy integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use blightward_core::dice::DiceSource;
use blightward_test_support::{
    FixedClock, InMemoryCharacterRepository, RecordingEventRepository, fixtures, init_tracing,
};
use blightward_trauma_economy::application::services::TraumaEconomyServices;
use blightward_trauma_economy::domain::character::Character;
use blightward_trauma_economy::domain::meter::Meter;
use blightward_trauma_economy::domain::orchestrator::TraumaEconomyOrchestrator;
use uuid::Uuid;

/// Services wired to in-memory stores, plus handles on those stores.
pub struct TestWorld {
    pub services: TraumaEconomyServices,
    pub characters: Arc<InMemoryCharacterRepository>,
    pub journal: Arc<RecordingEventRepository>,
}

/// Build services with the default rules and the given dice.
pub fn build_world(dice: impl DiceSource + 'static) -> TestWorld {
    init_tracing();
    let characters = Arc::new(InMemoryCharacterRepository::new());
    let journal = Arc::new(RecordingEventRepository::new());
    let services = TraumaEconomyServices::new(
        Arc::new(TraumaEconomyOrchestrator::new(fixtures::default_content())),
        Arc::new(FixedClock::standard()),
        Arc::new(Mutex::new(dice)),
        characters.clone(),
        journal.clone(),
    );
    TestWorld {
        services,
        characters,
        journal,
    }
}

/// A WILL 3 character at `stress`.
pub fn character(stress: i32) -> Character {
    let mut character = Character::new(Uuid::new_v4(), "Wanderer", 3);
    character.stress = Meter::new(stress);
    character
}

impl TestWorld {
    /// Store `character` as an unsaved document.
    pub fn seed(&self, character: &Character) {
        self.characters
            .insert(character.to_stored(&FixedClock::standard()).unwrap());
    }

    /// The current stored state of a character.
    pub fn stored(&self, id: Uuid) -> Character {
        Character::from_stored(&self.characters.get(id).unwrap()).unwrap()
    }

    /// Journal sequence numbers for a character, in append order.
    pub fn sequence(&self, id: Uuid) -> Vec<i64> {
        self.journal
            .events_for(id)
            .iter()
            .map(|e| e.sequence_number)
            .collect()
    }
}
