//! Shared test doubles and fixtures for the Blightward trauma economy.

mod clock;
mod dice;
pub mod fixtures;
mod logging;
mod repository;

pub use clock::FixedClock;
pub use dice::{MockDice, SequenceDice};
pub use logging::init_tracing;
pub use repository::{
    FailingCharacterRepository, FailingEventRepository, InMemoryCharacterRepository,
    RecordingEventRepository, RefusingCharacterRepository,
};
