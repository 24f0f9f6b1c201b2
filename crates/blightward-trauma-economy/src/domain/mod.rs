//! Domain layer: meters, trackers, the character document and the
//! orchestrator that ties them together.

pub mod character;
pub mod coherence;
pub mod commands;
pub mod corruption;
pub mod cps;
pub mod events;
pub mod meter;
pub mod momentum;
pub mod orchestrator;
pub mod rage;
pub mod state;
pub mod stress;
pub mod trauma;
