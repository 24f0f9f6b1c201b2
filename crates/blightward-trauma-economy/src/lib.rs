//! Blightward: Trauma Economy bounded context.
//!
//! Tracks the coupled degradation meters of a character (Stress,
//! Corruption, the CPS view over Stress, permanent Traumas) together with
//! the specialization combat resources Rage, Momentum and Coherence, and
//! processes damage, rest and turn boundaries across all of them at once.

pub mod application;
pub mod domain;
