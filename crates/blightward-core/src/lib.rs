//! Blightward Core: shared domain abstractions.
//!
//! This crate defines the fundamental traits and types that the trauma
//! economy and its collaborators depend on. It contains no game rules and
//! no infrastructure code beyond the production dice source.

pub mod clock;
pub mod command;
pub mod dice;
pub mod error;
pub mod event;
pub mod repository;
