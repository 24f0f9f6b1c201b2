//! Application layer: async handlers that load a character, run the
//! orchestrator, persist the result and journal its notifications.

pub mod command_handlers;
pub mod locks;
pub mod query_handlers;
pub mod services;
