//! Command abstractions.

use uuid::Uuid;

/// Trait that all commands implement.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging/routing).
    fn command_type(&self) -> &'static str;

    /// Correlation ID to trace this command through the system.
    fn correlation_id(&self) -> Uuid;

    /// Every character this command mutates.
    ///
    /// The application layer serializes on these ids; commands touching more
    /// than one character are locked in sorted id order.
    fn character_ids(&self) -> Vec<Uuid>;
}
