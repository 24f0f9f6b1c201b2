//! Domain error types.
//!
//! Two families live here. [`DomainError`] is for failures a caller must
//! fix: unknown ids, bad arguments, storage faults. [`Rejection`] is a
//! value for requests that were legal but could not take effect in the
//! character's current state; results embed it rather than returning it
//! as an error.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A character, definition, or resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What kind of thing was looked up.
        kind: &'static str,
        /// The id that missed.
        id: String,
    },

    /// An argument was out of range or empty.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict on character {character_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The character that had the conflict.
        character_id: Uuid,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },

    /// Configuration content is incomplete or inconsistent.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Builds a `NotFound` error.
    #[must_use]
    pub fn not_found(kind: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Builds an `InvalidArgument` error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

/// Why a request was refused without changing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionKind {
    /// A precondition on the character's state does not hold.
    InvalidState,
    /// The request is legal but has nothing to do.
    NoOp,
}

/// A refused request, carrying a reason fit for display to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{reason}")]
pub struct Rejection {
    /// The rejection category.
    pub kind: RejectionKind,
    /// Human-readable reason.
    pub reason: String,
}

impl Rejection {
    /// A precondition failure.
    #[must_use]
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self {
            kind: RejectionKind::InvalidState,
            reason: reason.into(),
        }
    }

    /// A legal request that changed nothing.
    #[must_use]
    pub fn no_op(reason: impl Into<String>) -> Self {
        Self {
            kind: RejectionKind::NoOp,
            reason: reason.into(),
        }
    }
}

/// Fails with `InvalidArgument` when `amount` is negative.
///
/// # Errors
///
/// Returns `DomainError::InvalidArgument` naming `what` when `amount < 0`.
pub fn ensure_non_negative(amount: i32, what: &str) -> Result<(), DomainError> {
    if amount < 0 {
        return Err(DomainError::InvalidArgument(format!(
            "{what} must not be negative, got {amount}"
        )));
    }
    Ok(())
}

/// Fails with `InvalidArgument` when `value` is blank.
///
/// # Errors
///
/// Returns `DomainError::InvalidArgument` naming `what` when `value` is empty
/// or whitespace.
pub fn ensure_not_blank(value: &str, what: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::InvalidArgument(format!(
            "{what} must not be empty"
        )));
    }
    Ok(())
}
