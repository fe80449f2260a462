//! Error handling for the studylink client core

use std::fmt;
use thiserror::Error;

/// Unified error type for the studylink client core
///
/// The variants mirror the failure taxonomy of the backend contract:
/// a target document can be missing, the acting user can lack the required
/// role or ownership, or the backend call itself can fail transiently.
#[derive(Error, Debug)]
pub enum Error {
    /// The target document was absent at action time
    #[error("Not found: {0}")]
    NotFound(String),

    /// The acting identity does not match the required role or ownership
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A backend call failed; the action may succeed if repeated by the user
    #[error("Transient backend error: {0}")]
    Transient(String),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid caller-supplied input (e.g. a rating outside 1..=5)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a new not-found error
    pub fn not_found<T: fmt::Display>(msg: T) -> Self {
        Error::NotFound(msg.to_string())
    }

    /// Create a new unauthorized error
    pub fn unauthorized<T: fmt::Display>(msg: T) -> Self {
        Error::Unauthorized(msg.to_string())
    }

    /// Create a new transient backend error
    pub fn transient<T: fmt::Display>(msg: T) -> Self {
        Error::Transient(msg.to_string())
    }

    /// Create a new invalid-input error
    pub fn invalid_input<T: fmt::Display>(msg: T) -> Self {
        Error::InvalidInput(msg.to_string())
    }

    /// Whether this error is terminal for the triggering action
    ///
    /// Terminal errors are surfaced to the user as-is and never retried;
    /// transient errors may succeed if the user repeats the action.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Error::Transient(_))
    }
}
