//! Shared primitives for all Rust crates in Vantry.

#![forbid(unsafe_code)]

/// Per-process instance identity.
pub mod instance;

use thiserror::Error;

pub use instance::InstanceId;

/// Result type used across Vantry crates.
pub type AppResult<T> = Result<T, AppError>;

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}
