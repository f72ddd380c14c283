//! Core error type.
//!
//! Sub-crates define their own error enums and wrap `CoreError` as one
//! variant where they surface configuration problems.

use thiserror::Error;

/// The error type for `tsim-core`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid dynamic constraints: {0}")]
    Constraints(String),
}

/// Shorthand result type for `tsim-core`.
pub type CoreResult<T> = Result<T, CoreError>;
