//! Error types for iacguard core operations.

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in iacguard core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A severity string is not one of `high`, `medium` or `low`.
    #[error("Invalid severity '{value}': expected one of high, medium, low")]
    InvalidSeverity {
        /// The rejected input.
        value: String,
    },
}
