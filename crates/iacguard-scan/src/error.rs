//! Error types for policy evaluation.

use std::path::PathBuf;

use iacguard_compiler::CompilerError;
use thiserror::Error;

/// Result type alias for scan operations.
pub type Result<T> = std::result::Result<T, ScanError>;

/// Errors that can occur while evaluating policies.
#[derive(Error, Debug)]
pub enum ScanError {
    /// A policy path does not exist.
    #[error("Policy path not found: {path}")]
    PathNotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// A policy path names a file that is not a `.rego` module.
    #[error("Not a .rego file: {path}")]
    NotRegoFile {
        /// The offending file.
        path: PathBuf,
    },

    /// Nothing to evaluate.
    #[error("No policy modules to evaluate")]
    NoModules,

    /// I/O error with path context.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path involved in the operation.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Compiler error.
    #[error(transparent)]
    Compiler(#[from] CompilerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScanError::NotRegoFile {
            path: PathBuf::from("policy.json"),
        };
        assert_eq!(err.to_string(), "Not a .rego file: policy.json");
        assert_eq!(ScanError::NoModules.to_string(), "No policy modules to evaluate");
    }
}
