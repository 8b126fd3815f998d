//! Error types for policy loading.

use std::path::PathBuf;

use iacguard_compiler::CompilerError;
use thiserror::Error;

/// Result type alias for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Errors that can occur while loading policies.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// Policy root does not exist.
    #[error("Policy directory not found: {path}")]
    DirectoryNotFound {
        /// The missing directory.
        path: PathBuf,
    },

    /// I/O error with path context.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path involved in the operation.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No tier contributed a rule or pack.
    #[error("No rules or packs found in any policy source")]
    EmptyIndex,

    /// A snapshot could not be encoded or decoded.
    #[error("Invalid index snapshot {path}: {source}")]
    Snapshot {
        /// Snapshot file.
        path: PathBuf,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
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
        let err = LoaderError::DirectoryNotFound {
            path: PathBuf::from("/missing"),
        };
        assert_eq!(err.to_string(), "Policy directory not found: /missing");
        assert_eq!(
            LoaderError::EmptyIndex.to_string(),
            "No rules or packs found in any policy source"
        );
    }

    #[test]
    fn test_compiler_error_is_transparent() {
        let err: LoaderError = CompilerError::DirectoryNotFound {
            path: PathBuf::from("/x"),
        }
        .into();
        assert_eq!(err.to_string(), "Directory does not exist: /x");
    }
}
