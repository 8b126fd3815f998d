//! Error types for the iacguard compiler.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for compiler operations.
pub type Result<T> = std::result::Result<T, CompilerError>;

/// Errors that can occur while parsing or evaluating policies.
#[derive(Error, Debug)]
pub enum CompilerError {
    /// Failed to read a policy file.
    #[error("Failed to read policy file {path}: {source}")]
    FileReadError {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse Rego syntax.
    #[error("Rego parse error in {file} at line {line}: {message}")]
    ParseError {
        /// File being parsed.
        file: String,
        /// Line number of the error (0 when unknown).
        line: usize,
        /// Error message.
        message: String,
    },

    /// Missing required package declaration.
    #[error("Missing package declaration in {file}")]
    MissingPackage {
        /// File missing the package.
        file: String,
    },

    /// The evaluator rejected a query (typically a compile error surfaced
    /// at evaluation time).
    #[error("Query evaluation failed for {query}: {message}")]
    EvaluationError {
        /// The query that failed.
        query: String,
        /// Evaluator message.
        message: String,
    },

    /// A directory that must exist does not.
    #[error("Directory does not exist: {path}")]
    DirectoryNotFound {
        /// Missing directory.
        path: PathBuf,
    },

    /// I/O error during directory operations.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = CompilerError::ParseError {
            file: "ecs.rego".to_string(),
            line: 10,
            message: "unexpected token".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Rego parse error in ecs.rego at line 10: unexpected token"
        );
    }

    #[test]
    fn test_missing_package_display() {
        let err = CompilerError::MissingPackage {
            file: "test.rego".to_string(),
        };
        assert_eq!(err.to_string(), "Missing package declaration in test.rego");
    }

    #[test]
    fn test_evaluation_error_display() {
        let err = CompilerError::EvaluationError {
            query: "data.x.deny".to_string(),
            message: "var y is unsafe".to_string(),
        };
        assert!(err.to_string().contains("data.x.deny"));
    }
}
