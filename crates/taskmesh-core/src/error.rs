//! Error types for the taskmesh core.
//!
//! Fatal conditions (unreadable files, non-numeric tokens, negative
//! capacities) surface as [`CoreError`]; recoverable input problems such as
//! short lines are logged and skipped by the loader instead of erroring.

use std::path::PathBuf;
use thiserror::Error;

/// A specialized `Result` type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Top-level error type for world construction and evaluation.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoreError {
    /// An input file could not be opened or read.
    #[error("failed to read '{path}': {source}")]
    Io {
        /// Path of the offending file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A token that must be numeric could not be parsed.
    #[error("{path}:{line}: expected a number, got '{token}'")]
    NumericToken {
        /// Path of the offending file
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// The token that failed to parse
        token: String,
    },

    /// Validation error for input data (negative capacity, negative size, ...).
    #[error("validation error: {message}")]
    Validation {
        /// Description of what validation failed
        message: String,
    },

    /// An entity referenced by id does not exist in the world.
    #[error("unknown {entity} id {id}")]
    UnknownId {
        /// Kind of entity that was looked up
        entity: &'static str,
        /// The missing id
        id: u32,
    },
}

impl CoreError {
    /// Creates an I/O error tagged with the offending path.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a numeric-token parse error.
    #[must_use]
    pub fn numeric_token(path: impl Into<PathBuf>, line: usize, token: impl Into<String>) -> Self {
        Self::NumericToken {
            path: path.into(),
            line,
            token: token.into(),
        }
    }

    /// Creates a new validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates an unknown-id error.
    #[must_use]
    pub fn unknown_id(entity: &'static str, id: u32) -> Self {
        Self::UnknownId { entity, id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_token_display_names_location() {
        let err = CoreError::numeric_token("tasks.txt", 7, "abc");
        let msg = err.to_string();
        assert!(msg.contains("tasks.txt:7"));
        assert!(msg.contains("'abc'"));
    }

    #[test]
    fn validation_display() {
        let err = CoreError::validation("capacity must be positive");
        assert!(err.to_string().contains("capacity must be positive"));
    }
}
